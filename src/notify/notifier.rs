use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use super::email;
use super::SwitchEvent;
use crate::DispatchError;
use crate::NotificationTarget;
use crate::Result;

/// Delivers one event to one target.
///
/// Implementations perform a single attempt; timeouts and retries are applied
/// by the dispatcher around each call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn deliver(
        &self,
        target: &NotificationTarget,
        event: &SwitchEvent,
    ) -> Result<()>;
}

/// Notifier for every configured channel: chat and generic webhooks over
/// HTTP, email over SMTP, and the log
#[derive(Debug, Clone, Default)]
pub struct ChannelNotifier {
    client: Client,
}

impl ChannelNotifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(DispatchError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn deliver(
        &self,
        target: &NotificationTarget,
        event: &SwitchEvent,
    ) -> Result<()> {
        match target {
            NotificationTarget::Slack {
                webhook_url,
                username,
            } => {
                let mut body = json!({ "text": event.summary() });
                if let Some(username) = username {
                    body["username"] = json!(username);
                }
                self.post_json(webhook_url, &body).await
            }
            NotificationTarget::Webhook { url } => {
                let body = serde_json::to_value(event).map_err(|e| {
                    crate::Error::Fatal(format!("event serialization failed: {e}"))
                })?;
                self.post_json(url, &body).await
            }
            NotificationTarget::Email { smtp_url, from, to } => {
                email::send(smtp_url, from, to, event).await
            }
            NotificationTarget::Log => {
                warn!(
                    switch_id = %event.switch_id,
                    kind = %event.kind,
                    sequence = event.sequence,
                    "{}",
                    event.summary()
                );
                Ok(())
            }
        }
    }
}
