use config::ConfigError;
use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use super::BackoffPolicy;
use crate::notify::email;
use crate::Error;
use crate::Result;

/// One destination a trip is delivered to
///
/// ```toml
/// [[notification.targets]]
/// channel = "slack"
/// webhook_url = "https://hooks.slack.com/services/T000/B000/XXXX"
///
/// [[notification.targets]]
/// channel = "webhook"
/// url = "https://alerts.internal/deadswitch"
///
/// [[notification.targets]]
/// channel = "email"
/// smtp_url = "smtps://relay.example.com"
/// from = "deadswitch <deadswitch@example.com>"
/// to = "oncall@example.com"
///
/// [[notification.targets]]
/// channel = "log"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum NotificationTarget {
    /// Chat webhook accepting `{"text": ...}` payloads
    Slack {
        webhook_url: String,
        #[serde(default)]
        username: Option<String>,
    },
    /// Generic HTTP endpoint receiving the JSON event body
    Webhook { url: String },
    /// Plain text mail through an SMTP relay
    Email {
        smtp_url: String,
        from: String,
        to: String,
    },
    /// Structured log line only
    Log,
}

impl NotificationTarget {
    /// Channel label used in logs and metrics
    pub fn channel(&self) -> &'static str {
        match self {
            NotificationTarget::Slack { .. } => "slack",
            NotificationTarget::Webhook { .. } => "webhook",
            NotificationTarget::Email { .. } => "email",
            NotificationTarget::Log => "log",
        }
    }

    fn url(&self) -> Option<&str> {
        match self {
            NotificationTarget::Slack { webhook_url, .. } => Some(webhook_url),
            NotificationTarget::Webhook { url } => Some(url),
            NotificationTarget::Email { smtp_url, .. } => Some(smtp_url),
            NotificationTarget::Log => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let Some(raw) = self.url() else {
            return Ok(());
        };

        let url = Url::parse(raw).map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "{} target url {:?} is invalid: {}",
                self.channel(),
                raw,
                e
            )))
        })?;

        let schemes: &[&str] = match self {
            NotificationTarget::Email { .. } => &["smtp", "smtps"],
            _ => &["http", "https"],
        };
        if !schemes.contains(&url.scheme()) {
            return Err(Error::Config(ConfigError::Message(format!(
                "{} target url must use one of {:?}, got scheme {:?}",
                self.channel(),
                schemes,
                url.scheme()
            ))));
        }

        if let NotificationTarget::Email { from, to, .. } = self {
            for (field, raw) in [("from", from), ("to", to)] {
                email::mailbox(field, raw)
                    .map_err(|e| Error::Config(ConfigError::Message(format!("email target {e}"))))?;
            }
        }

        Ok(())
    }
}

/// Notification targets and delivery policy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Ordered target list attached to every switch created by this process
    #[serde(default = "default_targets")]
    pub targets: Vec<NotificationTarget>,

    /// Per-target timeout and bounded retries
    #[serde(default)]
    pub retry: BackoffPolicy,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            retry: BackoffPolicy::default(),
        }
    }
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            warn!("no notification targets configured; trips will only be counted in metrics");
        }

        for target in &self.targets {
            target.validate()?;
        }

        self.retry.validate("notification.retry")
    }
}

fn default_targets() -> Vec<NotificationTarget> {
    vec![NotificationTarget::Log]
}
