use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;

use super::SwitchEvent;
use crate::DispatchError;
use crate::Result;

/// Parses an RFC 5322 address such as `Ops <ops@example.com>`.
pub(crate) fn mailbox(
    field: &str,
    raw: &str,
) -> std::result::Result<Mailbox, DispatchError> {
    raw.parse()
        .map_err(|e| DispatchError::Email(format!("{field} address {raw:?}: {e}")))
}

/// Plain text alert mail for `event`
pub(crate) fn compose(
    from: &str,
    to: &str,
    event: &SwitchEvent,
) -> Result<Message> {
    let subject = format!("[deadswitch] {} {}", event.switch_id, event.kind);
    let body = format!(
        "{}\n\nswitch: {}\nevent: {}\nalert: #{}\ninterval: {}ms\n",
        event.summary(),
        event.switch_id,
        event.kind,
        event.sequence,
        event.interval_ms
    );

    let message = Message::builder()
        .from(mailbox("from", from)?)
        .to(mailbox("to", to)?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| DispatchError::Email(e.to_string()))?;
    Ok(message)
}

/// Sends one alert mail through the relay at `smtp_url`
/// (`smtp://host:port` plain, `smtp://host?tls=required` STARTTLS, `smtps://host` TLS).
pub(crate) async fn send(
    smtp_url: &str,
    from: &str,
    to: &str,
    event: &SwitchEvent,
) -> Result<()> {
    let message = compose(from, to, event)?;
    let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(smtp_url)
        .map_err(DispatchError::Smtp)?
        .build();

    transport.send(message).await.map_err(DispatchError::Smtp)?;
    Ok(())
}
