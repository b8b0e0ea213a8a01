//! Outbound notifications for project changes.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;
use crate::error::{Error, Result};

pub const SUBJECT_ASSIGNED: &str = "На Вас назначена задача / проект";
pub const SUBJECT_CHANGED: &str = "Внесены изменения по задаче / проекту";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    /// Rendered one `field: value` line each.
    pub fields: Vec<(String, String)>,
    pub recipients: Vec<String>,
}

impl Notification {
    pub fn body(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Anything that can deliver a [`Notification`].
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Sink that drops everything. Used when no SMTP relay is configured.
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        log::debug!("Notification '{}' not sent: mail disabled", notification.subject);
        Ok(())
    }
}

#[derive(Clone)]
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        builder = builder.port(config.port);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }
        Ok(Self {
            mailer: builder.build(),
            from: parse_mailbox(&config.from)?,
        })
    }

    fn message(&self, notification: &Notification) -> Result<Message> {
        build_message(&self.from, notification)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|_| Error::Notification(format!("invalid email address: {address}")))
}

fn build_message(from: &Mailbox, notification: &Notification) -> Result<Message> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(notification.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for to in &notification.recipients {
        builder = builder.to(parse_mailbox(to)?);
    }
    Ok(builder.body(notification.body())?)
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if notification.recipients.is_empty() {
            return Ok(());
        }
        let message = self.message(notification)?;
        self.mailer.send(message).await?;
        log::info!(
            "Sent '{}' to {}",
            notification.subject,
            notification.recipients.join(", ")
        );
        Ok(())
    }
}

/// Build the sink described by `[mail]`.
pub fn from_config(config: &MailConfig) -> Result<Box<dyn NotificationSink>> {
    match &config.host {
        Some(host) => Ok(Box::new(EmailNotifier::new(config, host)?)),
        None => Ok(Box::new(NoopNotifier)),
    }
}

/// Send, logging and swallowing any failure.
pub async fn notify_best_effort(sink: &dyn NotificationSink, notification: &Notification) {
    if let Err(e) = sink.send(notification).await {
        log::warn!("Notification '{}' failed: {e}", notification.subject);
    }
}
