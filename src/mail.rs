//! Mail dispatch of finished interviews

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

pub const SUBJECT: &str = "Chatbot Interview Transcript and Story";

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid mail address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("No mail recipients configured")]
    NoRecipients,
    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Timed out talking to the mail server")]
    Timeout,
}

/// A rendered message, sent to every configured recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// The completion mail: full transcript, then the article
    pub fn interview(transcript: &str, article: &str) -> Self {
        Self {
            subject: SUBJECT.to_string(),
            body: format!(
                "Interview Transcript:\n\n{transcript}\n\nGenerated Story:\n\n{article}"
            ),
        }
    }
}

#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

#[async_trait]
impl<T: MailDispatcher + ?Sized> MailDispatcher for Arc<T> {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        (**self).send(message).await
    }
}

/// SMTP connection settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub recipients: Vec<String>,
}

/// STARTTLS SMTP relay with login credentials
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpMailer {
    /// Addresses are validated here so a bad configuration fails at startup
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = parse_mailbox(&config.from)?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            recipients,
        })
    }

    fn build(&self, message: &MailMessage) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        Ok(builder.body(message.body.clone())?)
    }
}

#[async_trait]
impl MailDispatcher for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let email = self.build(message)?;
        tokio::time::timeout(SEND_TIMEOUT, self.transport.send(email))
            .await
            .map_err(|_| MailError::Timeout)??;
        tracing::info!(
            recipients = self.recipients.len(),
            subject = %message.subject,
            "Transcript mailed"
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
