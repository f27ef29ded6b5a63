//! Outbound mail collaborator
//!
//! Mail leaves the system through a relay that accepts JSON over HTTP. When
//! no relay is configured the [`LogMailer`] records messages in the log
//! instead.

use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::info;

/// A message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("Message has no recipients")]
    NoRecipients,
}

/// Anything that can deliver a [`MailMessage`]
pub trait Mailer: Send + Sync {
    fn send(&self, message: &MailMessage) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Mailer posting messages to an HTTP relay
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
    sender: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(relay_url: String, sender: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url,
            sender,
            api_key,
        }
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let mut request = self.client.post(&self.relay_url).json(&RelayRequest {
            from: &self.sender,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        info!(recipients = message.to.len(), subject = %message.subject, "Mail sent");
        Ok(())
    }
}

/// Mailer that only logs
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        info!(
            to = ?message.to,
            subject = %message.subject,
            bytes = message.body.len(),
            "Mail relay not configured, message logged only"
        );
        Ok(())
    }
}

/// Either mailer, chosen from settings at startup
#[derive(Clone)]
pub enum AnyMailer {
    Http(HttpMailer),
    Log(LogMailer),
}

impl Mailer for AnyMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        match self {
            AnyMailer::Http(mailer) => mailer.send(message).await,
            AnyMailer::Log(mailer) => mailer.send(message).await,
        }
    }
}
