//! Outbound email delivery.
//!
//! The transport is chosen once at startup: an HTTP API when the mail
//! endpoint is configured, otherwise messages are logged so flows stay
//! exercisable without a provider. Tests capture messages in memory.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivery transport chosen once at startup.
pub enum Mailer {
    /// Logs the message instead of sending it.
    Log,
    /// Sends through an HTTP mail provider.
    Http(HttpMailer),
    /// Captures messages for assertions in tests.
    Memory(MemoryMailer),
}

impl Mailer {
    #[must_use]
    pub fn log() -> Self {
        Self::Log
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn http(endpoint: String, api_key: SecretString, from: String) -> Result<Self> {
        Ok(Self::Http(HttpMailer::new(endpoint, api_key, from)?))
    }

    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryMailer::default())
    }

    /// # Errors
    /// Returns an error when the provider rejects or the request fails. The
    /// log and memory transports never fail.
    pub async fn send(&self, message: Message) -> Result<()> {
        match self {
            Self::Log => {
                info!(to = %message.to, subject = %message.subject, "email not sent, no mail endpoint configured");
                Ok(())
            }
            Self::Http(mailer) => mailer.send(message).await,
            Self::Memory(mailer) => {
                mailer.messages.lock().await.push(message);
                Ok(())
            }
        }
    }
}

#[derive(Serialize)]
struct SendPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    from: String,
}

impl HttpMailer {
    fn new(endpoint: String, api_key: SecretString, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(SEND_TIMEOUT)
            .build()
            .context("failed to build mail client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            from,
        })
    }

    async fn send(&self, message: Message) -> Result<()> {
        let payload = SendPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .context("mail request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("mail provider returned {status}");
        }
        info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

/// Test transport, keeps every message for later assertions.
#[derive(Default)]
pub struct MemoryMailer {
    messages: Mutex<Vec<Message>>,
}

impl MemoryMailer {
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }
}

/// Body of the account verification email.
#[must_use]
pub fn verification_email(name: &str, verify_url: &str) -> String {
    format!(
        "<p>Hi {name},</p>\
         <p>Welcome! Please confirm your email address to activate your account.</p>\
         <p><a href=\"{verify_url}\">Verify my email</a></p>\
         <p>If you did not sign up, you can ignore this message.</p>"
    )
}

/// Body of the password reset email.
#[must_use]
pub fn reset_email(name: &str, reset_url: &str) -> String {
    format!(
        "<p>Hi {name},</p>\
         <p>We received a request to reset your password. The link below is \
         valid for a limited time and can be used once.</p>\
         <p><a href=\"{reset_url}\">Reset my password</a></p>\
         <p>If you did not request this, you can ignore this message.</p>"
    )
}
