use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {0:?}: {1}")]
    Address(String, String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("failed to configure SMTP transport: {0}")]
    Transport(String),
    #[error("failed to send mail: {0}")]
    Send(String),
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Mail(err.to_string())
    }
}

/// A plain-text message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// What a one-time code is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
}

impl OutgoingMail {
    /// Message carrying a one-time code.
    pub fn otp(to: &str, name: &str, purpose: OtpPurpose, code: &str, ttl_secs: u64) -> Self {
        let minutes = ttl_secs.div_ceil(60);
        let (subject, action) = match purpose {
            OtpPurpose::EmailVerification => ("Account Verification", "verify your account"),
            OtpPurpose::PasswordReset => ("Password Reset", "reset your password"),
        };
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: format!(
                "Hello {name},\n\nUse the following code to {action}: {code}\n\n\
                 The code expires in {minutes} minutes. If you did not request it, \
                 you can ignore this email.\n\nThank You!\n"
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// SMTP delivery through lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(config.from.clone(), e.to_string()))?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        }
        .map_err(|e| MailError::Transport(e.to_string()))?
        .port(config.smtp_port);

        let builder = if let (Some(username), Some(password)) = (&config.username, &config.password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(mail.to.clone(), e.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&mail.subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;
        info!(subject = %mail.subject, "Email sent");
        Ok(())
    }
}

/// Mailer that only logs. Used when `mail.enabled = false`.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "Mail delivery disabled; logging message instead"
        );
        Ok(())
    }
}

/// Pick the mailer for the configuration.
pub fn init_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    if config.enabled {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::warn!("Mail delivery disabled; one-time codes will only be logged");
        Ok(Arc::new(LogMailer))
    }
}
