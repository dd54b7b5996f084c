use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use thiserror::Error;

use crate::config::Settings;

/// Errors that can occur when sending email
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A rendered HTML email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers rendered emails
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// SMTP delivery over a STARTTLS relay
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpEmailSender {
    pub fn new(host: &str, port: u16, user: &str, password: &str, from: &str) -> Result<Self, EmailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();

        Ok(Self {
            transport,
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(message.to.parse()?)
            .subject(message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html)?;

        self.transport.send(email).await?;
        tracing::info!("Email sent to {}", message.to);
        Ok(())
    }
}

/// Used when SMTP is not configured; drops every message
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        tracing::warn!("SMTP not configured, skipping email to {}", message.to);
        Ok(())
    }
}

/// Renders account emails and hands them to a sender
#[derive(Clone)]
pub struct EmailService {
    sender: Arc<dyn EmailSender>,
    frontend_url: String,
}

impl EmailService {
    pub fn new(sender: Arc<dyn EmailSender>, frontend_url: impl Into<String>) -> Self {
        let frontend_url: String = frontend_url.into();
        Self {
            sender,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from settings; falls back to a disabled sender if any SMTP field is missing
    pub fn from_settings(settings: &Settings) -> Result<Self, EmailError> {
        let email = &settings.email;
        let sender: Arc<dyn EmailSender> = match (
            email.smtp_host.as_deref(),
            email.smtp_user.as_deref(),
            email.smtp_password.as_deref(),
            settings.from_email(),
        ) {
            (Some(host), Some(user), Some(password), Some(from)) => {
                tracing::info!("Sending email through {}:{}", host, email.smtp_port);
                Arc::new(SmtpEmailSender::new(host, email.smtp_port, user, password, from)?)
            }
            _ => {
                tracing::warn!("SMTP settings incomplete, outgoing email is disabled");
                Arc::new(DisabledEmailSender)
            }
        };

        Ok(Self::new(sender, email.frontend_url.clone()))
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/verify-email?token={}", self.frontend_url, urlencoding::encode(token))
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.frontend_url, urlencoding::encode(token))
    }

    pub fn verification_email(&self, to: &str, name: &str, token: &str) -> EmailMessage {
        let link = self.verification_link(token);
        EmailMessage {
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            html: format!(
                "<html><body>\
                 <p>Hello {name},</p>\
                 <p>Please confirm your email address by clicking the link below:</p>\
                 <p><a href=\"{link}\">Verify email</a></p>\
                 <p>This link expires in 24 hours.</p>\
                 </body></html>",
                name = escape_html(name),
                link = link,
            ),
        }
    }

    pub fn password_reset_email(&self, to: &str, name: &str, token: &str) -> EmailMessage {
        let link = self.reset_link(token);
        EmailMessage {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            html: format!(
                "<html><body>\
                 <p>Hello {name},</p>\
                 <p>We received a request to reset your password. Use the link below to choose a new one:</p>\
                 <p><a href=\"{link}\">Reset password</a></p>\
                 <p>If you did not ask for this, you can ignore this email.</p>\
                 </body></html>",
                name = escape_html(name),
                link = link,
            ),
        }
    }

    /// Send in the background; failures are logged only
    pub fn dispatch(&self, message: EmailMessage) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let to = message.to.clone();
            if let Err(e) = sender.send(message).await {
                tracing::error!("Failed to send email to {}: {}", to, e);
            }
        });
    }

    pub fn send_verification_email(&self, to: &str, name: &str, token: &str) {
        self.dispatch(self.verification_email(to, name, token));
    }

    pub fn send_password_reset_email(&self, to: &str, name: &str, token: &str) {
        self.dispatch(self.password_reset_email(to, name, token));
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
