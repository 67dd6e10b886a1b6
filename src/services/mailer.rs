//! Outbound receipt mail over SMTP.

use crate::{config::AppConfig, errors::CollaboratorError};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A rendered email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEmail {
    pub to_name: Option<String>,
    pub to_email: String,
    pub subject: String,
    pub html_body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderMailer: Send + Sync {
    async fn send(&self, email: &OrderEmail) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    /// Implicit TLS
    pub primary_port: u16,
    /// STARTTLS
    pub fallback_port: u16,
    pub username: String,
    pub password: String,
    /// lettre's single timeout: connect, greeting and each socket operation.
    pub timeout: Duration,
    pub from_address: String,
    pub from_name: String,
    pub admin_bcc: Option<String>,
}

impl SmtpSettings {
    /// `None` unless mail is enabled and fully configured.
    pub fn from_config(cfg: &AppConfig) -> Option<Self> {
        if !cfg.mail_enabled {
            return None;
        }
        Some(Self {
            host: cfg.smtp_host.clone(),
            primary_port: cfg.smtp_primary_port,
            fallback_port: cfg.smtp_fallback_port,
            username: cfg.smtp_username.clone()?,
            password: cfg.smtp_password.clone()?,
            timeout: Duration::from_secs(cfg.smtp_timeout_secs),
            from_address: cfg.mail_from.clone()?,
            from_name: cfg.store_name.clone(),
            admin_bcc: cfg.mail_admin_bcc.clone().filter(|a| !a.trim().is_empty()),
        })
    }
}

fn mailbox(name: Option<String>, address: &str) -> Result<Mailbox, CollaboratorError> {
    let address = address
        .trim()
        .parse()
        .map_err(|e| CollaboratorError::InvalidMessage(format!("invalid address {}: {}", address, e)))?;
    Ok(Mailbox::new(name, address))
}

/// Tries `primary` once, then `fallback` once.
pub async fn deliver_with_fallback<P, PF, F, FF>(
    primary: P,
    fallback: F,
) -> Result<(), CollaboratorError>
where
    P: FnOnce() -> PF,
    PF: Future<Output = Result<(), String>>,
    F: FnOnce() -> FF,
    FF: Future<Output = Result<(), String>>,
{
    let primary_err = match primary().await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    warn!(error = %primary_err, "primary SMTP port failed, retrying on fallback port");

    fallback().await.map_err(|fallback_err| {
        CollaboratorError::Delivery(format!(
            "primary: {}; fallback: {}",
            primary_err, fallback_err
        ))
    })
}

/// SMTP mailer with an implicit-TLS primary port and a STARTTLS fallback.
#[derive(Clone)]
pub struct SmtpMailer {
    settings: SmtpSettings,
    primary: AsyncSmtpTransport<Tokio1Executor>,
    fallback: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Result<Self, CollaboratorError> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let primary = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| CollaboratorError::Delivery(format!("primary transport: {}", e)))?
            .port(settings.primary_port)
            .credentials(credentials.clone())
            .timeout(Some(settings.timeout))
            .build();

        let fallback = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| CollaboratorError::Delivery(format!("fallback transport: {}", e)))?
            .port(settings.fallback_port)
            .credentials(credentials)
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self {
            settings,
            primary,
            fallback,
        })
    }

    /// Builds the MIME message, BCC'ing the admin address when configured.
    pub fn build_message(&self, email: &OrderEmail) -> Result<Message, CollaboratorError> {
        let mut builder = Message::builder()
            .from(mailbox(
                Some(self.settings.from_name.clone()),
                &self.settings.from_address,
            )?)
            .to(mailbox(email.to_name.clone(), &email.to_email)?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML);

        if let Some(bcc) = &self.settings.admin_bcc {
            builder = builder.bcc(mailbox(None, bcc)?);
        }

        builder
            .body(email.html_body.clone())
            .map_err(|e| CollaboratorError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl OrderMailer for SmtpMailer {
    #[instrument(skip(self, email), fields(to = %email.to_email))]
    async fn send(&self, email: &OrderEmail) -> Result<(), CollaboratorError> {
        let message = self.build_message(email)?;
        let fallback_message = message.clone();
        let (primary, fallback) = (&self.primary, &self.fallback);

        deliver_with_fallback(
            move || async move {
                primary
                    .send(message)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            },
            move || async move {
                fallback
                    .send(fallback_message)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            },
        )
        .await?;

        info!("receipt email sent");
        Ok(())
    }
}
