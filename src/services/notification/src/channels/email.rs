//! Email sender implementation using SMTP

use crate::channels::{ChannelSender, DeliveryReceipt, SenderInfo};
use crate::config::EmailConfig;
use crate::error::{NotificationError, Result};
use crate::messages::{ChannelMessage, EmailMessage, MessagePayload};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tracing::{error, info};

/// Email sender for delivering messages via SMTP
#[derive(Clone)]
pub struct EmailSender {
    smtp_host: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailSender {
    /// Create a new email sender with the given configuration
    pub async fn new(config: &EmailConfig) -> Result<Self> {
        info!("Initializing email sender");

        let mut transport_builder = if config.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host).map_err(|e| {
                NotificationError::config(format!("Failed to create SMTP relay: {}", e))
            })?
        } else if config.smtp_use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host).map_err(
                |e| NotificationError::config(format!("Failed to create STARTTLS relay: {}", e)),
            )?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        transport_builder = transport_builder.port(config.smtp_port);

        if !config.smtp_username.is_empty() && !config.smtp_password.is_empty() {
            let creds =
                Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
            transport_builder = transport_builder.credentials(creds);
        }

        transport_builder = transport_builder.pool_config(PoolConfig::new().max_size(10));
        transport_builder =
            transport_builder.timeout(Some(Duration::from_secs(config.timeout_seconds)));

        let transport = transport_builder.build();

        info!("Email sender initialized successfully");

        Ok(Self {
            smtp_host: config.smtp_host.clone(),
            transport,
        })
    }

    /// Build an email from a rendered message
    fn build_message(&self, email: &EmailMessage) -> Result<Message> {
        let from = match &email.from_name {
            Some(name) => format!("{} <{}>", name, email.from),
            None => email.from.clone(),
        }
        .parse::<Mailbox>()
        .map_err(|e| NotificationError::email(format!("Invalid sender address: {}", e)))?;

        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::email(format!("Invalid recipient email: {}", e)))?;

        let content_type = if email.body.contains("<html>") || email.body.contains("<p>") {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .header(content_type)
            .body(email.body.clone())
            .map_err(|e| NotificationError::email(format!("Failed to build email message: {}", e)))
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    async fn send(&self, message: &ChannelMessage) -> Result<DeliveryReceipt> {
        let MessagePayload::Email(email) = &message.payload else {
            return Err(NotificationError::internal(format!(
                "email sender received a {} message",
                message.channel
            )));
        };

        let mail = self.build_message(email)?;

        match self.transport.send(mail).await {
            Ok(response) => {
                info!(
                    notification_id = %message.notification_id,
                    to = %email.to,
                    "Email accepted by SMTP server"
                );
                Ok(DeliveryReceipt::new(
                    "smtp",
                    Some(response.code().to_string()),
                ))
            }
            Err(e) => {
                error!(
                    notification_id = %message.notification_id,
                    "SMTP send failed: {}",
                    e
                );
                Err(NotificationError::email(format!("SMTP error: {}", e)))
            }
        }
    }

    fn get_sender_info(&self) -> SenderInfo {
        SenderInfo {
            name: "smtp".to_string(),
            description: format!("SMTP relay {}", self.smtp_host),
            fallback: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            smtp_username: "test".to_string(),
            smtp_password: "test".to_string(),
            smtp_use_tls: false,
            smtp_use_starttls: false,
            timeout_seconds: 5,
        }
    }

    fn email() -> EmailMessage {
        EmailMessage {
            subject: "Hi".to_string(),
            body: "Hello".to_string(),
            from: "a@b.com".to_string(),
            from_name: Some("Ops Team".to_string()),
            to: "john.doe@company.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_email_sender_creation() {
        let sender = EmailSender::new(&create_test_config()).await;
        assert!(sender.is_ok());
    }

    #[tokio::test]
    async fn test_build_message() {
        let sender = EmailSender::new(&create_test_config()).await.unwrap();
        let message = sender.build_message(&email()).unwrap();

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Subject: Hi"));
        assert!(formatted.contains("To: john.doe@company.com"));
        assert!(formatted.contains("Ops Team"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let sender = EmailSender::new(&create_test_config()).await.unwrap();
        let mut invalid = email();
        invalid.to = "not an address".to_string();

        assert!(matches!(
            sender.build_message(&invalid),
            Err(NotificationError::Email { .. })
        ));
    }
}
