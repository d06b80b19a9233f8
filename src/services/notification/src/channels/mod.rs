//! Channel senders
//!
//! This module contains the delivery backends used by queue workers:
//! - Email channel (SMTP)
//! - Chat channel (HTTP API)
//! - iOS push (APNs) and Android push (FCM)
//! - File fallback for channels without a configured backend

use crate::config::NotificationConfig;
use crate::error::Result;
use crate::messages::ChannelMessage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fanout_shared::DeliveryChannel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod chat;
pub mod email;
pub mod file;
pub mod push;

pub use chat::ChatSender;
pub use email::EmailSender;
pub use file::FileSender;
pub use push::{ApnsSender, FcmSender};

/// Trait that every delivery backend implements
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Deliver one message
    async fn send(&self, message: &ChannelMessage) -> Result<DeliveryReceipt>;

    /// Describe this backend
    fn get_sender_info(&self) -> SenderInfo;
}

/// Acknowledgement returned by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    pub fn new(provider: impl Into<String>, provider_message_id: Option<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_message_id,
            accepted_at: Utc::now(),
        }
    }
}

/// Information about a delivery backend
#[derive(Debug, Clone)]
pub struct SenderInfo {
    pub name: String,
    pub description: String,
    pub fallback: bool,
}

/// One sender per delivery channel
#[derive(Clone)]
pub struct ChannelSenders {
    senders: HashMap<DeliveryChannel, Arc<dyn ChannelSender>>,
}

impl ChannelSenders {
    /// Every channel delivers through `sender`
    pub fn uniform(sender: Arc<dyn ChannelSender>) -> Self {
        let senders = DeliveryChannel::ALL
            .into_iter()
            .map(|channel| (channel, sender.clone()))
            .collect();
        Self { senders }
    }

    /// Build senders from configuration. Channels that are not enabled write to
    /// the fallback log directory.
    pub async fn from_config(config: &NotificationConfig) -> Result<Self> {
        info!("Initializing channel senders");

        let fallback: Arc<dyn ChannelSender> =
            Arc::new(FileSender::new(&config.fallback.directory).await?);
        let mut senders = Self::uniform(fallback);

        if config.email.enabled {
            senders = senders.with_sender(
                DeliveryChannel::Email,
                Arc::new(EmailSender::new(&config.email).await?),
            );
        }

        if config.chat.enabled {
            senders = senders.with_sender(
                DeliveryChannel::Chat,
                Arc::new(ChatSender::new(
                    &config.chat,
                    Duration::from_secs(config.chat.timeout_seconds),
                )?),
            );
        }

        let push_timeout = Duration::from_secs(config.push.timeout_seconds);
        if config.push.apns.enabled {
            senders = senders.with_sender(
                DeliveryChannel::IosPush,
                Arc::new(ApnsSender::new(&config.push.apns, push_timeout).await?),
            );
        }

        if config.push.fcm.enabled {
            senders = senders.with_sender(
                DeliveryChannel::AndroidPush,
                Arc::new(FcmSender::new(&config.push.fcm, push_timeout)?),
            );
        }

        for (channel, sender) in &senders.senders {
            let sender_info = sender.get_sender_info();
            info!(
                %channel,
                sender = %sender_info.name,
                fallback = sender_info.fallback,
                "Channel sender ready"
            );
        }

        Ok(senders)
    }

    pub fn with_sender(mut self, channel: DeliveryChannel, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(channel, sender);
        self
    }

    pub fn get(&self, channel: DeliveryChannel) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(&channel).cloned()
    }
}
