//! File fallback sender
//!
//! Appends one JSON line per message to `<directory>/<channel>.log`.

use crate::channels::{ChannelSender, DeliveryReceipt, SenderInfo};
use crate::error::{NotificationError, Result};
use crate::messages::{ChannelMessage, MessagePayload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fanout_shared::DeliveryChannel;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Serialize)]
struct FallbackRecord<'a> {
    logged_at: DateTime<Utc>,
    notification_id: &'a str,
    recipient_id: &'a str,
    channel: DeliveryChannel,
    destination: &'a str,
    payload: &'a MessagePayload,
}

pub struct FileSender {
    directory: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSender {
    /// Create the log directory if needed
    pub async fn new(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            NotificationError::config(format!(
                "Failed to create fallback directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        info!(directory = %directory.display(), "File fallback sender initialized");

        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    pub fn log_path(&self, channel: DeliveryChannel) -> PathBuf {
        self.directory.join(format!("{}.log", channel))
    }
}

#[async_trait]
impl ChannelSender for FileSender {
    async fn send(&self, message: &ChannelMessage) -> Result<DeliveryReceipt> {
        let record = FallbackRecord {
            logged_at: Utc::now(),
            notification_id: &message.notification_id,
            recipient_id: &message.recipient_id,
            channel: message.channel,
            destination: message.destination(),
            payload: &message.payload,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.log_path(message.channel);
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(
            notification_id = %message.notification_id,
            channel = %message.channel,
            path = %path.display(),
            "Message written to fallback log"
        );

        Ok(DeliveryReceipt::new("file", None))
    }

    fn get_sender_info(&self) -> SenderInfo {
        SenderInfo {
            name: "file".to_string(),
            description: format!("JSON lines under {}", self.directory.display()),
            fallback: true,
        }
    }
}
