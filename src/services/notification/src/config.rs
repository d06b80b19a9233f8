//! Configuration module for the notification fan-out service
//!
//! Configuration is layered with the `config` crate: built-in defaults, then an
//! optional file, then `NOTIFICATION__*` environment variables.

use fanout_shared::DeliveryChannel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for the notification service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// SMTP delivery for the email channel
    pub email: EmailConfig,

    /// Chat API delivery
    pub chat: ChatConfig,

    /// APNs and FCM delivery
    pub push: PushConfig,

    /// Per-channel queue capacity and worker counts
    pub queues: QueueConfig,

    /// Scheduling limits
    pub scheduler: SchedulerConfig,

    /// Log-file delivery for unconfigured channels
    pub fallback: FallbackConfig,

    /// Recipient directory seeding
    pub directory: DirectoryConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret required on API routes when set
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub smtp_use_starttls: bool,
    pub timeout_seconds: u64,
}

/// Chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub enabled: bool,
    pub api_url: String,
    pub token: String,
    pub timeout_seconds: u64,
}

/// Push notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub apns: ApnsConfig,
    pub fcm: FcmConfig,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub team_id: String,
    pub key_id: String,
    /// PKCS#8 PEM file holding the ES256 signing key
    pub private_key_path: String,
    /// Bundle id sent as `apns-topic`
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub server_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelQueueConfig {
    pub capacity: usize,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub email: ChannelQueueConfig,
    pub chat: ChannelQueueConfig,
    pub ios_push: ChannelQueueConfig,
    pub android_push: ChannelQueueConfig,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Furthest `scheduled_at` accepted, in days from now
    pub max_horizon_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub seed_demo_profiles: bool,
    /// JSON array of recipient profiles loaded at startup
    pub seed_file: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub namespace: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            email: EmailConfig::default(),
            chat: ChatConfig::default(),
            push: PushConfig::default(),
            queues: QueueConfig::default(),
            scheduler: SchedulerConfig::default(),
            fallback: FallbackConfig::default(),
            directory: DirectoryConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8086,
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .unwrap_or(587),
            smtp_username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_use_tls: false,
            smtp_use_starttls: true,
            timeout_seconds: 30,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: std::env::var("CHAT_API_URL").unwrap_or_default(),
            token: std::env::var("CHAT_API_TOKEN").unwrap_or_default(),
            timeout_seconds: 10,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            apns: ApnsConfig::default(),
            fcm: FcmConfig::default(),
            timeout_seconds: 10,
        }
    }
}

impl Default for ApnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.push.apple.com".to_string(),
            team_id: std::env::var("APNS_TEAM_ID").unwrap_or_default(),
            key_id: std::env::var("APNS_KEY_ID").unwrap_or_default(),
            private_key_path: std::env::var("APNS_PRIVATE_KEY_PATH").unwrap_or_default(),
            topic: std::env::var("APNS_TOPIC").unwrap_or_default(),
        }
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://fcm.googleapis.com/fcm/send".to_string(),
            server_key: std::env::var("FCM_SERVER_KEY").unwrap_or_default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            email: ChannelQueueConfig {
                capacity: 100,
                workers: 5,
            },
            chat: ChannelQueueConfig {
                capacity: 100,
                workers: 3,
            },
            ios_push: ChannelQueueConfig {
                capacity: 100,
                workers: 3,
            },
            android_push: ChannelQueueConfig {
                capacity: 100,
                workers: 3,
            },
        }
    }
}

impl QueueConfig {
    pub fn for_channel(&self, channel: DeliveryChannel) -> ChannelQueueConfig {
        match channel {
            DeliveryChannel::Email => self.email,
            DeliveryChannel::Chat => self.chat,
            DeliveryChannel::IosPush => self.ios_push,
            DeliveryChannel::AndroidPush => self.android_push,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_horizon_days: 365,
        }
    }
}

impl SchedulerConfig {
    pub fn max_horizon(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.max_horizon_days))
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            directory: std::env::var("NOTIFICATION_LOG_DIR")
                .unwrap_or_else(|_| "./logs/notifications".to_string()),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            seed_demo_profiles: true,
            seed_file: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "notification_fanout".to_string(),
        }
    }
}

impl NotificationConfig {
    /// Load configuration from environment variables and the file named by
    /// `NOTIFICATION_CONFIG_FILE`
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config_file = std::env::var("NOTIFICATION_CONFIG_FILE").ok();
        Self::load(config_file.as_deref())
    }

    /// Load configuration from defaults, an optional file and the environment
    pub fn load(config_file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut cfg = config::Config::builder();

        cfg = cfg.add_source(config::Config::try_from(&NotificationConfig::default())?);

        if let Some(config_file) = config_file {
            cfg = cfg.add_source(config::File::with_name(config_file).required(true));
        }

        cfg = cfg.add_source(
            config::Environment::with_prefix("NOTIFICATION")
                .separator("__")
                .try_parsing(true),
        );

        cfg.build()?.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        for channel in DeliveryChannel::ALL {
            let queue = self.queues.for_channel(channel);
            if queue.capacity == 0 {
                return Err(format!("Queue capacity for {} must be greater than 0", channel));
            }
            if queue.workers == 0 {
                return Err(format!("Worker count for {} must be greater than 0", channel));
            }
        }

        if self.scheduler.max_horizon_days == 0 {
            return Err("Scheduler horizon must be at least one day".to_string());
        }

        if self.fallback.directory.trim().is_empty() {
            return Err("Fallback log directory is required".to_string());
        }

        if self.email.enabled && self.email.smtp_host.is_empty() {
            return Err("SMTP host is required when email is enabled".to_string());
        }

        if self.chat.enabled && self.chat.api_url.is_empty() {
            return Err("Chat API URL is required when chat is enabled".to_string());
        }

        if self.push.apns.enabled {
            let apns = &self.push.apns;
            if apns.team_id.is_empty()
                || apns.key_id.is_empty()
                || apns.private_key_path.is_empty()
                || apns.topic.is_empty()
            {
                return Err(
                    "APNs team id, key id, private key path and topic are required when APNs is enabled"
                        .to_string(),
                );
            }
        }

        if self.push.fcm.enabled && self.push.fcm.server_key.is_empty() {
            return Err("FCM server key is required when FCM is enabled".to_string());
        }

        Ok(())
    }

    /// Get timeout duration for the specified operation
    pub fn get_timeout(&self, operation: &str) -> Duration {
        let seconds = match operation {
            "email" => self.email.timeout_seconds,
            "chat" => self.chat.timeout_seconds,
            "push" => self.push.timeout_seconds,
            "server" => self.server.timeout_seconds,
            _ => 30,
        };
        Duration::from_secs(seconds)
    }
}
