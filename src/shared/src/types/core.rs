//! Core domain types shared by the fan-out pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// NOTIFICATION TYPES AND DELIVERY CHANNELS
// ============================================================================

/// Kind of notification a caller asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    Email,
    Chat,
    MobileInApp,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Chat => write!(f, "chat"),
            Self::MobileInApp => write!(f, "mobile-in-app"),
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "chat" => Ok(Self::Chat),
            "mobile-in-app" | "mobile_in_app" => Ok(Self::MobileInApp),
            _ => Err(format!("Invalid notification type: {}", s)),
        }
    }
}

/// One delivery medium, each backed by its own queue and worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryChannel {
    Email,
    Chat,
    IosPush,
    AndroidPush,
}

impl DeliveryChannel {
    pub const ALL: [DeliveryChannel; 4] = [
        DeliveryChannel::Email,
        DeliveryChannel::Chat,
        DeliveryChannel::IosPush,
        DeliveryChannel::AndroidPush,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Chat => "chat",
            Self::IosPush => "ios-push",
            Self::AndroidPush => "android-push",
        }
    }
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RECIPIENTS AND DEVICES
// ============================================================================

/// Device platform reported by the user directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    /// Push queue serving this platform. Web devices have no push queue.
    pub fn push_channel(&self) -> Option<DeliveryChannel> {
        match self {
            Self::Ios => Some(DeliveryChannel::IosPush),
            Self::Android => Some(DeliveryChannel::AndroidPush),
            Self::Web => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ios => write!(f, "ios"),
            Self::Android => write!(f, "android"),
            Self::Web => write!(f, "web"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub token: String,
    pub platform: Platform,
    pub is_active: bool,
}

impl DeviceInfo {
    /// Whether this device takes part in push fan-out
    pub fn is_deliverable(&self) -> bool {
        self.is_active && !self.token.trim().is_empty()
    }
}

/// Contact details and devices for one recipient, owned by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub chat_handle: String,
    #[serde(default)]
    pub chat_channel: String,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

impl RecipientProfile {
    pub fn active_devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter().filter(|device| device.is_deliverable())
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Last known lifecycle state of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Scheduled,
    Sent,
    Failed,
    Cancelled,
}

impl NotificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Sent => write!(f, "sent"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Timestamped status entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: NotificationStatus,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_type_serde() {
        let json = serde_json::to_string(&NotificationType::MobileInApp).unwrap();
        assert_eq!(json, "\"mobile-in-app\"");

        let parsed: NotificationType = serde_json::from_str("\"email\"").unwrap();
        assert_eq!(parsed, NotificationType::Email);
        assert_eq!(
            "mobile-in-app".parse::<NotificationType>().unwrap(),
            NotificationType::MobileInApp
        );
        assert!("sms".parse::<NotificationType>().is_err());
    }

    #[test]
    fn test_platform_push_channel() {
        assert_eq!(Platform::Ios.push_channel(), Some(DeliveryChannel::IosPush));
        assert_eq!(
            Platform::Android.push_channel(),
            Some(DeliveryChannel::AndroidPush)
        );
        assert_eq!(Platform::Web.push_channel(), None);
    }

    #[test]
    fn test_active_devices_filter() {
        let profile = RecipientProfile {
            id: "user-1".to_string(),
            name: None,
            email: String::new(),
            chat_handle: String::new(),
            chat_channel: String::new(),
            devices: vec![
                DeviceInfo {
                    token: "a".to_string(),
                    platform: Platform::Ios,
                    is_active: true,
                },
                DeviceInfo {
                    token: "b".to_string(),
                    platform: Platform::Ios,
                    is_active: false,
                },
                DeviceInfo {
                    token: "  ".to_string(),
                    platform: Platform::Android,
                    is_active: true,
                },
            ],
        };

        let active: Vec<_> = profile.active_devices().map(|d| d.token.as_str()).collect();
        assert_eq!(active, vec!["a"]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(NotificationStatus::Scheduled.to_string(), "scheduled");
        assert!(NotificationStatus::Sent.is_terminal());
        assert!(!NotificationStatus::Pending.is_terminal());
    }
}
