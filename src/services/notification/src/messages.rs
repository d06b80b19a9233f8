//! Channel content and message construction
//!
//! The generic content map of a request is converted once, as soon as the
//! notification type is known, into a [`ChannelContent`]. From there each
//! resolved recipient is turned into zero or more [`ChannelMessage`]s, one per
//! destination: an email address, a chat channel, or an active device token.

use crate::error::{NotificationError, Result};
use fanout_shared::{
    ContentMap, DeliveryChannel, NotificationType, RecipientProfile, SenderAddress,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CONTENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
    pub from: SenderAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushContent {
    pub title: String,
    pub body: String,
}

/// Content typed by channel, used for every recipient of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChannelContent {
    Email(EmailContent),
    Chat(ChatContent),
    Push(PushContent),
}

impl ChannelContent {
    /// Convert the generic content map for `notification_type`
    pub fn from_content(
        notification_type: NotificationType,
        content: &ContentMap,
        from: Option<&SenderAddress>,
    ) -> Result<Self> {
        match notification_type {
            NotificationType::Email => {
                let from = from.cloned().ok_or_else(|| {
                    NotificationError::validation(
                        "from.email",
                        "is required for email notifications",
                    )
                })?;
                Ok(Self::Email(EmailContent {
                    subject: required_text(content, "subject", &["subject"], notification_type)?,
                    body: required_text(content, "body", &["body", "email_body"], notification_type)?,
                    from,
                }))
            }
            NotificationType::Chat => Ok(Self::Chat(ChatContent {
                text: required_text(content, "text", &["text", "chat_text"], notification_type)?,
            })),
            NotificationType::MobileInApp => Ok(Self::Push(PushContent {
                title: required_text(content, "title", &["title", "push_title"], notification_type)?,
                body: required_text(content, "body", &["body", "push_body"], notification_type)?,
            })),
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            Self::Email(_) => NotificationType::Email,
            Self::Chat(_) => NotificationType::Chat,
            Self::Push(_) => NotificationType::MobileInApp,
        }
    }
}

/// First present key among `keys`, as text
fn required_text(
    content: &ContentMap,
    field: &str,
    keys: &[&str],
    notification_type: NotificationType,
) -> Result<String> {
    keys.iter()
        .filter_map(|key| content.get(*key))
        .find_map(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .ok_or_else(|| {
            NotificationError::validation(
                format!("content.{}", field),
                format!("is required for {} notifications", notification_type),
            )
        })
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub device_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Email(EmailMessage),
    Chat(ChatMessage),
    Push(PushMessage),
}

/// A rendered, recipient-bound unit placed on one delivery queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub notification_id: String,
    pub recipient_id: String,
    pub channel: DeliveryChannel,
    pub payload: MessagePayload,
    pub created_at: DateTime<Utc>,
}

impl ChannelMessage {
    /// Address, chat channel or device token this message goes to
    pub fn destination(&self) -> &str {
        match &self.payload {
            MessagePayload::Email(email) => &email.to,
            MessagePayload::Chat(chat) => &chat.channel,
            MessagePayload::Push(push) => &push.device_token,
        }
    }
}

/// Why a recipient produced no messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoEmailAddress,
    NoChatChannel,
    NoActiveDevices,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEmailAddress => write!(f, "no email address"),
            Self::NoChatChannel => write!(f, "no chat channel"),
            Self::NoActiveDevices => write!(f, "no active devices"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Messages(Vec<ChannelMessage>),
    Skipped(SkipReason),
}

/// Build every message one recipient should receive
pub fn build_messages(
    notification_id: &str,
    content: &ChannelContent,
    profile: &RecipientProfile,
) -> BuildOutcome {
    let now = Utc::now();
    let message = |channel: DeliveryChannel, payload: MessagePayload| ChannelMessage {
        notification_id: notification_id.to_string(),
        recipient_id: profile.id.clone(),
        channel,
        payload,
        created_at: now,
    };

    let outcome = match content {
        ChannelContent::Email(email) => {
            if profile.email.trim().is_empty() {
                BuildOutcome::Skipped(SkipReason::NoEmailAddress)
            } else {
                BuildOutcome::Messages(vec![message(
                    DeliveryChannel::Email,
                    MessagePayload::Email(EmailMessage {
                        subject: email.subject.clone(),
                        body: email.body.clone(),
                        from: email.from.email.clone(),
                        from_name: email.from.name.clone(),
                        to: profile.email.clone(),
                    }),
                )])
            }
        }
        ChannelContent::Chat(chat) => {
            if profile.chat_channel.trim().is_empty() {
                BuildOutcome::Skipped(SkipReason::NoChatChannel)
            } else {
                BuildOutcome::Messages(vec![message(
                    DeliveryChannel::Chat,
                    MessagePayload::Chat(ChatMessage {
                        text: chat.text.clone(),
                        channel: profile.chat_channel.clone(),
                    }),
                )])
            }
        }
        ChannelContent::Push(push) => {
            let messages: Vec<ChannelMessage> = profile
                .active_devices()
                .filter_map(|device| match device.platform.push_channel() {
                    Some(channel) => Some(message(
                        channel,
                        MessagePayload::Push(PushMessage {
                            title: push.title.clone(),
                            body: push.body.clone(),
                            device_token: device.token.clone(),
                        }),
                    )),
                    None => {
                        debug!(
                            recipient_id = %profile.id,
                            platform = %device.platform,
                            "No push queue for device platform"
                        );
                        None
                    }
                })
                .collect();

            if messages.is_empty() {
                BuildOutcome::Skipped(SkipReason::NoActiveDevices)
            } else {
                BuildOutcome::Messages(messages)
            }
        }
    };

    if let BuildOutcome::Skipped(reason) = &outcome {
        info!(
            notification_id = %notification_id,
            recipient_id = %profile.id,
            %reason,
            "Recipient skipped"
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_shared::{DeviceInfo, Platform};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn content_map(value: serde_json::Value) -> ContentMap {
        serde_json::from_value(value).unwrap()
    }

    fn profile() -> RecipientProfile {
        RecipientProfile {
            id: "user-001".to_string(),
            name: None,
            email: "john.doe@company.com".to_string(),
            chat_handle: "@john".to_string(),
            chat_channel: "C-JOHN".to_string(),
            devices: vec![
                DeviceInfo {
                    token: "ios-a".to_string(),
                    platform: Platform::Ios,
                    is_active: true,
                },
                DeviceInfo {
                    token: "ios-b".to_string(),
                    platform: Platform::Ios,
                    is_active: false,
                },
                DeviceInfo {
                    token: "android-a".to_string(),
                    platform: Platform::Android,
                    is_active: true,
                },
            ],
        }
    }

    fn push_content() -> ChannelContent {
        ChannelContent::Push(PushContent {
            title: "Build".to_string(),
            body: "Green".to_string(),
        })
    }

    #[test]
    fn test_email_content_accepts_email_body_alias() {
        let content = ChannelContent::from_content(
            NotificationType::Email,
            &content_map(json!({"subject": "Hi", "email_body": "Hello"})),
            Some(&SenderAddress {
                email: "a@b.com".to_string(),
                name: None,
            }),
        )
        .unwrap();

        match content {
            ChannelContent::Email(email) => {
                assert_eq!(email.subject, "Hi");
                assert_eq!(email.body, "Hello");
                assert_eq!(email.from.email, "a@b.com");
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_missing_content_field_is_validation_error() {
        let result = ChannelContent::from_content(
            NotificationType::MobileInApp,
            &content_map(json!({"title": "Only title"})),
            None,
        );
        match result {
            Err(NotificationError::Validation { field, .. }) => assert_eq!(field, "content.body"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_push_fan_out_one_message_per_active_device() {
        let outcome = build_messages("n-1", &push_content(), &profile());

        let BuildOutcome::Messages(messages) = outcome else {
            panic!("expected messages");
        };
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].channel, DeliveryChannel::IosPush);
        assert_eq!(messages[0].destination(), "ios-a");
        assert_eq!(messages[1].channel, DeliveryChannel::AndroidPush);
        assert_eq!(messages[1].destination(), "android-a");
    }

    #[test]
    fn test_push_without_active_devices_is_skipped() {
        let mut recipient = profile();
        recipient.devices.iter_mut().for_each(|d| d.is_active = false);
        recipient.devices.push(DeviceInfo {
            token: "web-1".to_string(),
            platform: Platform::Web,
            is_active: true,
        });

        assert_eq!(
            build_messages("n-1", &push_content(), &recipient),
            BuildOutcome::Skipped(SkipReason::NoActiveDevices)
        );
    }

    #[test]
    fn test_email_requires_address() {
        let content = ChannelContent::Email(EmailContent {
            subject: "Hi".to_string(),
            body: "Hello".to_string(),
            from: SenderAddress {
                email: "a@b.com".to_string(),
                name: Some("Ops".to_string()),
            },
        });

        let BuildOutcome::Messages(messages) = build_messages("n-1", &content, &profile()) else {
            panic!("expected messages");
        };
        assert_eq!(
            messages[0].payload,
            MessagePayload::Email(EmailMessage {
                subject: "Hi".to_string(),
                body: "Hello".to_string(),
                from: "a@b.com".to_string(),
                from_name: Some("Ops".to_string()),
                to: "john.doe@company.com".to_string(),
            })
        );

        let mut no_email = profile();
        no_email.email.clear();
        assert_eq!(
            build_messages("n-1", &content, &no_email),
            BuildOutcome::Skipped(SkipReason::NoEmailAddress)
        );
    }

    #[test]
    fn test_chat_uses_profile_channel() {
        let content = ChannelContent::Chat(ChatContent {
            text: "deploy done".to_string(),
        });

        let BuildOutcome::Messages(messages) = build_messages("n-1", &content, &profile()) else {
            panic!("expected messages");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].destination(), "C-JOHN");

        let mut no_chat = profile();
        no_chat.chat_channel.clear();
        assert_eq!(
            build_messages("n-1", &content, &no_chat),
            BuildOutcome::Skipped(SkipReason::NoChatChannel)
        );
    }
}
