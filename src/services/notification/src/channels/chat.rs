//! Chat sender posting messages to an HTTP chat API

use crate::channels::{ChannelSender, DeliveryReceipt, SenderInfo};
use crate::config::ChatConfig;
use crate::error::{NotificationError, Result};
use crate::messages::{ChannelMessage, MessagePayload};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

#[derive(Serialize)]
struct ChatPost<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub struct ChatSender {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl ChatSender {
    pub fn new(config: &ChatConfig, timeout: Duration) -> Result<Self> {
        info!("Initializing chat sender");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl ChannelSender for ChatSender {
    async fn send(&self, message: &ChannelMessage) -> Result<DeliveryReceipt> {
        let MessagePayload::Chat(chat) = &message.payload else {
            return Err(NotificationError::internal(format!(
                "chat sender received a {} message",
                message.channel
            )));
        };

        let mut request = self.client.post(&self.api_url).json(&ChatPost {
            channel: &chat.channel,
            text: &chat.text,
        });
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                notification_id = %message.notification_id,
                %status,
                "Chat API rejected message"
            );
            return Err(NotificationError::chat(format!(
                "Chat API returned {}: {}",
                status, body
            )));
        }

        let message_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("id").and_then(|id| id.as_str()).map(String::from));

        info!(
            notification_id = %message.notification_id,
            channel = %chat.channel,
            "Chat message posted"
        );

        Ok(DeliveryReceipt::new("chat-api", message_id))
    }

    fn get_sender_info(&self) -> SenderInfo {
        SenderInfo {
            name: "chat-api".to_string(),
            description: format!("Chat API at {}", self.api_url),
            fallback: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ChatMessage;
    use fanout_shared::DeliveryChannel;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender(server: &MockServer) -> ChatSender {
        ChatSender::new(
            &ChatConfig {
                enabled: true,
                api_url: format!("{}/api/messages", server.uri()),
                token: "chat-token".to_string(),
                timeout_seconds: 5,
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn chat_message() -> ChannelMessage {
        ChannelMessage {
            notification_id: "n-1".to_string(),
            recipient_id: "user-001".to_string(),
            channel: DeliveryChannel::Chat,
            payload: MessagePayload::Chat(ChatMessage {
                text: "deploy finished".to_string(),
                channel: "C-JOHN-DOE".to_string(),
            }),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_posts_channel_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/messages"))
            .and(header("authorization", "Bearer chat-token"))
            .and(body_json(json!({"channel": "C-JOHN-DOE", "text": "deploy finished"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg-42"})))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = sender(&server).send(&chat_message()).await.unwrap();
        assert_eq!(receipt.provider, "chat-api");
        assert_eq!(receipt.provider_message_id.as_deref(), Some("msg-42"));
    }

    #[tokio::test]
    async fn test_error_status_is_chat_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        match sender(&server).send(&chat_message()).await {
            Err(NotificationError::Chat { message }) => assert!(message.contains("500")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
