//! Push notification senders for APNs and FCM

use crate::channels::{ChannelSender, DeliveryReceipt, SenderInfo};
use crate::config::{ApnsConfig, FcmConfig};
use crate::error::{NotificationError, Result};
use crate::messages::{ChannelMessage, MessagePayload, PushMessage};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// APNs rejects provider tokens older than an hour
const APNS_TOKEN_LIFETIME: Duration = Duration::from_secs(50 * 60);

fn push_payload<'a>(message: &'a ChannelMessage, sender: &str) -> Result<&'a PushMessage> {
    match &message.payload {
        MessagePayload::Push(push) => Ok(push),
        _ => Err(NotificationError::internal(format!(
            "{} sender received a {} message",
            sender, message.channel
        ))),
    }
}

// ============================================================================
// APNS
// ============================================================================

#[derive(Debug, Serialize)]
struct ProviderClaims<'a> {
    iss: &'a str,
    iat: i64,
}

struct CachedToken {
    token: String,
    issued: Instant,
}

/// iOS push via the APNs HTTP API with token-based authentication
pub struct ApnsSender {
    client: reqwest::Client,
    endpoint: String,
    team_id: String,
    key_id: String,
    topic: String,
    signing_key: EncodingKey,
    provider_token: Mutex<Option<CachedToken>>,
}

impl ApnsSender {
    /// Load the signing key from `private_key_path`
    pub async fn new(config: &ApnsConfig, timeout: Duration) -> Result<Self> {
        let pem = tokio::fs::read(&config.private_key_path).await.map_err(|e| {
            NotificationError::config(format!(
                "Failed to read APNs key {}: {}",
                config.private_key_path, e
            ))
        })?;
        Self::with_key_pem(config, &pem, timeout)
    }

    pub fn with_key_pem(config: &ApnsConfig, pem: &[u8], timeout: Duration) -> Result<Self> {
        info!("Initializing APNs sender");

        let signing_key = EncodingKey::from_ec_pem(pem)
            .map_err(|e| NotificationError::config(format!("Invalid APNs signing key: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            team_id: config.team_id.clone(),
            key_id: config.key_id.clone(),
            topic: config.topic.clone(),
            signing_key,
            provider_token: Mutex::new(None),
        })
    }

    /// Current provider token, re-signed once it nears expiry
    fn provider_token(&self) -> Result<String> {
        let mut cached = self.provider_token.lock();
        if let Some(existing) = cached.as_ref() {
            if existing.issued.elapsed() < APNS_TOKEN_LIFETIME {
                return Ok(existing.token.clone());
            }
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = ProviderClaims {
            iss: &self.team_id,
            iat: chrono::Utc::now().timestamp(),
        };
        let token = jsonwebtoken::encode(&header, &claims, &self.signing_key)?;
        debug!(key_id = %self.key_id, "Signed new APNs provider token");

        *cached = Some(CachedToken {
            token: token.clone(),
            issued: Instant::now(),
        });
        Ok(token)
    }
}

#[async_trait]
impl ChannelSender for ApnsSender {
    async fn send(&self, message: &ChannelMessage) -> Result<DeliveryReceipt> {
        let push = push_payload(message, "APNs")?;
        let url = format!("{}/3/device/{}", self.endpoint, push.device_token);
        let body = json!({
            "aps": {
                "alert": {"title": push.title, "body": push.body},
                "sound": "default"
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.provider_token()?)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "alert")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let apns_id = response
            .headers()
            .get("apns-id")
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        if !status.is_success() {
            let reason = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("reason").and_then(|r| r.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());
            error!(
                notification_id = %message.notification_id,
                %status,
                %reason,
                "APNs rejected push"
            );
            return Err(NotificationError::push(format!("APNs rejected push: {}", reason)));
        }

        info!(notification_id = %message.notification_id, "APNs accepted push");
        Ok(DeliveryReceipt::new("apns", apns_id))
    }

    fn get_sender_info(&self) -> SenderInfo {
        SenderInfo {
            name: "apns".to_string(),
            description: format!("APNs {} for {}", self.endpoint, self.topic),
            fallback: false,
        }
    }
}

// ============================================================================
// FCM
// ============================================================================

#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

/// Android push via FCM with server-key authentication
pub struct FcmSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmSender {
    pub fn new(config: &FcmConfig, timeout: Duration) -> Result<Self> {
        info!("Initializing FCM sender");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            server_key: config.server_key.clone(),
        })
    }
}

#[async_trait]
impl ChannelSender for FcmSender {
    async fn send(&self, message: &ChannelMessage) -> Result<DeliveryReceipt> {
        let push = push_payload(message, "FCM")?;
        let body = json!({
            "to": push.device_token,
            "notification": {"title": push.title, "body": push.body}
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(notification_id = %message.notification_id, %status, "FCM request failed");
            return Err(NotificationError::push(format!("FCM returned {}", status)));
        }

        let result: FcmResponse = response.json().await?;
        let first = result.results.into_iter().next();
        if result.failure > 0 {
            let reason = first
                .and_then(|r| r.error)
                .unwrap_or_else(|| "unknown error".to_string());
            error!(notification_id = %message.notification_id, %reason, "FCM rejected push");
            return Err(NotificationError::push(format!("FCM rejected push: {}", reason)));
        }

        info!(notification_id = %message.notification_id, "FCM accepted push");
        Ok(DeliveryReceipt::new("fcm", first.and_then(|r| r.message_id)))
    }

    fn get_sender_info(&self) -> SenderInfo {
        SenderInfo {
            name: "fcm".to_string(),
            description: format!("FCM at {}", self.endpoint),
            fallback: false,
        }
    }
}
