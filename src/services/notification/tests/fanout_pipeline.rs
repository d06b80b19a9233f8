//! # Integration Tests for the Fan-Out Pipeline
//!
//! Drives the manager end to end against the seeded in-memory directory and
//! inspects what lands on the channel queues.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fanout_shared::{CreateTemplateRequest, DeliveryChannel, NotificationRequest};
use notification_fanout::{
    config::{MetricsConfig, NotificationConfig},
    directory::InMemoryDirectory,
    messages::MessagePayload,
    metrics::NotificationMetrics,
    queue::QueueReceivers,
    renderer::TemplateError,
    ChannelMessage, ChannelQueues, NotificationError, NotificationManager, NotificationStatus,
    NotificationType, Scheduler, StatusStore, TemplateStore,
};

struct Harness {
    manager: NotificationManager,
    receivers: QueueReceivers,
    shutdown: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        let config = NotificationConfig::default();
        let (queues, receivers) = ChannelQueues::new(&config.queues);
        let scheduler = Scheduler::new();
        let shutdown = CancellationToken::new();
        scheduler.start(shutdown.clone());

        let manager = NotificationManager::new(
            &config,
            Arc::new(InMemoryDirectory::with_seed_data()),
            TemplateStore::new(),
            StatusStore::new(),
            queues,
            scheduler,
            NotificationMetrics::new(&MetricsConfig::default()).unwrap(),
        );

        Self {
            manager,
            receivers,
            shutdown,
        }
    }

    fn receiver(&mut self, channel: DeliveryChannel) -> mpsc::Receiver<ChannelMessage> {
        self.receivers.take(channel).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn request(value: serde_json::Value) -> NotificationRequest {
    serde_json::from_value(value).unwrap()
}

fn drain(receiver: &mut mpsc::Receiver<ChannelMessage>) -> Vec<ChannelMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = receiver.try_recv() {
        messages.push(message);
    }
    messages
}

#[tokio::test]
async fn test_email_is_sent_to_directory_address() {
    let mut harness = Harness::new();
    let mut email = harness.receiver(DeliveryChannel::Email);

    let response = harness
        .manager
        .process(request(json!({
            "type": "email",
            "content": {"subject": "Hi", "email_body": "Hello"},
            "recipients": ["user-001"],
            "from": {"email": "a@b.com"}
        })))
        .await
        .unwrap();

    assert_eq!(response.status, NotificationStatus::Sent);
    assert!(uuid::Uuid::parse_str(&response.id).is_ok());

    let messages = drain(&mut email);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].notification_id, response.id);
    assert_eq!(messages[0].recipient_id, "user-001");
    match &messages[0].payload {
        MessagePayload::Email(message) => {
            assert_eq!(message.to, "john.doe@company.com");
            assert_eq!(message.subject, "Hi");
            assert_eq!(message.body, "Hello");
            assert_eq!(message.from, "a@b.com");
        }
        other => panic!("expected email payload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_email_without_sender_is_rejected() {
    let mut harness = Harness::new();
    let mut email = harness.receiver(DeliveryChannel::Email);

    let result = harness
        .manager
        .process(request(json!({
            "type": "email",
            "content": {"subject": "Hi", "email_body": "Hello"},
            "recipients": ["user-001"]
        })))
        .await;

    match result {
        Err(NotificationError::Validation { field, .. }) => assert_eq!(field, "from.email"),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(drain(&mut email).is_empty());
}

#[tokio::test]
async fn test_missing_template_variable_enqueues_nothing() {
    let mut harness = Harness::new();
    let mut chat = harness.receiver(DeliveryChannel::Chat);

    let template = harness
        .manager
        .create_template(CreateTemplateRequest {
            name: "welcome".to_string(),
            notification_type: NotificationType::Chat,
            content: [("text".to_string(), "Hi {{name}} on {{platform}}".to_string())]
                .into_iter()
                .collect(),
            required_variables: ["name".to_string(), "platform".to_string()]
                .into_iter()
                .collect(),
            description: None,
        })
        .await
        .unwrap();

    let result = harness
        .manager
        .process(request(json!({
            "type": "chat",
            "template": {"id": template.id, "version": 1, "data": {"name": "Jane"}},
            "recipients": ["user-001"]
        })))
        .await;

    match result {
        Err(NotificationError::TemplateProcessing {
            source: TemplateError::MissingTemplateVariable { name },
        }) => assert_eq!(name, "platform"),
        other => panic!("expected missing variable error, got {:?}", other),
    }
    assert!(drain(&mut chat).is_empty());
}

#[tokio::test]
async fn test_template_renders_into_chat_message() {
    let mut harness = Harness::new();
    let mut chat = harness.receiver(DeliveryChannel::Chat);

    let template = harness
        .manager
        .create_template(CreateTemplateRequest {
            name: "deploy".to_string(),
            notification_type: NotificationType::Chat,
            content: [("text".to_string(), "{{service}} deployed".to_string())]
                .into_iter()
                .collect(),
            required_variables: ["service".to_string()].into_iter().collect(),
            description: Some("Deploy announcements".to_string()),
        })
        .await
        .unwrap();

    let response = harness
        .manager
        .process(request(json!({
            "type": "chat",
            "template": {"id": template.id, "version": 1, "data": {"service": "billing"}},
            "recipients": ["user-001"]
        })))
        .await
        .unwrap();
    assert_eq!(response.status, NotificationStatus::Sent);

    let messages = drain(&mut chat);
    assert_eq!(messages.len(), 1);
    match &messages[0].payload {
        MessagePayload::Chat(message) => assert_eq!(message.text, "billing deployed"),
        other => panic!("expected chat payload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_archived_template_version_is_refused() {
    let mut harness = Harness::new();
    let mut chat = harness.receiver(DeliveryChannel::Chat);

    let template = harness
        .manager
        .create_template(CreateTemplateRequest {
            name: "retired".to_string(),
            notification_type: NotificationType::Chat,
            content: [("text".to_string(), "Hi {{name}}".to_string())]
                .into_iter()
                .collect(),
            required_variables: ["name".to_string()].into_iter().collect(),
            description: None,
        })
        .await
        .unwrap();
    harness
        .manager
        .archive_template_version(&template.id, 1)
        .await
        .unwrap();

    let result = harness
        .manager
        .process(request(json!({
            "type": "chat",
            "template": {"id": template.id, "version": 1, "data": {"name": "Jane"}},
            "recipients": ["user-001"]
        })))
        .await;

    assert!(matches!(
        result,
        Err(NotificationError::TemplateProcessing {
            source: TemplateError::Inactive { .. }
        })
    ));
    assert!(drain(&mut chat).is_empty());

    assert!(matches!(
        harness.manager.archive_template_version(&template.id, 5).await,
        Err(NotificationError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_scheduled_notification_fires_later() {
    let mut harness = Harness::new();
    let mut chat = harness.receiver(DeliveryChannel::Chat);

    let fire_at = Utc::now() + chrono::Duration::milliseconds(400);
    let response = harness
        .manager
        .process(request(json!({
            "type": "chat",
            "content": {"text": "standup in 5"},
            "recipients": ["user-001"],
            "scheduled_at": fire_at.to_rfc3339()
        })))
        .await
        .unwrap();

    assert_eq!(response.status, NotificationStatus::Scheduled);
    assert_eq!(
        harness.manager.get_status(&response.id).await.unwrap().status,
        NotificationStatus::Scheduled
    );
    assert!(drain(&mut chat).is_empty());

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(
        harness.manager.get_status(&response.id).await.unwrap().status,
        NotificationStatus::Sent
    );
    assert_eq!(drain(&mut chat).len(), 1);
}

#[tokio::test]
async fn test_scheduled_job_for_unknown_recipient_fails() {
    let mut harness = Harness::new();
    let mut chat = harness.receiver(DeliveryChannel::Chat);

    let fire_at = Utc::now() + chrono::Duration::milliseconds(300);
    let response = harness
        .manager
        .process(request(json!({
            "type": "chat",
            "content": {"text": "nobody home"},
            "recipients": ["ghost"],
            "scheduled_at": fire_at.to_rfc3339()
        })))
        .await
        .unwrap();
    assert_eq!(response.status, NotificationStatus::Scheduled);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(
        harness.manager.get_status(&response.id).await.unwrap().status,
        NotificationStatus::Failed
    );
    assert!(!harness.manager.scheduler().is_pending(&response.id));
    assert!(drain(&mut chat).is_empty());
}

#[tokio::test]
async fn test_far_future_schedule_stays_pending() {
    let harness = Harness::new();

    let response = harness
        .manager
        .process(request(json!({
            "type": "chat",
            "content": {"text": "quarterly review"},
            "recipients": ["user-001"],
            "scheduled_at": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339()
        })))
        .await
        .unwrap();

    assert_eq!(response.status, NotificationStatus::Scheduled);
    assert!(harness.manager.scheduler().is_pending(&response.id));
}

#[tokio::test]
async fn test_unknown_recipient_only_is_rejected() {
    let mut harness = Harness::new();
    let mut chat = harness.receiver(DeliveryChannel::Chat);

    let result = harness
        .manager
        .process(request(json!({
            "type": "chat",
            "content": {"text": "hello"},
            "recipients": ["nonexistent-user"]
        })))
        .await;

    assert!(matches!(
        result,
        Err(NotificationError::NoValidRecipients { requested: 1 })
    ));
    assert!(drain(&mut chat).is_empty());
}

#[tokio::test]
async fn test_push_fans_out_per_active_device() {
    let mut harness = Harness::new();
    let mut ios = harness.receiver(DeliveryChannel::IosPush);
    let mut android = harness.receiver(DeliveryChannel::AndroidPush);

    let response = harness
        .manager
        .process(request(json!({
            "type": "mobile-in-app",
            "content": {"title": "Build", "body": "Green"},
            "recipients": ["user-001"]
        })))
        .await
        .unwrap();
    assert_eq!(response.status, NotificationStatus::Sent);

    let ios_tokens: Vec<String> = drain(&mut ios)
        .into_iter()
        .map(|message| message.destination().to_string())
        .collect();
    assert_eq!(ios_tokens, vec!["ios-token-john-1".to_string()]);

    let android_messages = drain(&mut android);
    assert_eq!(android_messages.len(), 1);
    assert_eq!(android_messages[0].destination(), "android-token-john-1");
}
