//! Notification Manager
//!
//! The core component that turns one request into per-recipient, per-channel
//! messages:
//! - Request validation and template rendering
//! - Recipient resolution and message building
//! - Non-blocking admission to the channel queues
//! - Deferred dispatch through the scheduler
//! - Status bookkeeping for every admitted request
//!
//! Per-recipient problems (unknown id, no contact details, full queue) are
//! logged and collected into a [`DispatchReport`]; they never fail the request.

use crate::config::{NotificationConfig, SchedulerConfig};
use crate::directory::UserDirectory;
use crate::error::{NotificationError, Result};
use crate::messages::{build_messages, BuildOutcome, ChannelContent, ChannelMessage, SkipReason};
use crate::metrics::NotificationMetrics;
use crate::queue::{ChannelQueues, QueueError};
use crate::renderer::{render_template, TemplateError};
use crate::scheduler::Scheduler;
use crate::status::StatusStore;
use crate::templates::TemplateStore;
use crate::validation::validate_request;

use fanout_shared::{
    ContentMap, CreateTemplateRequest, DeliveryChannel, NotificationRequest, NotificationResponse,
    NotificationStatus, NotificationStatusResponse, PublishTemplateVersionRequest,
    RecipientProfile, Template,
};

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// ============================================================================
// DISPATCH
// ============================================================================

/// What happened to one requested recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    /// Every built message was admitted
    Enqueued { messages: usize },
    /// Some messages were admitted, others refused by their queue
    Partial {
        enqueued: usize,
        rejected: Vec<QueueError>,
    },
    /// No message was admitted
    Rejected { rejected: Vec<QueueError> },
    /// The profile had nothing to deliver to
    Skipped { reason: SkipReason },
    /// The directory does not know this id
    NotFound,
}

/// Per-recipient outcomes of one dispatch, in request order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub notification_id: String,
    pub outcomes: Vec<(String, RecipientOutcome)>,
}

impl DispatchReport {
    pub fn enqueued_messages(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                RecipientOutcome::Enqueued { messages } => *messages,
                RecipientOutcome::Partial { enqueued, .. } => *enqueued,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome_for(&self, recipient_id: &str) -> Option<&RecipientOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == recipient_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Resolves recipients and feeds the channel queues.
///
/// Cheap to clone; scheduled jobs carry their own copy.
#[derive(Clone)]
pub struct Dispatcher {
    directory: Arc<dyn UserDirectory>,
    queues: ChannelQueues,
    metrics: NotificationMetrics,
}

impl Dispatcher {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        queues: ChannelQueues,
        metrics: NotificationMetrics,
    ) -> Self {
        Self {
            directory,
            queues,
            metrics,
        }
    }

    /// Fan `content` out to every resolvable recipient.
    ///
    /// Fails only when none of `recipient_ids` resolve.
    pub async fn dispatch(
        &self,
        notification_id: &str,
        content: &ChannelContent,
        recipient_ids: &[String],
    ) -> Result<DispatchReport> {
        let mut seen = HashSet::new();
        let unique_ids: Vec<String> = recipient_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let profiles = self.directory.resolve_by_ids(&unique_ids).await?;
        if profiles.is_empty() {
            warn!(
                notification_id = %notification_id,
                requested = unique_ids.len(),
                "No requested recipient could be resolved"
            );
            return Err(NotificationError::NoValidRecipients {
                requested: unique_ids.len(),
            });
        }

        let mut by_id: HashMap<String, RecipientProfile> = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        let mut outcomes = Vec::with_capacity(unique_ids.len());

        for id in unique_ids {
            let profile = match by_id.remove(&id) {
                Some(profile) => profile,
                None => {
                    debug!(
                        notification_id = %notification_id,
                        recipient_id = %id,
                        "Unknown recipient dropped"
                    );
                    outcomes.push((id, RecipientOutcome::NotFound));
                    continue;
                }
            };

            let outcome = match build_messages(notification_id, content, &profile) {
                BuildOutcome::Skipped(reason) => {
                    self.metrics.record_skipped(&reason.to_string());
                    RecipientOutcome::Skipped { reason }
                }
                BuildOutcome::Messages(messages) => self.enqueue_all(messages),
            };
            outcomes.push((profile.id, outcome));
        }

        let report = DispatchReport {
            notification_id: notification_id.to_string(),
            outcomes,
        };

        info!(
            notification_id = %notification_id,
            recipients = report.outcomes.len(),
            enqueued = report.enqueued_messages(),
            "Dispatch finished"
        );
        Ok(report)
    }

    fn enqueue_all(&self, messages: Vec<ChannelMessage>) -> RecipientOutcome {
        let mut enqueued = 0;
        let mut rejected = Vec::new();

        for message in messages {
            let channel = message.channel;
            let notification_id = message.notification_id.clone();
            let recipient_id = message.recipient_id.clone();

            match self.queues.enqueue(message) {
                Ok(()) => {
                    enqueued += 1;
                    self.metrics.record_enqueued(channel);
                    self.metrics
                        .set_queue_depth(channel, self.queues.depth(channel));
                }
                Err(e) => {
                    warn!(
                        notification_id = %notification_id,
                        recipient_id = %recipient_id,
                        %channel,
                        "Message not enqueued: {}",
                        e
                    );
                    self.metrics.record_rejected(channel, rejection_reason(&e));
                    rejected.push(e);
                }
            }
        }

        match (enqueued, rejected.is_empty()) {
            (messages, true) => RecipientOutcome::Enqueued { messages },
            (0, false) => RecipientOutcome::Rejected { rejected },
            (enqueued, false) => RecipientOutcome::Partial { enqueued, rejected },
        }
    }
}

fn rejection_reason(error: &QueueError) -> &'static str {
    match error {
        QueueError::Full { .. } => "queue_full",
        QueueError::Closed { .. } => "queue_closed",
    }
}

// ============================================================================
// MANAGER
// ============================================================================

/// Main notification manager that coordinates all notification operations
pub struct NotificationManager {
    scheduler_config: SchedulerConfig,
    dispatcher: Dispatcher,
    templates: TemplateStore,
    statuses: StatusStore,
    scheduler: Scheduler,
    metrics: NotificationMetrics,
}

impl NotificationManager {
    /// Assemble a manager from its stores and queue producers
    pub fn new(
        config: &NotificationConfig,
        directory: Arc<dyn UserDirectory>,
        templates: TemplateStore,
        statuses: StatusStore,
        queues: ChannelQueues,
        scheduler: Scheduler,
        metrics: NotificationMetrics,
    ) -> Self {
        info!("Initializing notification manager");

        Self {
            scheduler_config: config.scheduler.clone(),
            dispatcher: Dispatcher::new(directory, queues, metrics.clone()),
            templates,
            statuses,
            scheduler,
            metrics,
        }
    }

    /// Admit one request: dispatch now, or register it with the scheduler
    pub async fn process(&self, request: NotificationRequest) -> Result<NotificationResponse> {
        let notification_type = request.notification_type;

        let inline_content = match self.admit(&request) {
            Ok(content) => content,
            Err(e) => {
                self.metrics.record_request(notification_type, "rejected");
                return Err(e);
            }
        };

        let id = Uuid::new_v4().to_string();
        self.statuses.set_status(&id, NotificationStatus::Pending);

        match self.run(&id, request, inline_content).await {
            Ok(status) => {
                self.metrics
                    .record_request(notification_type, &status.to_string());
                Ok(NotificationResponse { id, status })
            }
            Err(e) => {
                self.statuses.set_status(&id, NotificationStatus::Failed);
                self.metrics.record_request(notification_type, "failed");
                warn!(notification_id = %id, "Notification request failed: {}", e);
                Err(e)
            }
        }
    }

    /// Checks with no side effects; converts inline content when present
    fn admit(&self, request: &NotificationRequest) -> Result<Option<ChannelContent>> {
        validate_request(request, &self.scheduler_config, Utc::now())?;

        request
            .content
            .as_ref()
            .map(|content| {
                ChannelContent::from_content(
                    request.notification_type,
                    content,
                    request.from.as_ref(),
                )
            })
            .transpose()
    }

    async fn run(
        &self,
        id: &str,
        request: NotificationRequest,
        inline_content: Option<ChannelContent>,
    ) -> Result<NotificationStatus> {
        let content = match inline_content {
            Some(content) => content,
            None => self.render_request_template(&request).await?,
        };

        match request.scheduled_at {
            Some(fire_at) => {
                self.schedule_dispatch(id, fire_at, content, request.recipients)?;
                Ok(NotificationStatus::Scheduled)
            }
            None => {
                self.dispatcher
                    .dispatch(id, &content, &request.recipients)
                    .await?;
                self.statuses.set_status(id, NotificationStatus::Sent);
                Ok(NotificationStatus::Sent)
            }
        }
    }

    async fn render_request_template(
        &self,
        request: &NotificationRequest,
    ) -> Result<ChannelContent> {
        let reference = request.template.as_ref().ok_or_else(|| {
            NotificationError::validation("template", "content or template is required")
        })?;

        let template = self
            .templates
            .get_by_id_and_version(&reference.id, reference.version)
            .await?;
        let rendered = render_template(&template, request.notification_type, &reference.data)?;

        debug!(
            template_id = %template.id,
            version = template.version,
            "Template rendered"
        );

        let content: ContentMap = rendered
            .into_iter()
            .map(|(field, text)| (field, serde_json::Value::String(text)))
            .collect();
        ChannelContent::from_content(request.notification_type, &content, request.from.as_ref())
    }

    fn schedule_dispatch(
        &self,
        id: &str,
        fire_at: DateTime<Utc>,
        content: ChannelContent,
        recipients: Vec<String>,
    ) -> Result<()> {
        self.statuses.set_status(id, NotificationStatus::Scheduled);

        let dispatcher = self.dispatcher.clone();
        let statuses = self.statuses.clone();
        let job_id = id.to_string();

        self.scheduler.schedule(id, fire_at, move || async move {
            let next = match dispatcher.dispatch(&job_id, &content, &recipients).await {
                Ok(_) => NotificationStatus::Sent,
                Err(e) => {
                    error!(notification_id = %job_id, "Scheduled dispatch failed: {}", e);
                    NotificationStatus::Failed
                }
            };
            statuses.transition(&job_id, NotificationStatus::Scheduled, next);
        })?;

        info!(notification_id = %id, %fire_at, "Notification scheduled");
        Ok(())
    }

    /// Cancel a scheduled notification that has not fired yet
    pub async fn cancel_notification(&self, id: &str) -> Result<NotificationResponse> {
        self.scheduler.cancel(id)?;
        self.statuses.transition(
            id,
            NotificationStatus::Scheduled,
            NotificationStatus::Cancelled,
        );

        info!(notification_id = %id, "Notification cancelled");
        Ok(NotificationResponse {
            id: id.to_string(),
            status: NotificationStatus::Cancelled,
        })
    }

    pub async fn get_status(&self, id: &str) -> Result<NotificationStatusResponse> {
        let entry = self.statuses.get_entry(id)?;
        Ok(NotificationStatusResponse {
            id: id.to_string(),
            status: entry.status,
            updated_at: entry.updated_at,
        })
    }

    pub async fn create_template(&self, request: CreateTemplateRequest) -> Result<Template> {
        self.templates.create_template(request).await
    }

    pub async fn publish_template_version(
        &self,
        id: &str,
        request: PublishTemplateVersionRequest,
    ) -> Result<Template> {
        self.templates
            .publish_version(id, request)
            .await
            .map_err(|e| match e {
                NotificationError::TemplateProcessing {
                    source: TemplateError::NotFound { id, .. },
                } => NotificationError::not_found(format!("template {}", id)),
                other => other,
            })
    }

    /// Archive one template version so requests can no longer render it
    pub async fn archive_template_version(&self, id: &str, version: u32) -> Result<Template> {
        self.templates
            .archive_version(id, version)
            .await
            .map_err(|e| match e {
                NotificationError::TemplateProcessing {
                    source: TemplateError::NotFound { .. },
                } => NotificationError::not_found(format!("template {} version {}", id, version)),
                other => other,
            })
    }

    pub async fn get_template(&self, id: &str, version: u32) -> Result<Template> {
        self.templates
            .get_by_id_and_version(id, version)
            .await
            .map_err(|_| NotificationError::not_found(format!("template {} version {}", id, version)))
    }

    pub async fn list_template_versions(&self, id: &str) -> Result<Vec<Template>> {
        let versions = self.templates.list_versions(id).await;
        if versions.is_empty() {
            return Err(NotificationError::not_found(format!("template {}", id)));
        }
        Ok(versions)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn metrics(&self) -> &NotificationMetrics {
        &self.metrics
    }

    /// Get service health status
    pub async fn health_check(&self) -> serde_json::Value {
        let queues: serde_json::Map<String, serde_json::Value> = DeliveryChannel::ALL
            .iter()
            .map(|channel| {
                (
                    channel.to_string(),
                    serde_json::json!(self.dispatcher.queues.depth(*channel)),
                )
            })
            .collect();

        serde_json::json!({
            "status": "healthy",
            "timestamp": Utc::now(),
            "queues": queues,
            "scheduler": {
                "pending_jobs": self.scheduler.pending_count(),
                "next_fire_at": self.scheduler.next_fire_at(),
            },
            "notifications_tracked": self.statuses.len(),
            "notifications_by_status": {
                "pending": self.statuses.count_with_status(NotificationStatus::Pending),
                "scheduled": self.statuses.count_with_status(NotificationStatus::Scheduled),
                "sent": self.statuses.count_with_status(NotificationStatus::Sent),
                "failed": self.statuses.count_with_status(NotificationStatus::Failed),
                "cancelled": self.statuses.count_with_status(NotificationStatus::Cancelled),
            },
            "templates": self.templates.len().await,
        })
    }
}
