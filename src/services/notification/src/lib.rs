//! # Notification Fan-Out Service
//!
//! Turns one notification request into per-recipient, per-channel messages and
//! delivers them through bounded queues drained by worker pools:
//! - Email via SMTP
//! - Chat via an HTTP chat API
//! - iOS push via APNs and Android push via FCM
//! - Inline content or versioned templates with `{{variable}}` placeholders
//! - Immediate or scheduled dispatch, with cancellation of pending jobs
//! - Status tracking per request
//!
//! ## Usage
//!
//! ```rust,no_run
//! use notification_fanout::{NotificationConfig, NotificationService};
//! use fanout_shared::NotificationRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = NotificationService::new(NotificationConfig::default()).await?;
//!
//!     let request: NotificationRequest = serde_json::from_value(serde_json::json!({
//!         "type": "chat",
//!         "content": {"text": "Deploy finished"},
//!         "recipients": ["user-001"]
//!     }))?;
//!
//!     let response = service.process(request).await?;
//!     println!("Notification {} is {}", response.id, response.status);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod auth;
pub mod channels;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod messages;
pub mod metrics;
pub mod queue;
pub mod renderer;
pub mod routes;
pub mod scheduler;
pub mod status;
pub mod templates;
pub mod validation;
pub mod workers;

pub use channels::{ChannelSender, ChannelSenders, DeliveryReceipt};
pub use config::NotificationConfig;
pub use directory::{InMemoryDirectory, UserDirectory};
pub use error::{NotificationError, Result};
pub use manager::{DispatchReport, Dispatcher, NotificationManager, RecipientOutcome};
pub use messages::{ChannelContent, ChannelMessage, MessagePayload};
pub use queue::{ChannelQueues, QueueError};
pub use scheduler::{Scheduler, SchedulerError};
pub use status::StatusStore;
pub use templates::TemplateStore;

// Re-export shared types for convenience
pub use fanout_shared::{
    CreateTemplateRequest, DeliveryChannel, NotificationRequest, NotificationResponse,
    NotificationStatus, NotificationStatusResponse, NotificationType, RecipientProfile, Template,
};

use crate::metrics::NotificationMetrics;
use crate::workers::WorkerPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A running service: manager, worker pools and scheduler loop
pub struct NotificationService {
    config: NotificationConfig,
    manager: Arc<NotificationManager>,
    workers: WorkerPool,
    scheduler_task: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl NotificationService {
    /// Build every component from configuration and start the background tasks
    pub async fn new(config: NotificationConfig) -> Result<Self> {
        let directory = build_directory(&config).await?;
        let senders = ChannelSenders::from_config(&config).await?;
        Self::with_components(config, directory, senders)
    }

    /// Start the service with a caller-provided directory and senders
    pub fn with_components(
        config: NotificationConfig,
        directory: Arc<dyn UserDirectory>,
        senders: ChannelSenders,
    ) -> Result<Self> {
        info!("Initializing notification service");

        config.validate().map_err(NotificationError::config)?;

        let shutdown = CancellationToken::new();
        let metrics = NotificationMetrics::new(&config.metrics)?;
        let (queues, receivers) = ChannelQueues::new(&config.queues);
        let scheduler = Scheduler::new();

        let workers = WorkerPool::start(
            &config.queues,
            receivers,
            &senders,
            queues.clone(),
            metrics.clone(),
            shutdown.clone(),
        )?;
        let scheduler_task = scheduler.start(shutdown.clone());

        let manager = Arc::new(NotificationManager::new(
            &config,
            directory,
            TemplateStore::new(),
            StatusStore::new(),
            queues,
            scheduler,
            metrics,
        ));

        info!(
            workers = workers.worker_count(),
            "Notification service initialized successfully"
        );

        Ok(Self {
            config,
            manager,
            workers,
            scheduler_task,
            shutdown,
        })
    }

    /// Admit one notification request
    pub async fn process(&self, request: NotificationRequest) -> Result<NotificationResponse> {
        self.manager.process(request).await
    }

    /// Cancel a scheduled notification
    pub async fn cancel_notification(&self, id: &str) -> Result<NotificationResponse> {
        self.manager.cancel_notification(id).await
    }

    pub async fn get_status(&self, id: &str) -> Result<NotificationStatusResponse> {
        self.manager.get_status(id).await
    }

    /// Get the notification manager for advanced operations
    pub fn manager(&self) -> Arc<NotificationManager> {
        Arc::clone(&self.manager)
    }

    /// HTTP router over this service
    pub fn router(&self) -> axum::Router {
        routes::create_router(self.manager(), &self.config)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the scheduler loop and workers. Pending scheduled jobs are dropped.
    pub async fn shutdown(self) {
        info!("Stopping notification service");
        self.shutdown.cancel();

        if let Err(e) = self.scheduler_task.await {
            error!("Scheduler task failed: {}", e);
        }
        self.workers.join().await;

        info!("Notification service stopped");
    }
}

/// Directory from the configured seed file, the demo profiles, or empty
pub async fn build_directory(config: &NotificationConfig) -> Result<Arc<dyn UserDirectory>> {
    let directory = match &config.directory.seed_file {
        Some(path) => InMemoryDirectory::from_json_file(path).await?,
        None if config.directory.seed_demo_profiles => InMemoryDirectory::with_seed_data(),
        None => InMemoryDirectory::new(),
    };
    Ok(Arc::new(directory))
}
