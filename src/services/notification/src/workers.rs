//! Queue workers
//!
//! Each channel gets a fixed number of workers sharing that channel's queue.
//! A worker takes the next message, hands it to the channel's sender and logs
//! the outcome. Failed sends are not retried or requeued.

use crate::channels::{ChannelSender, ChannelSenders};
use crate::config::QueueConfig;
use crate::error::{NotificationError, Result};
use crate::messages::ChannelMessage;
use crate::metrics::NotificationMetrics;
use crate::queue::{ChannelQueues, QueueReceivers};
use fanout_shared::DeliveryChannel;

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type SharedReceiver = Arc<Mutex<mpsc::Receiver<ChannelMessage>>>;

/// Running workers for every channel
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
struct WorkerContext {
    channel: DeliveryChannel,
    receiver: SharedReceiver,
    sender: Arc<dyn ChannelSender>,
    queues: ChannelQueues,
    metrics: NotificationMetrics,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn the configured number of workers per channel
    pub fn start(
        config: &QueueConfig,
        receivers: QueueReceivers,
        senders: &ChannelSenders,
        queues: ChannelQueues,
        metrics: NotificationMetrics,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let mut handles = Vec::new();

        for (channel, receiver) in receivers.into_inner() {
            let sender = senders.get(channel).ok_or_else(|| {
                NotificationError::config(format!("No sender configured for {}", channel))
            })?;
            let workers = config.for_channel(channel).workers;
            let context = WorkerContext {
                channel,
                receiver: Arc::new(Mutex::new(receiver)),
                sender,
                queues: queues.clone(),
                metrics: metrics.clone(),
                shutdown: shutdown.clone(),
            };

            for index in 0..workers {
                let worker_id = format!("{}-{}", channel, index);
                let context = context.clone();
                handles.push(tokio::spawn(async move {
                    worker_loop(worker_id, context).await;
                }));
            }

            info!(%channel, workers, "Started channel workers");
        }

        Ok(Self { handles })
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit after shutdown
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }
        info!("Stopped all workers");
    }
}

async fn worker_loop(worker_id: String, context: WorkerContext) {
    debug!(worker_id = %worker_id, "Starting worker");

    loop {
        let next = {
            let mut receiver = context.receiver.lock().await;
            tokio::select! {
                biased;
                _ = context.shutdown.cancelled() => None,
                message = receiver.recv() => message,
            }
        };

        let Some(message) = next else {
            break;
        };

        context
            .metrics
            .set_queue_depth(context.channel, context.queues.depth(context.channel));
        deliver(&worker_id, &context, &message).await;
    }

    debug!(worker_id = %worker_id, "Worker stopped");
}

async fn deliver(worker_id: &str, context: &WorkerContext, message: &ChannelMessage) {
    let timer = context.metrics.start_timer();
    let result = context.sender.send(message).await;
    let elapsed = timer.stop();

    match result {
        Ok(receipt) => {
            context.metrics.record_delivery(context.channel, true, elapsed);
            info!(
                worker_id = %worker_id,
                notification_id = %message.notification_id,
                recipient_id = %message.recipient_id,
                channel = %context.channel,
                provider = %receipt.provider,
                "Message delivered"
            );
        }
        Err(e) => {
            context.metrics.record_delivery(context.channel, false, elapsed);
            error!(
                worker_id = %worker_id,
                notification_id = %message.notification_id,
                recipient_id = %message.recipient_id,
                channel = %context.channel,
                "Delivery failed: {}",
                e
            );
        }
    }
}
