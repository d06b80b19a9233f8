//! Bounded per-channel delivery queues
//!
//! One fixed-capacity FIFO per delivery channel. Producers never wait: a full
//! queue rejects the message immediately with [`QueueError::Full`].

use crate::config::QueueConfig;
use crate::messages::ChannelMessage;
use fanout_shared::DeliveryChannel;

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue for {channel} is full")]
    Full { channel: DeliveryChannel },

    #[error("Queue for {channel} is closed")]
    Closed { channel: DeliveryChannel },
}

/// Producer handle for one channel queue
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    channel: DeliveryChannel,
    capacity: usize,
    sender: mpsc::Sender<ChannelMessage>,
}

impl ChannelQueue {
    /// Admit a message without waiting for space
    pub fn try_enqueue(&self, message: ChannelMessage) -> Result<(), QueueError> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full {
                channel: self.channel,
            },
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed {
                channel: self.channel,
            },
        })
    }

    pub fn channel(&self) -> DeliveryChannel {
        self.channel
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages currently waiting for a worker
    pub fn depth(&self) -> usize {
        self.capacity - self.sender.capacity()
    }
}

/// Producer side of every channel queue
#[derive(Debug, Clone)]
pub struct ChannelQueues {
    queues: HashMap<DeliveryChannel, ChannelQueue>,
}

/// Consumer side, handed to the worker pool
#[derive(Debug)]
pub struct QueueReceivers {
    receivers: HashMap<DeliveryChannel, mpsc::Receiver<ChannelMessage>>,
}

impl ChannelQueues {
    pub fn new(config: &QueueConfig) -> (Self, QueueReceivers) {
        let mut queues = HashMap::new();
        let mut receivers = HashMap::new();

        for channel in DeliveryChannel::ALL {
            let capacity = config.for_channel(channel).capacity;
            let (sender, receiver) = mpsc::channel(capacity);
            queues.insert(
                channel,
                ChannelQueue {
                    channel,
                    capacity,
                    sender,
                },
            );
            receivers.insert(channel, receiver);
            info!(%channel, capacity, "Channel queue created");
        }

        (Self { queues }, QueueReceivers { receivers })
    }

    /// Route a message to the queue named by its channel
    pub fn enqueue(&self, message: ChannelMessage) -> Result<(), QueueError> {
        let channel = message.channel;
        match self.queues.get(&channel) {
            Some(queue) => queue.try_enqueue(message),
            None => Err(QueueError::Closed { channel }),
        }
    }

    pub fn queue(&self, channel: DeliveryChannel) -> Option<&ChannelQueue> {
        self.queues.get(&channel)
    }

    pub fn depth(&self, channel: DeliveryChannel) -> usize {
        self.queues.get(&channel).map(ChannelQueue::depth).unwrap_or(0)
    }
}

impl QueueReceivers {
    pub fn take(&mut self, channel: DeliveryChannel) -> Option<mpsc::Receiver<ChannelMessage>> {
        self.receivers.remove(&channel)
    }

    pub fn into_inner(self) -> HashMap<DeliveryChannel, mpsc::Receiver<ChannelMessage>> {
        self.receivers
    }
}
