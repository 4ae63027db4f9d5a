//! Queue brokers carrying `JobMessage`s from the API to the worker

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::error::{Error, Result};
use crate::types::JobMessage;

/// Trait for job message brokers
///
/// Implementations:
/// - `ChannelBroker`: bounded in-process channel
/// - `RedisBroker`: Redis list (feature `redis`)
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Push a message onto the queue
    async fn push(&self, message: &JobMessage) -> Result<()>;

    /// Pop the next message, waiting at most `wait`
    async fn pop(&self, wait: Duration) -> Result<Option<JobMessage>>;

    /// Messages currently waiting
    async fn len(&self) -> Result<usize>;

    /// Whether queued messages survive a process restart
    fn is_durable(&self) -> bool;

    /// Get broker name for logging
    fn name(&self) -> &str;
}

/// In-process broker over a bounded tokio channel
///
/// Messages are lost on restart; the job rows in the database are the source
/// of truth and `JobQueue::resume_incomplete` re-pushes them.
pub struct ChannelBroker {
    sender: mpsc::Sender<JobMessage>,
    receiver: Mutex<mpsc::Receiver<JobMessage>>,
    capacity: usize,
}

impl ChannelBroker {
    /// Create a broker holding at most `capacity` messages
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
        }
    }
}

#[async_trait]
impl JobBroker for ChannelBroker {
    async fn push(&self, message: &JobMessage) -> Result<()> {
        self.sender.try_send(message.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::queue(format!("Job queue is full ({} messages)", self.capacity))
            }
            mpsc::error::TrySendError::Closed(_) => Error::queue("Job queue is closed"),
        })
    }

    async fn pop(&self, wait: Duration) -> Result<Option<JobMessage>> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(Error::queue("Job queue is closed")),
            Err(_) => Ok(None),
        }
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.capacity - self.sender.capacity())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "channel"
    }
}
