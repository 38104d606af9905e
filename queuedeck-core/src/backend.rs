//! Queue backend trait and the per-queue client handle

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::message::{QueueMessage, ReceivedMessage};
use crate::{MAX_PEEK_MESSAGES, POP_VISIBILITY_TIMEOUT};

/// Visibility timeout applied to messages received while searching for a
/// message to delete. Non-matching messages are released explicitly once the
/// search ends; the timeout only bounds how long they stay hidden if that
/// release fails.
pub const DELETE_SCAN_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations a queue service must provide
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Short backend name used in logs and health output
    fn kind(&self) -> &'static str;

    /// List the names of all queues in the account
    async fn list_queues(&self) -> Result<Vec<String>, QueueError>;

    /// Whether the named queue exists
    async fn queue_exists(&self, queue: &str) -> Result<bool, QueueError>;

    /// Create the named queue. Creating an existing queue succeeds.
    async fn create_queue(&self, queue: &str) -> Result<(), QueueError>;

    /// Read up to `max` visible messages without changing their visibility
    async fn peek_messages(&self, queue: &str, max: u32) -> Result<Vec<QueueMessage>, QueueError>;

    /// Receive up to `max` visible messages, hiding each for `visibility_timeout`
    async fn receive_messages(
        &self,
        queue: &str,
        max: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Delete a previously received message
    async fn delete_message(&self, queue: &str, message: &ReceivedMessage) -> Result<(), QueueError>;

    /// Make a previously received message visible again immediately
    async fn release_message(&self, queue: &str, message: &ReceivedMessage) -> Result<(), QueueError>;

    /// Enqueue a message with the given text
    async fn send_message(&self, queue: &str, text: &str) -> Result<QueueMessage, QueueError>;
}

/// Hands out [`QueueClient`]s bound to a queue name over a shared backend
#[derive(Clone)]
pub struct QueueAccessor {
    backend: Arc<dyn QueueBackend>,
}

impl QueueAccessor {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Get a handle to the named queue
    pub fn queue(&self, name: impl Into<String>) -> QueueClient {
        QueueClient {
            backend: Arc::clone(&self.backend),
            name: name.into(),
        }
    }

    /// List the names of all queues in the account
    pub async fn list_queues(&self) -> Result<Vec<String>, QueueError> {
        self.backend.list_queues().await
    }
}

/// Handle to a single queue
#[derive(Clone)]
pub struct QueueClient {
    backend: Arc<dyn QueueBackend>,
    name: String,
}

impl QueueClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// List the names of all queues sharing this queue's account
    pub async fn list_queues(&self) -> Result<Vec<String>, QueueError> {
        self.backend.list_queues().await
    }

    /// Create the queue unless it already exists. Returns `true` if it was created.
    pub async fn ensure_exists(&self) -> Result<bool, QueueError> {
        if self.backend.queue_exists(&self.name).await? {
            info!(queue = %self.name, "Queue already exists");
            return Ok(false);
        }

        self.backend.create_queue(&self.name).await?;
        info!(queue = %self.name, "Created queue");
        Ok(true)
    }

    /// Peek the first [`MAX_PEEK_MESSAGES`] visible messages
    pub async fn peek(&self) -> Result<Vec<QueueMessage>, QueueError> {
        self.backend.peek_messages(&self.name, MAX_PEEK_MESSAGES).await
    }

    pub async fn receive(
        &self,
        max: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.backend
            .receive_messages(&self.name, max, visibility_timeout)
            .await
    }

    pub async fn delete(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.backend.delete_message(&self.name, message).await
    }

    pub async fn release(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.backend.release_message(&self.name, message).await
    }

    pub async fn send(&self, text: &str) -> Result<QueueMessage, QueueError> {
        self.backend.send_message(&self.name, text).await
    }

    /// Receive one message and delete it straight away.
    ///
    /// Returns `None` when no message is visible.
    pub async fn pop_next(&self) -> Result<Option<QueueMessage>, QueueError> {
        let Some(received) = self
            .receive(1, POP_VISIBILITY_TIMEOUT)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        self.delete(&received).await?;
        info!(queue = %self.name, message_id = %received.id(), "Popped message");
        Ok(Some(received.into_message()))
    }

    /// Delete the message with the given id, if it is among the visible batch.
    ///
    /// Deleting needs a pop receipt that peek does not hand out, so this
    /// peeks to confirm the id is visible and then receives batches until the
    /// id turns up. Every other message received on the way is released when
    /// the search ends. If another consumer takes the message between the
    /// peek and the receive pass, nothing is deleted and `Ok(false)` is
    /// returned.
    pub async fn delete_by_id(&self, message_id: &str) -> Result<bool, QueueError> {
        let peeked = self.peek().await?;
        if !peeked.iter().any(|m| m.id == message_id) {
            debug!(queue = %self.name, message_id = %message_id, "Message not in visible batch");
            return Ok(false);
        }

        let mut held = Vec::new();
        let outcome = self.receive_until(message_id, &mut held).await;

        for message in &held {
            if let Err(e) = self.release(message).await {
                warn!(
                    queue = %self.name,
                    message_id = %message.id(),
                    error = %e,
                    "Failed to release message"
                );
            }
        }

        let Some(target) = outcome? else {
            debug!(queue = %self.name, message_id = %message_id, "Message consumed before receive pass");
            return Ok(false);
        };

        self.delete(&target).await?;
        info!(queue = %self.name, message_id = %message_id, "Deleted message");
        Ok(true)
    }

    async fn receive_until(
        &self,
        message_id: &str,
        held: &mut Vec<ReceivedMessage>,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        loop {
            let batch = self
                .receive(MAX_PEEK_MESSAGES, DELETE_SCAN_VISIBILITY_TIMEOUT)
                .await?;
            if batch.is_empty() {
                return Ok(None);
            }

            let mut found = None;
            for message in batch {
                if found.is_none() && message.id() == message_id {
                    found = Some(message);
                } else {
                    held.push(message);
                }
            }
            if found.is_some() {
                return Ok(found);
            }
        }
    }
}
