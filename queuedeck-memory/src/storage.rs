//! Queue in-memory storage

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use queuedeck_core::{
    PopReceipt, QueueBackend, QueueError, QueueMessage, ReceivedMessage, MAX_PEEK_MESSAGES,
};
use tracing::{debug, info};

/// How long a message lives before the queue drops it (service default, 7 days)
pub const MESSAGE_TIME_TO_LIVE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    text: String,
    insertion_time: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
    time_next_visible: DateTime<Utc>,
    dequeue_count: u32,
    pop_receipt: Option<String>,
}

impl StoredMessage {
    fn new(text: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            insertion_time: now,
            expiration_time: now + to_chrono(MESSAGE_TIME_TO_LIVE),
            time_next_visible: now,
            dequeue_count: 0,
            pop_receipt: None,
        }
    }

    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.time_next_visible <= now
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time <= now
    }

    fn to_message(&self) -> QueueMessage {
        QueueMessage {
            id: self.id.clone(),
            content: self.text.clone(),
            insertion_time: Some(self.insertion_time),
            expiration_time: Some(self.expiration_time),
            dequeue_count: self.dequeue_count,
        }
    }
}

/// Durations are capped at the message time-to-live, which always fits
fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration.min(MESSAGE_TIME_TO_LIVE)).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Check a queue name against the service's naming rules: 3-63 characters,
/// lowercase letters, digits and single hyphens, starting and ending with a
/// letter or digit.
pub fn validate_queue_name(name: &str) -> Result<(), QueueError> {
    let invalid = |reason: &str| QueueError::InvalidQueueName(format!("{name}: {reason}"));

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be 3-63 characters long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("only lowercase letters, digits and hyphens are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with a letter or digit"));
    }
    if name.contains("--") {
        return Err(invalid("consecutive hyphens are not allowed"));
    }
    Ok(())
}

/// Queue backend holding every queue in process memory
#[derive(Debug, Default)]
pub struct MemoryQueueService {
    queues: DashMap<String, VecDeque<StoredMessage>>,
}

impl MemoryQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|q| q.key().clone()).collect();
        names.sort();
        names
    }

    pub fn exists(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// Create a queue; returns `false` if it already existed
    pub fn create(&self, name: &str) -> Result<bool, QueueError> {
        validate_queue_name(name)?;

        match self.queues.entry(name.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::new());
                info!(queue = %name, "Creating queue");
                Ok(true)
            }
        }
    }

    pub fn peek(&self, name: &str, max: u32) -> Result<Vec<QueueMessage>, QueueError> {
        let now = Utc::now();
        let mut messages = self.messages_mut(name)?;
        messages.retain(|m| !m.is_expired(now));

        Ok(messages
            .iter()
            .filter(|m| m.is_visible(now))
            .take(max.clamp(1, MAX_PEEK_MESSAGES) as usize)
            .map(StoredMessage::to_message)
            .collect())
    }

    pub fn receive(
        &self,
        name: &str,
        max: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let now = Utc::now();
        let time_next_visible = now + to_chrono(visibility_timeout);
        let max = max.clamp(1, MAX_PEEK_MESSAGES) as usize;

        let mut messages = self.messages_mut(name)?;
        messages.retain(|m| !m.is_expired(now));

        let mut result = Vec::new();
        for message in messages.iter_mut().filter(|m| m.is_visible(now)).take(max) {
            // Each receive invalidates the previous receipt
            let receipt = uuid::Uuid::new_v4().to_string();
            message.dequeue_count += 1;
            message.time_next_visible = time_next_visible;
            message.pop_receipt = Some(receipt.clone());

            result.push(ReceivedMessage::new(
                message.to_message(),
                PopReceipt::new(receipt),
                Some(time_next_visible),
            ));
        }

        debug!(queue = %name, count = result.len(), "Received messages");
        Ok(result)
    }

    pub fn delete(&self, name: &str, message_id: &str, receipt: &PopReceipt) -> Result<(), QueueError> {
        let mut messages = self.messages_mut(name)?;
        let index = Self::find_received(&messages, message_id, receipt)?;
        messages.remove(index);

        info!(queue = %name, message_id = %message_id, "Deleted message");
        Ok(())
    }

    /// Make a received message visible again right away
    pub fn release(&self, name: &str, message_id: &str, receipt: &PopReceipt) -> Result<(), QueueError> {
        let mut messages = self.messages_mut(name)?;
        let index = Self::find_received(&messages, message_id, receipt)?;

        let message = &mut messages[index];
        message.time_next_visible = Utc::now();
        message.pop_receipt = None;

        debug!(queue = %name, message_id = %message_id, "Released message");
        Ok(())
    }

    pub fn send(&self, name: &str, text: &str) -> Result<QueueMessage, QueueError> {
        let stored = StoredMessage::new(text, Utc::now());
        let message = stored.to_message();
        self.messages_mut(name)?.push_back(stored);

        info!(queue = %name, message_id = %message.id, "Sent message");
        Ok(message)
    }

    fn messages_mut(
        &self,
        name: &str,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, VecDeque<StoredMessage>>, QueueError> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    fn find_received(
        messages: &VecDeque<StoredMessage>,
        message_id: &str,
        receipt: &PopReceipt,
    ) -> Result<usize, QueueError> {
        let index = messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| QueueError::MessageNotFound(message_id.to_string()))?;

        if messages[index].pop_receipt.as_deref() != Some(receipt.as_str()) {
            return Err(QueueError::PopReceiptMismatch(message_id.to_string()));
        }
        Ok(index)
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueService {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn list_queues(&self) -> Result<Vec<String>, QueueError> {
        Ok(self.list())
    }

    async fn queue_exists(&self, queue: &str) -> Result<bool, QueueError> {
        Ok(self.exists(queue))
    }

    async fn create_queue(&self, queue: &str) -> Result<(), QueueError> {
        self.create(queue).map(|_| ())
    }

    async fn peek_messages(&self, queue: &str, max: u32) -> Result<Vec<QueueMessage>, QueueError> {
        self.peek(queue, max)
    }

    async fn receive_messages(
        &self,
        queue: &str,
        max: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.receive(queue, max, visibility_timeout)
    }

    async fn delete_message(&self, queue: &str, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.delete(queue, message.id(), message.pop_receipt())
    }

    async fn release_message(&self, queue: &str, message: &ReceivedMessage) -> Result<(), QueueError> {
        self.release(queue, message.id(), message.pop_receipt())
    }

    async fn send_message(&self, queue: &str, text: &str) -> Result<QueueMessage, QueueError> {
        self.send(queue, text)
    }
}
