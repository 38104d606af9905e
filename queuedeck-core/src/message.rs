//! Queue message model

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A message as returned by peek or receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueMessage {
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
    pub dequeue_count: u32,
}

impl QueueMessage {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            insertion_time: None,
            expiration_time: None,
            dequeue_count: 0,
        }
    }
}

/// Opaque deletion handle issued by a receive call.
///
/// A receipt is only valid until the message's visibility timeout expires or
/// the message is received again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopReceipt(String);

impl PopReceipt {
    pub fn new(receipt: impl Into<String>) -> Self {
        Self(receipt.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PopReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message obtained by receive, hidden from other consumers until
/// `time_next_visible`.
///
/// Peek returns plain [`QueueMessage`]s, so delete and release only accept
/// what a receive handed out. The fields stay private; only backends build
/// these, through [`ReceivedMessage::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    message: QueueMessage,
    pop_receipt: PopReceipt,
    time_next_visible: Option<DateTime<Utc>>,
}

impl ReceivedMessage {
    /// For backends decoding a receive response
    pub fn new(
        message: QueueMessage,
        pop_receipt: PopReceipt,
        time_next_visible: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            message,
            pop_receipt,
            time_next_visible,
        }
    }

    pub fn message(&self) -> &QueueMessage {
        &self.message
    }

    pub fn into_message(self) -> QueueMessage {
        self.message
    }

    pub fn pop_receipt(&self) -> &PopReceipt {
        &self.pop_receipt
    }

    pub fn time_next_visible(&self) -> Option<DateTime<Utc>> {
        self.time_next_visible
    }

    pub fn id(&self) -> &str {
        &self.message.id
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }
}
