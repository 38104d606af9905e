//! Shared handler state

use queuedeck_core::{QueueAccessor, QueueClient};

use crate::session::{Session, SessionKey};

/// State shared by every console handler; immutable after startup
pub struct ConsoleState {
    pub queues: QueueAccessor,
    pub default_queue: String,
    pub sessions: SessionKey,
}

impl ConsoleState {
    pub fn new(queues: QueueAccessor, default_queue: impl Into<String>, sessions: SessionKey) -> Self {
        Self {
            queues,
            default_queue: default_queue.into(),
            sessions,
        }
    }

    /// Client for the queue a session currently targets
    pub fn queue_for(&self, session: &Session) -> QueueClient {
        self.queues.queue(session.current_queue(&self.default_queue))
    }
}
