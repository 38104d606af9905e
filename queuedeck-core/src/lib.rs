//! Core types and traits for queuedeck
//!
//! This crate provides the message model, the error taxonomy, and the
//! backend trait shared by every queue backend and the web console.

pub mod backend;
pub mod error;
pub mod message;

pub use backend::{QueueAccessor, QueueBackend, QueueClient};
pub use error::{ErrorCode, QueueError};
pub use message::{PopReceipt, QueueMessage, ReceivedMessage};

use std::time::Duration;

/// Maximum number of messages a single peek or receive may return
pub const MAX_PEEK_MESSAGES: u32 = 32;

/// Visibility timeout used when the console pops a message
pub const POP_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(1);
