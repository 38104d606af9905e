//! In-memory queue backend for queuedeck
//!
//! Stands in for the queue service in local runs and tests, with the same
//! visibility contract:
//! - peek never changes visibility and hands out no pop receipt
//! - receive hides messages for a visibility timeout and issues a receipt
//! - delete and release require the latest receipt

mod storage;

pub use storage::{validate_queue_name, MemoryQueueService, MESSAGE_TIME_TO_LIVE};
