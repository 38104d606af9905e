//! Azure Queue Storage backend for queuedeck
//!
//! Talks to the queue service REST API directly:
//! - ListQueues, GetQueueMetadata, CreateQueue
//! - PeekMessages, GetMessages, PutMessage, DeleteMessage, UpdateMessage

pub mod client;
pub mod xml;

pub use client::{AzureError, AzureQueueService, API_VERSION};
