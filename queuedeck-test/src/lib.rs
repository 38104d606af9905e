//! Test utilities for queuedeck
//!
//! Provides utilities for end-to-end testing of the console:
//! - Start the console in-process on a random port, backed by memory queues
//! - A cookie-keeping client that drives the console like a browser
//!
//! ## Usage
//!
//! ```rust,no_run
//! use queuedeck_test::TestServer;
//!
//! #[tokio::test]
//! async fn test_console() {
//!     let server = TestServer::start().await.unwrap();
//!     let client = server.client().unwrap();
//!
//!     client.add("hello").await.unwrap();
//!     assert_eq!(client.refresh().await.unwrap().len(), 1);
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{ClientError, ConsoleClient, ConsoleMessage, PopResult};
pub use server::{TestError, TestServer};

/// Queue selected for sessions that have not switched
pub const DEFAULT_QUEUE: &str = "myqueue";

/// Timeout for waiting on the server
pub const STARTUP_TIMEOUT_SECS: u64 = 10;
