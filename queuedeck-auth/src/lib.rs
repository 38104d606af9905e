//! Azure Storage authentication for queuedeck
//!
//! - Connection string parsing (account key, SAS, and development storage)
//! - Shared Key request signing

pub mod connection_string;
pub mod shared_key;

pub use connection_string::{ConnectionString, ConnectionStringError, Credential};
pub use shared_key::{format_date, SharedKeySigner, SigningError, StorageRequest};
