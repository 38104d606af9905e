//! Test server management

use portpicker::pick_unused_port;
use queuedeck_core::QueueAccessor;
use queuedeck_memory::MemoryQueueService;
use queuedeck_web::{create_router, ConsoleState, SessionKey};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::ConsoleClient;
use crate::{DEFAULT_QUEUE, STARTUP_TIMEOUT_SECS};

/// Errors that can occur with the test server
#[derive(Debug, Error)]
pub enum TestError {
    #[error("No available port found")]
    NoPortAvailable,

    #[error("Failed to start server: {0}")]
    StartFailed(String),

    #[error("Server startup timed out")]
    StartupTimeout,

    #[error("Client error: {0}")]
    ClientError(#[from] crate::ClientError),
}

/// A console running in-process over an in-memory backend
pub struct TestServer {
    port: u16,
    base_url: String,
    storage: Arc<MemoryQueueService>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a console on a random available port with the default queue created
    pub async fn start() -> Result<Self, TestError> {
        let port = pick_unused_port().ok_or(TestError::NoPortAvailable)?;

        let storage = Arc::new(MemoryQueueService::new());
        storage
            .create(DEFAULT_QUEUE)
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        let state = ConsoleState::new(
            QueueAccessor::new(storage.clone()),
            DEFAULT_QUEUE,
            SessionKey::generate(),
        );
        let router = create_router(state);

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        info!(port = port, "Starting queuedeck test server");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            port,
            base_url: format!("http://127.0.0.1:{}", port),
            storage,
            handle,
        };
        server.wait_ready().await?;
        Ok(server)
    }

    async fn wait_ready(&self) -> Result<(), TestError> {
        let health = format!("{}/health", self.base_url);
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_secs(STARTUP_TIMEOUT_SECS) {
            if let Ok(response) = reqwest::get(&health).await {
                if response.status().is_success() {
                    info!(port = self.port, "queuedeck ready");
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        Err(TestError::StartupTimeout)
    }

    /// Get the base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Direct access to the queues behind the console
    pub fn storage(&self) -> &MemoryQueueService {
        &self.storage
    }

    /// A new client with its own cookie jar, i.e. a separate browser session
    pub fn client(&self) -> Result<ConsoleClient, TestError> {
        Ok(ConsoleClient::new(self.base_url.clone())?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
