//! queuedeck - browser admin console for one Azure Storage queue
//!
//! Lists, adds, pops and deletes messages, and switches between queues in
//! the same storage account. An in-memory backend is available for local use.

mod config;

use anyhow::Context;
use clap::Parser;
use queuedeck_azure::AzureQueueService;
use queuedeck_core::{QueueAccessor, QueueBackend};
use queuedeck_memory::MemoryQueueService;
use queuedeck_web::{ConsoleState, SessionKey};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{BackendKind, Config};

#[derive(Parser, Debug)]
#[command(name = "queuedeck")]
#[command(about = "Browser admin console for an Azure Storage queue", long_about = None)]
struct Args {
    /// Port to listen on [default: 5000]
    #[arg(short, long, env = "QUEUEDECK_PORT")]
    port: Option<u16>,

    /// Host to bind to [default: 127.0.0.1]
    #[arg(long, env = "QUEUEDECK_HOST")]
    host: Option<String>,

    /// Queue backend [default: azure]
    #[arg(long, value_enum, env = "QUEUEDECK_BACKEND")]
    backend: Option<BackendKind>,

    /// Storage account connection string
    #[arg(long, env = "AZURE_STORAGE_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    /// Queue selected for new sessions [default: myqueue]
    #[arg(long, env = "QUEUE_NAME")]
    queue_name: Option<String>,

    /// Secret used to sign session cookies
    #[arg(long, env = "QUEUEDECK_SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long, env = "QUEUEDECK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Configuration file [default: ./queuedeck.toml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Command-line values take precedence over the file and `QUEUEDECK_*` settings
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(backend) = self.backend {
            config.queue.backend = backend;
        }
        if let Some(connection_string) = self.connection_string {
            config.queue.connection_string = Some(connection_string);
        }
        if let Some(queue_name) = self.queue_name {
            config.queue.name = queue_name;
        }
        if let Some(secret) = self.session_secret {
            config.session.secret = Some(secret);
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
    }
}

/// Default `EnvFilter` directives: every workspace crate at `level`
fn default_filter(level: &str) -> String {
    const CRATES: [&str; 6] = [
        "queuedeck",
        "queuedeck_core",
        "queuedeck_auth",
        "queuedeck_azure",
        "queuedeck_memory",
        "queuedeck_web",
    ];

    let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
    directives.push("tower_http=debug".to_string());
    directives.join(",")
}

fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn QueueBackend>> {
    match config.queue.backend {
        BackendKind::Azure => {
            let connection_string = config
                .queue
                .connection_string
                .as_deref()
                .context("AZURE_STORAGE_CONNECTION_STRING is required for the azure backend")?;
            let service = AzureQueueService::from_connection_string(connection_string)
                .context("Invalid storage connection string")?;
            info!(endpoint = %service.endpoint(), "Using Azure queue backend");
            Ok(Arc::new(service))
        }
        BackendKind::Memory => {
            info!("Using in-memory queue backend");
            Ok(Arc::new(MemoryQueueService::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                default_filter(&config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting queuedeck...");

    let queues = QueueAccessor::new(build_backend(&config)?);

    let created = queues
        .queue(config.queue.name.as_str())
        .ensure_exists()
        .await
        .with_context(|| format!("Cannot ensure queue '{}' exists", config.queue.name))?;
    info!(queue = %config.queue.name, created, "Default queue ready");

    let sessions = match config.session.secret.as_deref() {
        Some(secret) => SessionKey::new(secret),
        None => {
            warn!("No session secret configured; sessions reset on restart");
            SessionKey::generate()
        }
    };

    let state = ConsoleState::new(queues, config.queue.name.clone(), sessions);
    let app = queuedeck_web::create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_backends() {
        let filter = default_filter("info");
        for directive in ["queuedeck=info", "queuedeck_memory=info", "queuedeck_auth=info", "tower_http=debug"] {
            assert!(filter.split(',').any(|d| d == directive), "missing {directive}");
        }
        assert!(filter.parse::<tracing_subscriber::EnvFilter>().is_ok());
    }
}
