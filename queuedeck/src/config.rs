//! Configuration management

use serde::Deserialize;
use std::path::Path;

/// Which queue service the console talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Azure Storage queues over the REST API
    Azure,
    /// In-process queues, lost on exit
    Memory,
}

/// Main configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            session: SessionConfig::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    #[serde(default)]
    pub connection_string: Option<String>,

    #[serde(default = "default_queue_name")]
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            connection_string: None,
            name: default_queue_name(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SessionConfig {
    /// Cookie signing secret; a random one is generated when unset
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_port() -> u16 {
    5000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_backend() -> BackendKind {
    BackendKind::Azure
}

fn default_queue_name() -> String {
    "myqueue".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from an optional file and `QUEUEDECK_*` environment
    /// variables (nested keys use `__`, e.g. `QUEUEDECK_SERVER__PORT`).
    ///
    /// Without an explicit path, `queuedeck.toml` in the working directory is
    /// read if present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("queuedeck").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("QUEUEDECK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }
}
