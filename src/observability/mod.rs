use crate::error::{ResilienceError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "circuit_guard=debug";

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is not set
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl LoggingConfig {
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| self.filter.as_str().into())
    }
}

/// Initialize tracing with the default configuration
pub fn init_tracing() -> Result<()> {
    init_tracing_with(&LoggingConfig::default())
}

/// Initialize tracing; fails if a global subscriber is already installed
pub fn init_tracing_with(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| ResilienceError::Internal(format!("Failed to initialize tracing: {}", e)))?;

    info!(json = config.json, "Tracing initialized");
    Ok(())
}
