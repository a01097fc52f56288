//! Process configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::history::DEFAULT_HISTORY_SIZE;
use crate::transport::ServerConfig;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("request_timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),

    #[error("max_workers must be at least 1")]
    NoWorkers,
}

/// Settings for the prediction service itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Trusted root that artifact names resolve under.
    pub models_dir: PathBuf,
    /// Artifact loaded at startup; `None` starts with an empty slot.
    pub default_model_name: Option<String>,
    pub history_size: usize,
    pub request_timeout: Duration,
    /// Concurrent blocking jobs (inference and deserialization).
    pub max_workers: usize,
    /// Deployment label reported by `/health`, e.g. an image tag.
    pub build_label: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            default_model_name: Some("LogisticRegression.json".to_string()),
            history_size: DEFAULT_HISTORY_SIZE,
            request_timeout: Duration::from_secs(10),
            max_workers: default_workers(),
            build_label: None,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, Parser)]
#[command(name = "survivor", version, about = "Passenger survival prediction server")]
pub struct Cli {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory model artifacts are loaded from.
    #[arg(long, env = "MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Artifact to load at startup. Empty disables.
    #[arg(long, env = "DEFAULT_MODEL_NAME", default_value = "LogisticRegression.json")]
    pub default_model_name: String,

    /// Number of recent predictions kept for /history.
    #[arg(long, env = "HISTORY_SIZE", default_value_t = DEFAULT_HISTORY_SIZE)]
    pub history_size: usize,

    /// Seconds a predict call may wait for the model.
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 10.0)]
    pub request_timeout: f64,

    /// Concurrent inference/load jobs [default: available parallelism].
    #[arg(long, env = "MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Deployment label shown in /health.
    #[arg(long, env = "BUILD_LABEL")]
    pub build_label: Option<String>,
}

impl Cli {
    pub fn into_configs(self) -> Result<(ServiceConfig, ServerConfig), ConfigError> {
        if self.request_timeout <= 0.0 {
            return Err(ConfigError::InvalidTimeout(self.request_timeout));
        }
        let request_timeout = Duration::try_from_secs_f64(self.request_timeout)
            .map_err(|_| ConfigError::InvalidTimeout(self.request_timeout))?;
        let max_workers = self.max_workers.unwrap_or_else(default_workers);
        if max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let default_model_name = Some(self.default_model_name.trim().to_string())
            .filter(|name| !name.is_empty());

        let service = ServiceConfig {
            models_dir: self.models_dir,
            default_model_name,
            history_size: self.history_size,
            request_timeout,
            max_workers,
            build_label: self.build_label.filter(|label| !label.trim().is_empty()),
        };
        let server = ServerConfig {
            host: self.host,
            port: self.port,
        };
        Ok((service, server))
    }
}
