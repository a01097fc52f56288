//! survivor: hot-swappable passenger survival prediction service.

mod health;
mod version;

pub mod artifact;
pub mod config;
pub mod executor;
pub mod history;
pub mod input_validation;
pub mod metrics;
pub mod models;
pub mod passenger;
pub mod predictor;
pub mod service;
pub mod slot;
pub mod transport;
pub mod workers;

pub use artifact::{ArtifactError, ArtifactFormat, ArtifactLoader, JsonArtifactFormat};
pub use config::{Cli, ConfigError, ServiceConfig};
pub use executor::{ExecutionError, PredictionExecutor};
pub use health::{HealthSnapshot, ModelSummary};
pub use history::{HistoryBuffer, HistoryEntry};
pub use metrics::{MetricsCollector, MetricsSnapshot, PredictionOutcome};
pub use passenger::{PassengerRow, Prediction, PredictionRequest, PredictionResponse, Sex};
pub use predictor::{Classifier, LoadedModel, Predictor, PredictorError, ProbabilisticClassifier};
pub use service::{LoadAck, LoadModelError, PredictError, PredictionService};
pub use slot::{ActiveModel, ModelSlot};
pub use transport::{ServerConfig, serve};
pub use version::{SURVIVOR_VERSION, VersionInfo};
pub use workers::{WorkerError, WorkerPool};
