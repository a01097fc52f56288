//! PredictionService: transport-agnostic facade over the model slot, executor
//! and history.
//!
//! This service owns:
//! - The model slot (hot-swapped by `load_model`)
//! - The worker pool shared by inference and artifact loading
//! - The prediction history
//! - Request and prediction metrics
//!
//! Transports (HTTP, ...) delegate to this service and map its errors to
//! their own status codes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::artifact::{ArtifactError, ArtifactLoader};
use crate::config::ServiceConfig;
use crate::executor::{ExecutionError, PredictionExecutor};
use crate::health::{HealthSnapshot, ModelSummary};
use crate::history::{HistoryBuffer, HistoryEntry};
use crate::metrics::{MetricsCollector, PredictionOutcome};
use crate::passenger::{PassengerRow, PredictionRequest, PredictionResponse};
use crate::slot::ModelSlot;
use crate::version::VersionInfo;
use crate::workers::WorkerPool;

#[derive(Debug, thiserror::Error)]
pub enum LoadModelError {
    #[error("Model '{name}' not found")]
    NotFound {
        name: String,
        #[source]
        source: ArtifactError,
    },

    #[error("Failed to load model: {reason}")]
    LoadFailure { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    #[error("No model loaded")]
    NoModelLoaded,

    #[error("Prediction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Prediction failed: {0}")]
    Failed(String),
}

impl From<ExecutionError> for PredictError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::TimedOut(d) => Self::Timeout(d),
            ExecutionError::Failed(msg) => Self::Failed(msg),
        }
    }
}

/// Acknowledgement of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAck {
    pub name: String,
    pub kind: String,
    pub generation: u64,
}

pub struct PredictionService {
    slot: ModelSlot,
    loader: ArtifactLoader,
    executor: PredictionExecutor,
    history: HistoryBuffer,
    request_timeout: Duration,
    default_model_name: Option<String>,
    version: VersionInfo,
    metrics: MetricsCollector,
}

impl PredictionService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            slot: ModelSlot::new(),
            loader: ArtifactLoader::new(config.models_dir),
            executor: PredictionExecutor::new(WorkerPool::new(config.max_workers)),
            history: HistoryBuffer::new(config.history_size),
            request_timeout: config.request_timeout,
            default_model_name: config.default_model_name,
            version: match config.build_label {
                Some(label) => VersionInfo::new().with_build(label),
                None => VersionInfo::new(),
            },
            metrics: MetricsCollector::new(),
        }
    }

    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn health(&self) -> HealthSnapshot {
        let model = self.slot.current().map(|active| ModelSummary {
            name: active.model.name().to_string(),
            kind: active.model.kind().to_string(),
            generation: active.generation,
            loaded_at: active.model.loaded_at(),
        });

        HealthSnapshot {
            running: true,
            model,
            history_len: self.history.len(),
            history_capacity: self.history.capacity(),
            version: self.version.clone(),
        }
    }

    /// Resolve, deserialize and install an artifact.
    ///
    /// Resolution and deserialization both run on the worker pool. The slot is
    /// only touched once the new model is fully built, so a failed load leaves
    /// the current model in place.
    pub async fn load_model(&self, name: &str) -> Result<LoadAck, LoadModelError> {
        let result = self.install_artifact(name).await;
        self.metrics.record_load(result.is_ok());
        result
    }

    async fn install_artifact(&self, name: &str) -> Result<LoadAck, LoadModelError> {
        let loader = self.loader.clone();
        let job_name = name.to_string();
        let outcome = self
            .executor
            .workers()
            .run(move || {
                let path = loader.resolve(&job_name)?;
                loader.load(&job_name, &path)
            })
            .await;

        let model = match outcome {
            Ok(Ok(model)) => model,
            Ok(Err(e)) if e.is_not_found() => {
                tracing::error!(model = %name, error = %e, "Invalid or missing model requested");
                return Err(LoadModelError::NotFound {
                    name: name.to_string(),
                    source: e,
                });
            }
            Ok(Err(e)) => {
                tracing::error!(model = %name, error = %e, "Failed to load model");
                return Err(LoadModelError::LoadFailure {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(model = %name, error = %e, "Model loader worker failed");
                return Err(LoadModelError::LoadFailure {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let kind = model.kind().to_string();
        let generation = self.slot.install(Arc::new(model));
        tracing::info!(model = %name, %kind, generation, "Model loaded and activated");

        Ok(LoadAck {
            name: name.to_string(),
            kind,
            generation,
        })
    }

    /// Load the configured default model. Failure is logged and leaves the slot empty.
    pub async fn load_default_model(&self) -> Option<LoadAck> {
        let name = self.default_model_name.as_deref()?;
        tracing::info!(model = %name, "Loading default model");
        match self.load_model(name).await {
            Ok(ack) => Some(ack),
            Err(e) => {
                tracing::error!(model = %name, error = %e, "Could not load default model, starting without one");
                None
            }
        }
    }

    /// Predict a batch with the active model and record it in history.
    pub async fn predict(
        &self,
        request: PredictionRequest,
    ) -> Result<PredictionResponse, PredictError> {
        let started = Instant::now();
        let rows = request.passengers.len();
        let result = self.run_prediction(request).await;
        let outcome = match &result {
            Ok(_) => PredictionOutcome::Succeeded,
            Err(PredictError::NoModelLoaded) => PredictionOutcome::NoModel,
            Err(PredictError::Timeout(_)) => PredictionOutcome::TimedOut,
            Err(PredictError::Failed(_)) => PredictionOutcome::Failed,
        };
        self.metrics.record_prediction(outcome, rows, started.elapsed());
        result
    }

    async fn run_prediction(
        &self,
        request: PredictionRequest,
    ) -> Result<PredictionResponse, PredictError> {
        let active = self.slot.current().ok_or(PredictError::NoModelLoaded)?;

        let rows: Arc<[PassengerRow]> = request.passengers.clone().into();
        let predictions = self
            .executor
            .run(active.model.predictor(), rows, self.request_timeout)
            .await
            .inspect_err(|e| match e {
                ExecutionError::TimedOut(d) => {
                    tracing::error!(model = %active.model.name(), timeout = ?d, "Prediction exceeded the time limit")
                }
                ExecutionError::Failed(msg) => {
                    tracing::error!(model = %active.model.name(), error = %msg, "Prediction failed")
                }
            })?;

        let response = PredictionResponse { predictions };
        let sequence = self
            .history
            .append(active.model.name(), request, response.clone());
        tracing::debug!(
            model = %active.model.name(),
            generation = active.generation,
            sequence,
            rows = response.predictions.len(),
            "Prediction served"
        );
        Ok(response)
    }

    /// Recent predictions, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.snapshot()
    }

    /// Release the active model.
    pub fn shutdown(&self) {
        if let Some(active) = self.slot.clear() {
            tracing::info!(model = %active.model.name(), "Shutting down, releasing model");
        } else {
            tracing::info!("Shutting down");
        }
    }
}
