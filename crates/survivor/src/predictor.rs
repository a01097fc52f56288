//! Predictor capabilities and the loaded-model handle.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::passenger::PassengerRow;

/// Error raised by a model while predicting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model failure: {0}")]
    Internal(String),
}

/// Label prediction, the capability every model has.
pub trait Classifier: Send + Sync + 'static {
    fn predict(&self, rows: &[PassengerRow]) -> Result<Vec<i64>, PredictorError>;
}

/// Models that can also score each class.
pub trait ProbabilisticClassifier: Classifier {
    /// One score vector per row, indexed by class label.
    fn predict_proba(&self, rows: &[PassengerRow]) -> Result<Vec<Vec<f64>>, PredictorError>;
}

/// A predictor tagged with the capabilities discovered when it was loaded.
#[derive(Clone)]
pub enum Predictor {
    LabelOnly(Arc<dyn Classifier>),
    WithConfidence(Arc<dyn ProbabilisticClassifier>),
}

impl Predictor {
    pub fn label_only<C: Classifier>(classifier: C) -> Self {
        Self::LabelOnly(Arc::new(classifier))
    }

    pub fn with_confidence<C: ProbabilisticClassifier>(classifier: C) -> Self {
        Self::WithConfidence(Arc::new(classifier))
    }

    pub fn has_confidence(&self) -> bool {
        matches!(self, Self::WithConfidence(_))
    }
}

impl fmt::Debug for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LabelOnly(_) => f.write_str("Predictor::LabelOnly"),
            Self::WithConfidence(_) => f.write_str("Predictor::WithConfidence"),
        }
    }
}

/// A deserialized artifact ready to be installed in the model slot.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    name: String,
    kind: String,
    predictor: Predictor,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, predictor: Predictor) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            predictor,
            loaded_at: Utc::now(),
        }
    }

    /// Artifact name the model was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model family, e.g. `LogisticRegression`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
