//! Built-in model families and the features they share.
//!
//! Artifacts describe one of these families as a JSON document tagged by
//! `kind`; see [`ModelSpec`].

use serde::Deserialize;

use crate::passenger::{PassengerRow, Port, Sex};
use crate::predictor::{Classifier, LoadedModel, Predictor, PredictorError, ProbabilisticClassifier};

/// Age imputed for passengers without a recorded age.
pub const DEFAULT_AGE_FILL: f64 = 28.0;

/// Passengers at or below this age count as children.
pub const CHILD_AGE: f64 = 18.0;

/// Numeric features derived from a passenger row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub pclass: f64,
    pub is_male: f64,
    pub age: f64,
    pub sibsp: f64,
    pub parch: f64,
    pub fare: f64,
    /// 1.0 when travelling without family.
    pub alone: f64,
    /// 1.0 when age <= 18.
    pub is_child: f64,
    pub embarked_c: f64,
    pub embarked_q: f64,
    pub embarked_s: f64,
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

impl FeatureVector {
    pub fn from_row(row: &PassengerRow, age_fill: f64) -> Self {
        let age = row.age.unwrap_or(age_fill);
        let port = row.port();
        Self {
            pclass: f64::from(row.pclass),
            is_male: flag(row.sex == Sex::Male),
            age,
            sibsp: f64::from(row.sibsp),
            parch: f64::from(row.parch),
            fare: row.fare,
            alone: flag(row.sibsp == 0 && row.parch == 0),
            is_child: flag(age <= CHILD_AGE),
            embarked_c: flag(port == Some(Port::Cherbourg)),
            embarked_q: flag(port == Some(Port::Queenstown)),
            embarked_s: flag(port == Some(Port::Southampton)),
        }
    }
}

/// Per-feature weights; absent weights are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Coefficients {
    pub pclass: f64,
    pub is_male: f64,
    pub age: f64,
    pub sibsp: f64,
    pub parch: f64,
    pub fare: f64,
    pub alone: f64,
    pub is_child: f64,
    pub embarked_c: f64,
    pub embarked_q: f64,
    pub embarked_s: f64,
}

impl Coefficients {
    fn dot(&self, x: &FeatureVector) -> f64 {
        self.pclass * x.pclass
            + self.is_male * x.is_male
            + self.age * x.age
            + self.sibsp * x.sibsp
            + self.parch * x.parch
            + self.fare * x.fare
            + self.alone * x.alone
            + self.is_child * x.is_child
            + self.embarked_c * x.embarked_c
            + self.embarked_q * x.embarked_q
            + self.embarked_s * x.embarked_s
    }
}

fn default_threshold() -> f64 {
    0.5
}

fn default_age_fill() -> f64 {
    DEFAULT_AGE_FILL
}

/// Serialized form of a model artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind")]
pub enum ModelSpec {
    /// Always predicts `label`; scores every row with `scores` when given.
    Constant {
        label: i64,
        #[serde(default)]
        scores: Option<Vec<f64>>,
    },
    LogisticRegression {
        intercept: f64,
        #[serde(default)]
        coefficients: Coefficients,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default = "default_age_fill")]
        age_fill: f64,
    },
    /// Label-only rule: women survive, and children when `child_age` is set.
    GenderBaseline {
        #[serde(default)]
        child_age: Option<f64>,
    },
}

impl ModelSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Constant { .. } => "Constant",
            Self::LogisticRegression { .. } => "LogisticRegression",
            Self::GenderBaseline { .. } => "GenderBaseline",
        }
    }

    /// Check parameters and build the predictor for this spec.
    pub fn build(self, name: &str) -> Result<LoadedModel, String> {
        let kind = self.kind();
        let predictor = match self {
            Self::Constant { label, scores } => {
                if !(label == 0 || label == 1) {
                    return Err(format!("constant label must be 0 or 1, got {label}"));
                }
                match scores {
                    Some(scores) => {
                        if scores.is_empty() || scores.iter().any(|s| !(0.0..=1.0).contains(s)) {
                            return Err("constant scores must be non-empty and within [0, 1]".to_string());
                        }
                        Predictor::with_confidence(ConstantModel { label, scores })
                    }
                    None => Predictor::label_only(ConstantModel {
                        label,
                        scores: Vec::new(),
                    }),
                }
            }
            Self::LogisticRegression {
                intercept,
                coefficients,
                threshold,
                age_fill,
            } => {
                if !intercept.is_finite() || !age_fill.is_finite() {
                    return Err("intercept and age_fill must be finite".to_string());
                }
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(format!("threshold must be within [0, 1], got {threshold}"));
                }
                Predictor::with_confidence(LogisticModel {
                    intercept,
                    coefficients,
                    threshold,
                    age_fill,
                })
            }
            Self::GenderBaseline { child_age } => {
                Predictor::label_only(GenderBaseline { child_age })
            }
        };
        Ok(LoadedModel::new(name, kind, predictor))
    }
}

#[derive(Debug)]
struct ConstantModel {
    label: i64,
    scores: Vec<f64>,
}

impl Classifier for ConstantModel {
    fn predict(&self, rows: &[PassengerRow]) -> Result<Vec<i64>, PredictorError> {
        Ok(vec![self.label; rows.len()])
    }
}

impl ProbabilisticClassifier for ConstantModel {
    fn predict_proba(&self, rows: &[PassengerRow]) -> Result<Vec<Vec<f64>>, PredictorError> {
        Ok(vec![self.scores.clone(); rows.len()])
    }
}

#[derive(Debug)]
struct LogisticModel {
    intercept: f64,
    coefficients: Coefficients,
    threshold: f64,
    age_fill: f64,
}

impl LogisticModel {
    fn probability(&self, row: &PassengerRow) -> Result<f64, PredictorError> {
        let x = FeatureVector::from_row(row, self.age_fill);
        let z = self.intercept + self.coefficients.dot(&x);
        if !z.is_finite() {
            return Err(PredictorError::InvalidInput(format!(
                "non-finite decision value for passenger {:?}",
                row.passenger_id
            )));
        }
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, rows: &[PassengerRow]) -> Result<Vec<i64>, PredictorError> {
        rows.iter()
            .map(|row| Ok(i64::from(self.probability(row)? >= self.threshold)))
            .collect()
    }
}

impl ProbabilisticClassifier for LogisticModel {
    fn predict_proba(&self, rows: &[PassengerRow]) -> Result<Vec<Vec<f64>>, PredictorError> {
        rows.iter()
            .map(|row| {
                let p = self.probability(row)?;
                Ok(vec![1.0 - p, p])
            })
            .collect()
    }
}

#[derive(Debug)]
struct GenderBaseline {
    child_age: Option<f64>,
}

impl Classifier for GenderBaseline {
    fn predict(&self, rows: &[PassengerRow]) -> Result<Vec<i64>, PredictorError> {
        Ok(rows
            .iter()
            .map(|row| {
                let child = match (self.child_age, row.age) {
                    (Some(limit), Some(age)) => age <= limit,
                    _ => false,
                };
                i64::from(row.sex == Sex::Female || child)
            })
            .collect())
    }
}
