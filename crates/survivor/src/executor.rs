//! PredictionExecutor: deadline-bounded, offloaded inference.
//!
//! The label call (and the confidence call when the predictor can score) runs
//! on the [`WorkerPool`]. The deadline bounds how long the caller waits, not
//! how long the computation runs: a timed-out call keeps running to completion
//! on its worker and is then discarded.

use std::sync::Arc;
use std::time::Duration;

use crate::passenger::{PassengerRow, Prediction};
use crate::predictor::{Predictor, PredictorError};
use crate::workers::{WorkerError, WorkerPool};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("Prediction did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Failed(String),
}

impl From<PredictorError> for ExecutionError {
    fn from(e: PredictorError) -> Self {
        Self::Failed(e.to_string())
    }
}

impl From<WorkerError> for ExecutionError {
    fn from(e: WorkerError) -> Self {
        Self::Failed(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PredictionExecutor {
    workers: WorkerPool,
}

impl PredictionExecutor {
    pub fn new(workers: WorkerPool) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Predict every row, waiting at most `timeout` for the result.
    pub async fn run(
        &self,
        predictor: &Predictor,
        rows: Arc<[PassengerRow]>,
        timeout: Duration,
    ) -> Result<Vec<Prediction>, ExecutionError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        match predictor {
            Predictor::LabelOnly(classifier) => {
                let classifier = Arc::clone(classifier);
                let job_rows = Arc::clone(&rows);
                let labels = self.workers.run(move || classifier.predict(&job_rows));

                let labels = tokio::time::timeout(timeout, labels)
                    .await
                    .map_err(|_| ExecutionError::TimedOut(timeout))???;
                assemble(rows.len(), labels, None)
            }
            Predictor::WithConfidence(classifier) => {
                let labels = {
                    let classifier = Arc::clone(classifier);
                    let rows = Arc::clone(&rows);
                    self.workers.run(move || classifier.predict(&rows))
                };
                let scores = {
                    let classifier = Arc::clone(classifier);
                    let rows = Arc::clone(&rows);
                    self.workers.run(move || classifier.predict_proba(&rows))
                };

                let both = async {
                    let (labels, scores) = futures::future::join(labels, scores).await;
                    Ok::<_, ExecutionError>((labels??, scores??))
                };
                let (labels, scores) = tokio::time::timeout(timeout, both)
                    .await
                    .map_err(|_| ExecutionError::TimedOut(timeout))??;
                assemble(rows.len(), labels, Some(scores))
            }
        }
    }
}

/// Zip labels with confidences positionally.
///
/// Confidence is the highest score in the row's score vector; without scores
/// every confidence is 0.0.
fn assemble(
    expected: usize,
    labels: Vec<i64>,
    scores: Option<Vec<Vec<f64>>>,
) -> Result<Vec<Prediction>, ExecutionError> {
    if labels.len() != expected {
        return Err(ExecutionError::Failed(format!(
            "model returned {} labels for {} rows",
            labels.len(),
            expected
        )));
    }
    if let Some(ref scores) = scores
        && scores.len() != expected
    {
        return Err(ExecutionError::Failed(format!(
            "model returned {} score rows for {} rows",
            scores.len(),
            expected
        )));
    }

    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let prediction = u8::try_from(label)
                .ok()
                .filter(|l| *l <= 1)
                .ok_or_else(|| {
                    ExecutionError::Failed(format!("row {i}: label {label} is not 0 or 1"))
                })?;
            let confidence = match scores.as_ref() {
                Some(scores) => confidence(i, &scores[i])?,
                None => 0.0,
            };
            Ok(Prediction {
                prediction,
                confidence,
            })
        })
        .collect()
}

fn confidence(row: usize, scores: &[f64]) -> Result<f64, ExecutionError> {
    if scores.is_empty() {
        return Err(ExecutionError::Failed(format!("row {row}: empty score vector")));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ExecutionError::Failed(format!(
            "row {row}: non-finite score in {scores:?}"
        )));
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(0.0..=1.0).contains(&max) {
        return Err(ExecutionError::Failed(format!(
            "row {row}: confidence {max} outside [0, 1]"
        )));
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passenger::{Sex, passenger};
    use crate::predictor::{Classifier, ProbabilisticClassifier};
    use std::time::Instant;

    struct Scripted {
        labels: Vec<i64>,
        scores: Vec<Vec<f64>>,
        delay: Duration,
    }

    impl Scripted {
        fn new(labels: Vec<i64>, scores: Vec<Vec<f64>>) -> Self {
            Self {
                labels,
                scores,
                delay: Duration::ZERO,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Classifier for Scripted {
        fn predict(&self, _rows: &[PassengerRow]) -> Result<Vec<i64>, PredictorError> {
            std::thread::sleep(self.delay);
            Ok(self.labels.clone())
        }
    }

    impl ProbabilisticClassifier for Scripted {
        fn predict_proba(&self, _rows: &[PassengerRow]) -> Result<Vec<Vec<f64>>, PredictorError> {
            std::thread::sleep(self.delay);
            Ok(self.scores.clone())
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn predict(&self, _rows: &[PassengerRow]) -> Result<Vec<i64>, PredictorError> {
            Err(PredictorError::InvalidInput("unexpected column".to_string()))
        }
    }

    struct Panicking;

    impl Classifier for Panicking {
        fn predict(&self, _rows: &[PassengerRow]) -> Result<Vec<i64>, PredictorError> {
            panic!("segfault-ish")
        }
    }

    fn rows(n: usize) -> Arc<[PassengerRow]> {
        vec![passenger(1, Sex::Female, Some(38.0)); n].into()
    }

    fn executor() -> PredictionExecutor {
        PredictionExecutor::new(WorkerPool::new(4))
    }

    const GENEROUS: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn confidence_is_max_score() {
        let predictor = Predictor::with_confidence(Scripted::new(
            vec![1, 0],
            vec![vec![0.1, 0.9], vec![0.7, 0.3]],
        ));
        let results = executor().run(&predictor, rows(2), GENEROUS).await.unwrap();
        assert_eq!(
            results,
            vec![
                Prediction {
                    prediction: 1,
                    confidence: 0.9
                },
                Prediction {
                    prediction: 0,
                    confidence: 0.7
                },
            ]
        );
    }

    #[tokio::test]
    async fn label_only_reports_zero_confidence() {
        let predictor = Predictor::label_only(Scripted::new(vec![1, 0, 1], Vec::new()));
        let results = executor().run(&predictor, rows(3), GENEROUS).await.unwrap();
        let labels: Vec<u8> = results.iter().map(|p| p.prediction).collect();
        assert_eq!(labels, vec![1, 0, 1]);
        assert!(results.iter().all(|p| p.confidence == 0.0));
    }

    #[tokio::test]
    async fn empty_batch_skips_dispatch() {
        let results = executor()
            .run(&Predictor::label_only(Failing), rows(0), GENEROUS)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn slow_label_call_times_out_near_deadline() {
        let predictor = Predictor::label_only(
            Scripted::new(vec![1], Vec::new()).slow(Duration::from_millis(800)),
        );
        let deadline = Duration::from_millis(100);

        let started = Instant::now();
        let err = executor().run(&predictor, rows(1), deadline).await.unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err, ExecutionError::TimedOut(deadline));
        assert!(elapsed >= deadline, "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "returned late: {elapsed:?}");
    }

    #[tokio::test]
    async fn slow_confidence_call_times_out() {
        let predictor = Predictor::with_confidence(
            Scripted::new(vec![1], vec![vec![0.2, 0.8]]).slow(Duration::from_millis(800)),
        );
        let err = executor()
            .run(&predictor, rows(1), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut(_)));
    }

    #[tokio::test]
    async fn predictor_error_is_execution_failure() {
        let err = executor()
            .run(&Predictor::label_only(Failing), rows(1), GENEROUS)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Failed("Invalid input: unexpected column".to_string())
        );
    }

    #[tokio::test]
    async fn predictor_panic_is_execution_failure() {
        let err = executor()
            .run(&Predictor::label_only(Panicking), rows(1), GENEROUS)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Failed(ref msg) if msg.contains("segfault-ish")));
    }

    #[tokio::test]
    async fn mismatched_lengths_fail() {
        let predictor = Predictor::label_only(Scripted::new(vec![1], Vec::new()));
        let err = executor().run(&predictor, rows(2), GENEROUS).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Failed(ref msg) if msg.contains("1 labels for 2 rows")));

        let predictor = Predictor::with_confidence(Scripted::new(vec![1, 1], vec![vec![0.5]]));
        let err = executor().run(&predictor, rows(2), GENEROUS).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Failed(ref msg) if msg.contains("score rows")));
    }

    #[tokio::test]
    async fn out_of_range_label_fails() {
        let predictor = Predictor::label_only(Scripted::new(vec![2], Vec::new()));
        let err = executor().run(&predictor, rows(1), GENEROUS).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Failed(ref msg) if msg.contains("not 0 or 1")));
    }

    #[test]
    fn confidence_rejects_bad_scores() {
        assert!(confidence(0, &[]).is_err());
        assert!(confidence(0, &[0.2, f64::NAN]).is_err());
        assert!(confidence(0, &[1.2, 0.1]).is_err());
        assert_eq!(confidence(0, &[0.25, 0.75]).unwrap(), 0.75);
    }
}
