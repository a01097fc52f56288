//! Request and prediction metrics, exposed in Prometheus text format.
//!
//! Counters are lock-free atomics; per-route HTTP statistics live in a
//! concurrent map keyed by route template, method and status.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// How a predict call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionOutcome {
    Succeeded,
    NoModel,
    TimedOut,
    Failed,
}

impl PredictionOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::NoModel => "no_model",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RouteKey {
    handler: String,
    method: String,
    status: u16,
}

#[derive(Debug, Clone, Copy, Default)]
struct RouteStats {
    count: u64,
    duration_us: u64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    predictions_succeeded: AtomicU64,
    predictions_no_model: AtomicU64,
    predictions_timed_out: AtomicU64,
    predictions_failed: AtomicU64,
    passengers_predicted: AtomicU64,
    prediction_time_us: AtomicU64,
    loads_succeeded: AtomicU64,
    loads_failed: AtomicU64,
    invalid_requests: AtomicU64,
    routes: DashMap<RouteKey, RouteStats>,
    started_at: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub predictions_succeeded: u64,
    pub predictions_no_model: u64,
    pub predictions_timed_out: u64,
    pub predictions_failed: u64,
    pub passengers_predicted: u64,
    /// Total time spent in successful predictions.
    pub prediction_seconds: f64,
    pub loads_succeeded: u64,
    pub loads_failed: u64,
    pub invalid_requests: u64,
    pub uptime_secs: u64,
}

impl MetricsSnapshot {
    pub fn predictions_total(&self) -> u64 {
        self.predictions_succeeded
            + self.predictions_no_model
            + self.predictions_timed_out
            + self.predictions_failed
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            predictions_succeeded: AtomicU64::new(0),
            predictions_no_model: AtomicU64::new(0),
            predictions_timed_out: AtomicU64::new(0),
            predictions_failed: AtomicU64::new(0),
            passengers_predicted: AtomicU64::new(0),
            prediction_time_us: AtomicU64::new(0),
            loads_succeeded: AtomicU64::new(0),
            loads_failed: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            routes: DashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Record a finished predict call. Rows and latency count only on success.
    pub fn record_prediction(&self, outcome: PredictionOutcome, rows: usize, elapsed: Duration) {
        let counter = match outcome {
            PredictionOutcome::Succeeded => &self.predictions_succeeded,
            PredictionOutcome::NoModel => &self.predictions_no_model,
            PredictionOutcome::TimedOut => &self.predictions_timed_out,
            PredictionOutcome::Failed => &self.predictions_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if outcome == PredictionOutcome::Succeeded {
            self.passengers_predicted
                .fetch_add(rows as u64, Ordering::Relaxed);
            self.prediction_time_us
                .fetch_add(micros(elapsed), Ordering::Relaxed);
        }
    }

    pub fn record_load(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.loads_succeeded
        } else {
            &self.loads_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A predict body rejected before reaching the model.
    pub fn record_invalid_request(&self) {
        self.invalid_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one HTTP exchange against its route template.
    pub fn record_http(&self, handler: &str, method: &str, status: u16, elapsed: Duration) {
        let key = RouteKey {
            handler: handler.to_string(),
            method: method.to_string(),
            status,
        };
        let mut stats = self.routes.entry(key).or_default();
        stats.count += 1;
        stats.duration_us = stats.duration_us.saturating_add(micros(elapsed));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            predictions_succeeded: self.predictions_succeeded.load(Ordering::Relaxed),
            predictions_no_model: self.predictions_no_model.load(Ordering::Relaxed),
            predictions_timed_out: self.predictions_timed_out.load(Ordering::Relaxed),
            predictions_failed: self.predictions_failed.load(Ordering::Relaxed),
            passengers_predicted: self.passengers_predicted.load(Ordering::Relaxed),
            prediction_seconds: self.prediction_time_us.load(Ordering::Relaxed) as f64
                / 1_000_000.0,
            loads_succeeded: self.loads_succeeded.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        out.push_str(
            "# HELP survivor_predictions_total Predict calls by outcome\n\
             # TYPE survivor_predictions_total counter\n",
        );
        for (outcome, value) in [
            (PredictionOutcome::Succeeded, s.predictions_succeeded),
            (PredictionOutcome::NoModel, s.predictions_no_model),
            (PredictionOutcome::TimedOut, s.predictions_timed_out),
            (PredictionOutcome::Failed, s.predictions_failed),
        ] {
            out.push_str(&format!(
                "survivor_predictions_total{{outcome=\"{}\"}} {value}\n",
                outcome.label()
            ));
        }

        out.push_str(&format!(
            "# HELP survivor_passengers_predicted_total Passenger rows predicted\n\
             # TYPE survivor_passengers_predicted_total counter\n\
             survivor_passengers_predicted_total {}\n\
             # HELP survivor_prediction_seconds_total Time spent in successful predictions\n\
             # TYPE survivor_prediction_seconds_total counter\n\
             survivor_prediction_seconds_total {:.6}\n\
             # HELP survivor_model_loads_total Model load attempts by outcome\n\
             # TYPE survivor_model_loads_total counter\n\
             survivor_model_loads_total{{outcome=\"succeeded\"}} {}\n\
             survivor_model_loads_total{{outcome=\"failed\"}} {}\n\
             # HELP survivor_invalid_requests_total Predict bodies rejected by validation\n\
             # TYPE survivor_invalid_requests_total counter\n\
             survivor_invalid_requests_total {}\n\
             # HELP survivor_uptime_seconds Uptime in seconds\n\
             # TYPE survivor_uptime_seconds gauge\n\
             survivor_uptime_seconds {}\n",
            s.passengers_predicted,
            s.prediction_seconds,
            s.loads_succeeded,
            s.loads_failed,
            s.invalid_requests,
            s.uptime_secs,
        ));

        let mut routes: Vec<(RouteKey, RouteStats)> = self
            .routes
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        routes.sort_by(|a, b| a.0.cmp(&b.0));
        out.push_str(
            "# HELP survivor_http_requests_total HTTP requests by route, method and status\n\
             # TYPE survivor_http_requests_total counter\n",
        );
        for (key, stats) in &routes {
            out.push_str(&format!(
                "survivor_http_requests_total{{handler=\"{}\",method=\"{}\",status=\"{}\"}} {}\n",
                key.handler, key.method, key.status, stats.count
            ));
        }
        out.push_str(
            "# HELP survivor_http_request_duration_seconds_total Time spent serving HTTP requests\n\
             # TYPE survivor_http_request_duration_seconds_total counter\n",
        );
        for (key, stats) in &routes {
            out.push_str(&format!(
                "survivor_http_request_duration_seconds_total{{handler=\"{}\",method=\"{}\",status=\"{}\"}} {:.6}\n",
                key.handler,
                key.method,
                key.status,
                stats.duration_us as f64 / 1_000_000.0
            ));
        }

        out
    }
}
