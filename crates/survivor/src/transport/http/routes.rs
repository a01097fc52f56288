//! HTTP route handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{MatchedPath, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::health::HealthSnapshot;
use crate::history::HistoryEntry;
use crate::input_validation::{RequestValidator, ValidationError};
use crate::service::{LoadModelError, PredictError, PredictionService};
use crate::version::VersionInfo;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub model_status: String,
    pub model_loaded: bool,
    pub model_kind: Option<String>,
    pub model_name: Option<String>,
    pub generation: Option<u64>,
    pub history_size: usize,
    pub history_capacity: usize,
    pub version: VersionInfo,
}

impl HealthCheckResponse {
    pub fn from_snapshot(snapshot: HealthSnapshot) -> Self {
        let status = if snapshot.running { "running" } else { "stopped" };
        let model_status = snapshot.model_status();
        let model_loaded = snapshot.model_loaded();
        let (model_kind, model_name, generation) = match snapshot.model {
            Some(m) => (Some(m.kind), Some(m.name), Some(m.generation)),
            None => (None, None, None),
        };

        Self {
            status,
            model_status,
            model_loaded,
            model_kind,
            model_name,
            generation,
            history_size: snapshot.history_len,
            history_capacity: snapshot.history_capacity,
            version: snapshot.version,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub model_name: String,
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub message: String,
    pub model_name: String,
    pub model_kind: String,
    pub generation: u64,
}

#[derive(Clone)]
struct AppState {
    service: Arc<PredictionService>,
    validator: Arc<RequestValidator>,
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

fn validation_failure(errors: Vec<ValidationError>) -> Response {
    let detail: Vec<_> = errors.iter().map(ValidationError::to_json).collect();
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "detail": detail })),
    )
        .into_response()
}

fn body_rejection(rejection: JsonRejection) -> Response {
    validation_failure(vec![ValidationError {
        loc: vec![json!("body")],
        msg: rejection.body_text(),
        error_type: "value_error.jsondecode".to_string(),
    }])
}

async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse::from_snapshot(state.service.health()))
}

async fn load_model(
    State(state): State<AppState>,
    body: Result<Json<LoadRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return body_rejection(rejection),
    };

    match state.service.load_model(&request.model_name).await {
        Ok(ack) => Json(LoadResponse {
            message: format!("Model '{}' loaded successfully", ack.name),
            model_name: ack.name,
            model_kind: ack.kind,
            generation: ack.generation,
        })
        .into_response(),
        Err(e @ LoadModelError::NotFound { .. }) => detail(StatusCode::NOT_FOUND, e.to_string()),
        Err(e @ LoadModelError::LoadFailure { .. }) => {
            detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn predict(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            state.service.metrics().record_invalid_request();
            return body_rejection(rejection);
        }
    };

    let request = match state.validator.parse(body) {
        Ok(request) => request,
        Err(errors) => {
            tracing::debug!(errors = errors.len(), "Rejected invalid predict body");
            state.service.metrics().record_invalid_request();
            return validation_failure(errors);
        }
    };

    match state.service.predict(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e @ PredictError::NoModelLoaded) => detail(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e @ PredictError::Timeout(_)) => detail(StatusCode::REQUEST_TIMEOUT, e.to_string()),
        Err(e @ PredictError::Failed(_)) => {
            detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.service.history())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.service.metrics().to_prometheus(),
    )
}

/// Count every routed request against its route template.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "none".to_string());
    let method = request.method().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    state.service.metrics().record_http(
        &handler,
        &method,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

fn api() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/load", post(load_model))
        .route("/predict", post(predict))
        .route("/history", get(history))
        .route("/metrics", get(metrics))
}

/// Routes served at the root and under `/v1`.
pub fn routes(service: Arc<PredictionService>) -> Router {
    let state = AppState {
        service,
        validator: Arc::new(RequestValidator::new()),
    };
    Router::new()
        .merge(api())
        .nest("/v1", api())
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}
