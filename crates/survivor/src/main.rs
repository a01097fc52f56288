use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use survivor::{Cli, PredictionService, SURVIVOR_VERSION, serve};

/// Initialize tracing with SURVIVOR_LOG / RUST_LOG / LOG_FORMAT.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("SURVIVOR_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("survivor={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let (service_config, server_config) = Cli::parse()
        .into_configs()
        .context("invalid configuration")?;

    tracing::info!(
        version = SURVIVOR_VERSION,
        models_dir = %service_config.models_dir.display(),
        default_model = ?service_config.default_model_name,
        history_size = service_config.history_size,
        request_timeout = ?service_config.request_timeout,
        max_workers = service_config.max_workers,
        "Starting survivor"
    );

    let service = Arc::new(PredictionService::new(service_config));
    serve(server_config, service).await
}
