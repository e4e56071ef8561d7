// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Thumber Webhook - public endpoint for asynchronous thumbnail results
//!
//! Thumber posts each finished job back to the callback URL given in the request.
//! This service hosts that URL, verifies every delivery, and stores verified
//! thumbnails in the configured directory.
//!
//! # Endpoints
//!
//! - `POST {webhook_path}`: webhook delivery (optional `action` dispatch marker)
//! - `GET /health`: liveness
//! - `GET /metrics`: Prometheus metrics

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, RawQuery, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::path::PathBuf;
use thumber_core::{
    metrics::Metrics,
    sink::{DirectorySink, SinkHandler},
    ThumberClient, ThumberConfig, Verdict,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "thumber-webhook")]
#[command(about = "Thumber Webhook - Receives and stores thumbnails generated by Thumber", long_about = None)]
struct Args {
    /// Path to configuration file (ignored if --env-mode is set)
    #[arg(short, long, default_value = "config/thumber.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Load configuration from environment variables instead of file
    #[arg(long, default_value = "false")]
    env_mode: bool,
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    client: ThumberClient,
    action: String,
}

/// First `action` value in the query string, if any
fn dispatch_action(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "action")
        .map(|(_, value)| value.into_owned())
}

/// POST {webhook_path} - Receive a thumbnail result
async fn receive_webhook(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> StatusCode {
    if let Some(action) = dispatch_action(query.as_deref()) {
        if action != state.action {
            warn!("Ignoring webhook call for unknown action '{}'", action);
            return StatusCode::NOT_FOUND;
        }
    }

    // The sink writes files, so keep it off the async workers
    let client = state.client.clone();
    let verdict = match tokio::task::spawn_blocking(move || client.receive_callback(&body)).await {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("Webhook dispatch task failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match verdict {
        Verdict::Valid => StatusCode::OK,
        Verdict::ParseFailed(_) => StatusCode::BAD_REQUEST,
        Verdict::SignatureInvalid => StatusCode::UNAUTHORIZED,
    }
}

/// GET /health - Simple health check
async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// GET /metrics - Prometheus metrics
async fn get_metrics(State(state): State<AppState>) -> String {
    state.client.metrics().prometheus_format()
}

fn router(state: AppState, webhook_path: &str, max_body_bytes: usize) -> Router {
    Router::new()
        .route(webhook_path, post(receive_webhook))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn build_state(config: ThumberConfig) -> Result<AppState> {
    let metrics = Metrics::new();
    let handler = SinkHandler::new(DirectorySink::new(config.thumbnail_dir.clone()))
        .with_metrics(metrics.clone());
    let action = config.webhook_action.clone();

    let client = ThumberClient::builder(config)
        .handler(handler)
        .metrics(metrics)
        .build()
        .context("Failed to initialize Thumber client")?;

    Ok(AppState { client, action })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = args.log_level.parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Thumber Webhook v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.env_mode {
        info!("Loading configuration from environment variables");
        ThumberConfig::from_env()
            .context("Failed to load configuration from environment")?
    } else {
        info!("Loading configuration from file: {:?}", args.config);
        ThumberConfig::from_file(&args.config)
            .context("Failed to load configuration from file")?
    };

    info!("Webhook path: {}", config.webhook_path);
    info!("Thumbnail directory: {}", config.thumbnail_dir.display());

    let addr: std::net::SocketAddr = config.listen_address.parse()
        .context("Invalid listen address")?;
    let webhook_path = config.webhook_path.clone();
    let max_body_bytes = config.max_webhook_body_bytes;

    let state = build_state(config)?;
    let app = router(state, &webhook_path, max_body_bytes);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
