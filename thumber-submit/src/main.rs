// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Thumber Submit - sends one thumbnail job to Thumber
//!
//! Checks the service's supported MIME types and subscription limits, then signs and
//! submits the request. The thumbnail itself arrives later at the webhook, tagged
//! with the entity ID embedded in the nonce.
//!
//! ```text
//! ┌──────────────┐  mime_types / subscription  ┌──────────────┐
//! │thumber-submit│ ───────────────────────────>│   Thumber    │
//! │              │ ─────── create.json ───────>│   service    │──> webhook
//! └──────────────┘                             └──────────────┘
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use thumber_core::{
    capability::Capabilities,
    protocol::nonce,
    Geometry, ThumbRequest, ThumberClient, ThumberConfig,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "thumber-submit")]
#[command(about = "Thumber Submit - Requests a thumbnail for one file", long_about = None)]
struct Args {
    /// Public URL of the source file
    #[arg(long)]
    url: String,

    /// MIME type of the source file
    #[arg(long)]
    mime_type: String,

    /// Numeric ID of the entity the thumbnail belongs to
    #[arg(long)]
    entity_id: u64,

    /// Page or frame to render
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Thumbnail geometry as WxH (defaults to the configured size)
    #[arg(long)]
    geometry: Option<Geometry>,

    /// Source file size in bytes, checked against upload and subscription limits
    #[arg(long)]
    file_size: Option<u64>,

    /// Submit without querying MIME types and subscription first
    #[arg(long, default_value = "false")]
    skip_capability_check: bool,

    /// Path to configuration file (ignored if --env-mode is set)
    #[arg(short, long, default_value = "config/thumber.yaml")]
    config: PathBuf,

    /// Load configuration from environment variables instead of file
    #[arg(long, default_value = "false")]
    env_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

async fn submit(args: Args, config: ThumberConfig) -> Result<()> {
    let geometry = args.geometry.unwrap_or_else(|| config.geometry());
    let max_upload = config.max_upload_size;
    let client = ThumberClient::builder(config)
        .build()
        .context("Failed to initialize Thumber client")?;

    if args.skip_capability_check {
        warn!("Skipping capability check");
    } else {
        let capabilities = Capabilities::fetch(&client).await;
        let admission = capabilities.admit(&args.mime_type, args.file_size, max_upload);
        if !admission.is_admitted() {
            bail!("Not submitting entity #{}: {:?}", args.entity_id, admission);
        }
    }

    let request = ThumbRequest::new()
        .with_url(&args.url)
        .with_mime_type(&args.mime_type)
        .with_geometry(geometry)
        .with_page(args.page)
        .with_nonce(nonce::for_entity(args.entity_id));

    info!("Getting thumbnail for entity #{} ({})", args.entity_id, args.url);
    let outcome = client.send_request(request).await;

    if outcome.is_success() {
        info!(
            "Request accepted ({}), nonce {}: {}",
            outcome.status,
            outcome.nonce.as_deref().unwrap_or_default(),
            outcome.body
        );
        Ok(())
    } else {
        error!("Failed to post ({}): {}", outcome.status, outcome.body);
        bail!("Request failed: {:?} ({})", outcome.failure, outcome.status)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = args
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Thumber Submit v{}", env!("CARGO_PKG_VERSION"));

    let config = if args.env_mode {
        ThumberConfig::from_env().context("Failed to load configuration from environment")?
    } else {
        ThumberConfig::from_file(&args.config).context("Failed to load configuration from file")?
    };

    submit(args, config).await
}
