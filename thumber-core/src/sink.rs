// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Thumbnail storage
//!
//! [`SinkHandler`] is the default webhook handler: it rejects deliveries that failed
//! verification, recovers the entity ID from the nonce and hands the decoded image to
//! a [`ThumbnailSink`].

use crate::client::{Delivery, ResponseHandler};
use crate::metrics::Metrics;
use crate::protocol::nonce;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Receives decoded thumbnails
pub trait ThumbnailSink: Send + Sync {
    /// Store a thumbnail for `entity_id` and return where it went
    fn store(&self, entity_id: &str, thumbnail: &[u8]) -> Result<PathBuf>;
}

/// Writes thumbnails as uniquely named files in one directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// File extension from the image magic bytes, `png` when unrecognized
fn image_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "png",
    }
}

impl ThumbnailSink for DirectorySink {
    fn store(&self, entity_id: &str, thumbnail: &[u8]) -> Result<PathBuf> {
        // Entity IDs end up in a file name
        if entity_id.is_empty() || !entity_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Sink(format!("Invalid entity ID '{}'", entity_id)));
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "{}-{}.{}",
            entity_id,
            Uuid::new_v4().simple(),
            image_extension(thumbnail)
        ));
        fs::write(&path, thumbnail)?;
        Ok(path)
    }
}

/// Webhook handler that stores verified thumbnails in a sink
pub struct SinkHandler<S> {
    sink: S,
    metrics: Option<Metrics>,
}

impl<S: ThumbnailSink> SinkHandler<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl<S: ThumbnailSink> ResponseHandler for SinkHandler<S> {
    fn handle(&self, delivery: Delivery) {
        let Some(resp) = delivery.verified() else {
            warn!("Rejecting unverified webhook delivery: {:?}", delivery.verdict);
            return;
        };

        let entity = nonce::correlation_id(resp.nonce());
        let entity_id = match entity {
            Some(id) if resp.success() => id,
            _ => {
                let id = entity.unwrap_or_else(|| resp.nonce());
                warn!(
                    "Thumber was unable to process entity #{}: {}",
                    id,
                    resp.error().unwrap_or("malformed nonce")
                );
                return;
            }
        };

        let stored = resp
            .decoded_data()
            .and_then(|bytes| self.sink.store(entity_id, &bytes).map(|path| (path, bytes.len())));

        match stored {
            Ok((path, len)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_thumbnail(len);
                }
                info!("Received thumbnail from Thumber for entity #{} ({})", entity_id, path.display());
            }
            Err(e) => error!("Failed to store thumbnail for entity #{}: {}", entity_id, e),
        }
    }
}
