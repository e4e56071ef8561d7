// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Thumber Core Library
//!
//! This crate implements the client side of the Thumber thumbnailing protocol: signed
//! thumbnail requests go out over HTTP, and signed results come back asynchronously
//! through a webhook.
//!
//! # Architecture
//!
//! The library is organized into modules representing core concerns:
//! - `checksum`: Canonical field serialization and HMAC-SHA256 checksums
//! - `protocol`: Request/response wire models and nonce helpers
//! - `transport`: Minimal HTTP transport trait with a reqwest implementation
//! - `client`: Request submission, webhook dispatch, capability queries
//! - `capability`: MIME type and quota gating before a job is submitted
//! - `sink`: Thumbnail storage collaborator and the default webhook handler
//! - `config`: Configuration management with validation
//! - `metrics`: Counters exposed by the webhook service
//! - `error`: Unified error types
//!
//! # Flow
//!
//! ```text
//! ┌──────────────┐  create.json   ┌──────────────┐   webhook POST   ┌──────────────┐
//! │ ThumberClient│ ──────────────>│   Thumber    │ ────────────────>│ receive_     │
//! │ (signs req)  │    (HTTP)      │   service    │   (async result) │ callback     │
//! └──────────────┘                └──────────────┘                  └──────┬───────┘
//!                                                                          │ Delivery
//!                                                                   ┌──────▼───────┐
//!                                                                   │ResponseHandler│
//!                                                                   └──────────────┘
//! ```

pub mod capability;
pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod sink;
pub mod transport;

pub use client::{Delivery, FailureKind, RequestOutcome, ResponseHandler, ThumberClient, Verdict};
pub use config::{Credentials, ThumberConfig};
pub use error::{Error, Result};
pub use protocol::{Geometry, ThumbRequest, ThumbResponse};

/// Library version, reported in the default user agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Status reported when a request failed before reaching the network
pub const LOCAL_FAILURE_STATUS: u16 = 600;
