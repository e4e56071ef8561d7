// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Error types for the Thumber client
//!
//! Provides a unified error taxonomy using `thiserror` for ergonomic error handling.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Thumber operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Request failed local validation and was not sent
    #[error("Local validation failed: {0}")]
    LocalValidation(String),

    /// Service answered with a non-success status
    #[error("Remote error: HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// Wire payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Thumbnail sink refused or failed to store data
    #[error("Sink error: {0}")]
    Sink(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
