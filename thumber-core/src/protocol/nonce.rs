// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Nonce construction and parsing
//!
//! Thumber echoes the request nonce in its webhook response, and that echo is the only
//! link between a result and the job that produced it. Callers therefore embed a
//! correlation ID (usually an entity ID) ahead of a random token:
//! `{correlation_id}_{token}`.

use rand::Rng;
use std::fmt::Display;

/// Separates the correlation ID from the random token
pub const NONCE_SEPARATOR: char = '_';

/// 16 random bytes, hex encoded
pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// Join a correlation ID and a token
pub fn correlated(id: impl Display, token: &str) -> String {
    format!("{}{}{}", id, NONCE_SEPARATOR, token)
}

/// Nonce for an entity with a freshly generated token
pub fn for_entity(id: impl Display) -> String {
    correlated(id, &random_token())
}

pub fn split(nonce: &str) -> Vec<&str> {
    nonce.split(NONCE_SEPARATOR).collect()
}

/// Correlation ID of a nonce, if it splits into exactly two non-empty parts
pub fn correlation_id(nonce: &str) -> Option<&str> {
    match split(nonce).as_slice() {
        [id, token] if !id.is_empty() && !token.is_empty() => Some(*id),
        _ => None,
    }
}
