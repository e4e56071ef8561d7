// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Checksums for Thumber requests and responses
//!
//! Both directions share one scheme: the message fields (minus the checksum itself)
//! are serialized canonically, then authenticated with HMAC-SHA256 keyed by the user
//! secret. The checksum travels as lowercase hex.
//!
//! Canonical form: fields are sorted by key in ascending byte order and each one is
//! written as `key ':' byte_len(value) ':' value '\n'`. Absent optional values are
//! empty strings, booleans are `true`/`false`, integers are decimal.

use crate::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// A wire message that carries its own checksum
pub trait Signable {
    /// Every field covered by the checksum, as (key, value) pairs
    fn signing_fields(&self) -> Vec<(&'static str, String)>;

    /// The checksum as received or last computed
    fn checksum(&self) -> &str;
}

/// Build the canonical byte representation of a field set
pub fn canonicalize(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut bytes = Vec::new();
    for (key, value) in sorted {
        bytes.extend_from_slice(key.as_bytes());
        bytes.push(b':');
        bytes.extend_from_slice(value.len().to_string().as_bytes());
        bytes.push(b':');
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(b'\n');
    }
    bytes
}

fn keyed_mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Crypto(format!("Invalid key length: {}", e)))
}

/// Compute the hex checksum of a field set
pub fn sign(fields: &[(&str, &str)], secret: &str) -> Result<String> {
    let mut mac = keyed_mac(secret)?;
    mac.update(&canonicalize(fields));
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex checksum against a field set using constant-time comparison
///
/// Never fails: a malformed checksum is simply reported as invalid.
pub fn verify(fields: &[(&str, &str)], secret: &str, checksum: &str) -> bool {
    if secret.is_empty() {
        warn!("Verifying checksum with an empty secret; any party can forge this message");
    }

    let Ok(expected) = hex::decode(checksum) else {
        return false;
    };
    let Ok(mut mac) = keyed_mac(secret) else {
        return false;
    };
    mac.update(&canonicalize(fields));
    mac.verify_slice(&expected).is_ok()
}

fn borrowed<'a>(fields: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

/// Checksum signer bound to one user secret
#[derive(Clone)]
pub struct ChecksumSigner {
    secret: String,
}

impl ChecksumSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// True when the signer has no secret, which makes checksums forgeable
    pub fn is_insecure(&self) -> bool {
        self.secret.is_empty()
    }

    pub fn sign_fields(&self, fields: &[(&str, &str)]) -> Result<String> {
        sign(fields, &self.secret)
    }

    pub fn verify_fields(&self, fields: &[(&str, &str)], checksum: &str) -> bool {
        verify(fields, &self.secret, checksum)
    }

    /// Compute the checksum a message should carry
    pub fn sign_message<M: Signable>(&self, message: &M) -> Result<String> {
        let fields = message.signing_fields();
        self.sign_fields(&borrowed(&fields))
    }

    /// Verify the checksum a message carries
    pub fn verify_message<M: Signable>(&self, message: &M) -> bool {
        let fields = message.signing_fields();
        self.verify_fields(&borrowed(&fields), message.checksum())
    }
}

impl fmt::Debug for ChecksumSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}
