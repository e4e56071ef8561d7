// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Outbound thumbnail request

use super::{nonce, Geometry};
use crate::checksum::{ChecksumSigner, Signable};
use crate::config::Credentials;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thumbnail job submitted to `create.json`
///
/// Built with the `with_*` setters. The client fills in identity, timestamp and
/// nonce via [`ThumbRequest::finalize`], which also computes the checksum last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbRequest {
    /// Caller identity
    uid: String,

    /// Webhook URL the result is posted to
    callback: String,

    /// Correlates the asynchronous response with this request
    nonce: String,

    /// Seconds since the epoch, stamped at send time
    timestamp: i64,

    /// MIME type of the source file
    mime_type: String,

    /// Location of the source file
    url: String,

    /// Thumbnail size as `WxH`
    geometry: String,

    /// Page or frame of the source to render
    page: u32,

    /// HMAC-SHA256 over every other field
    checksum: String,
}

impl Default for ThumbRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbRequest {
    pub fn new() -> Self {
        Self {
            uid: String::new(),
            callback: String::new(),
            nonce: String::new(),
            timestamp: 0,
            mime_type: String::new(),
            url: String::new(),
            geometry: Geometry::default().to_string(),
            page: 1,
            checksum: String::new(),
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = callback.into();
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry.to_string();
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn callback(&self) -> &str {
        &self.callback
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn geometry(&self) -> &str {
        &self.geometry
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Fill defaults, stamp the timestamp and sign
    ///
    /// Empty `uid` and `callback` are taken from the credentials and the default
    /// webhook. An empty nonce gets a random token. The timestamp is always
    /// overwritten with `now`, and the checksum is computed last.
    pub fn finalize(
        &mut self,
        credentials: &Credentials,
        default_callback: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.uid.is_empty() {
            self.uid = credentials.uid.clone();
        }
        if self.callback.is_empty() {
            if let Some(callback) = default_callback {
                self.callback = callback.to_string();
            }
        }
        if self.nonce.is_empty() {
            self.nonce = nonce::random_token();
        }
        self.timestamp = now.timestamp();
        self.checksum = self.compute_checksum(&credentials.secret)?;
        Ok(())
    }

    /// Checksum for the current field values; does not store it
    pub fn compute_checksum(&self, secret: &str) -> Result<String> {
        ChecksumSigner::new(secret).sign_message(self)
    }

    /// Required fields that are still empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("uid", &self.uid),
            ("callback", &self.callback),
            ("nonce", &self.nonce),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect()
    }

    /// Required fields present and the stored checksum reproduces under `secret`
    pub fn is_valid(&self, secret: &str) -> bool {
        self.missing_fields().is_empty() && ChecksumSigner::new(secret).verify_message(self)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(Into::into)
    }
}

impl Signable for ThumbRequest {
    fn signing_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("uid", self.uid.clone()),
            ("callback", self.callback.clone()),
            ("nonce", self.nonce.clone()),
            ("timestamp", self.timestamp.to_string()),
            ("mime_type", self.mime_type.clone()),
            ("url", self.url.clone()),
            ("geometry", self.geometry.clone()),
            ("page", self.page.to_string()),
        ]
    }

    fn checksum(&self) -> &str {
        &self.checksum
    }
}
