// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Inbound thumbnail result posted by Thumber to the webhook

use crate::checksum::{ChecksumSigner, Signable};
use crate::{Error, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Result of a thumbnail job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbResponse {
    /// Echo of the request nonce
    nonce: String,

    success: bool,

    /// Failure reason, present when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    /// Base64 thumbnail, present when `success` is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,

    checksum: String,
}

impl ThumbResponse {
    /// Successful result carrying `thumbnail`, unsigned
    pub fn succeeded(nonce: impl Into<String>, thumbnail: &[u8]) -> Self {
        Self {
            nonce: nonce.into(),
            success: true,
            error: None,
            data: Some(base64::engine::general_purpose::STANDARD.encode(thumbnail)),
            checksum: String::new(),
        }
    }

    /// Failed result, unsigned
    pub fn failed(nonce: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            nonce: nonce.into(),
            success: false,
            error: Some(error.into()),
            data: None,
            checksum: String::new(),
        }
    }

    /// Parse a webhook body
    ///
    /// Malformed JSON, missing required fields, and a successful result without
    /// data are all parse errors.
    pub fn parse(raw: &str) -> Result<Self> {
        let resp: Self = serde_json::from_str(raw)?;
        if resp.success && resp.data.is_none() {
            return Err(Error::Parse("successful response carries no data".to_string()));
        }
        Ok(resp)
    }

    /// Compute and store the checksum
    pub fn sign(mut self, secret: &str) -> Result<Self> {
        self.checksum = ChecksumSigner::new(secret).sign_message(&self)?;
        Ok(self)
    }

    pub fn is_valid(&self, secret: &str) -> bool {
        ChecksumSigner::new(secret).verify_message(self)
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Transport-encoded thumbnail as received
    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    /// Thumbnail bytes
    pub fn decoded_data(&self) -> Result<Vec<u8>> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| Error::Parse("response carries no data".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::Parse(format!("Invalid base64: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

impl Signable for ThumbResponse {
    fn signing_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("nonce", self.nonce.clone()),
            ("success", self.success.to_string()),
            ("error", self.error.clone().unwrap_or_default()),
            ("data", self.data.clone().unwrap_or_default()),
        ]
    }

    fn checksum(&self) -> &str {
        &self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cret";

    #[test]
    fn test_parse_success_body() {
        let body = ThumbResponse::succeeded("42_abc", b"\x89PNG")
            .sign(SECRET)
            .unwrap()
            .to_json()
            .unwrap();

        let resp = ThumbResponse::parse(&body).unwrap();
        assert!(resp.success());
        assert_eq!(resp.nonce(), "42_abc");
        assert!(resp.is_valid(SECRET));
        assert_eq!(resp.decoded_data().unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_parse_failure_body() {
        let body = ThumbResponse::failed("42_abc", "unsupported file")
            .sign(SECRET)
            .unwrap()
            .to_json()
            .unwrap();

        let resp = ThumbResponse::parse(&body).unwrap();
        assert!(!resp.success());
        assert_eq!(resp.error(), Some("unsupported file"));
        assert!(resp.is_valid(SECRET));
        assert!(resp.decoded_data().is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ThumbResponse::parse("not json"), Err(Error::Parse(_))));
        assert!(matches!(
            ThumbResponse::parse(r#"{"success":true,"data":"AA==","checksum":"00"}"#),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            ThumbResponse::parse(r#"{"nonce":"1_a","success":true,"checksum":"00"}"#),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_tampered_response_is_invalid() {
        let resp = ThumbResponse::succeeded("42_abc", b"thumb").sign(SECRET).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        value["nonce"] = serde_json::json!("43_abc");

        let forged = ThumbResponse::parse(&value.to_string()).unwrap();
        assert!(!forged.is_valid(SECRET));
        assert!(!resp.is_valid("other"));
    }

    #[test]
    fn test_null_error_is_accepted() {
        let resp = ThumbResponse::parse(r#"{"nonce":"1_a","success":false,"error":null,"checksum":"00"}"#)
            .unwrap();
        assert_eq!(resp.error(), None);
        assert!(!resp.is_valid(SECRET));
    }
}
