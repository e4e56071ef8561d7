// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Configuration management for Thumber components

use crate::protocol::Geometry;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Environment variable prefix for every setting
pub const ENV_PREFIX: &str = "THUMBER_";

const CREATE_PATH: &str = "create.json";
const MIME_TYPES_PATH: &str = "mime_types.json";
const SUBSCRIPTION_PATH: &str = "subscription.json";

/// Identity used to sign requests and verify responses
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub uid: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(uid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            secret: secret.into(),
        }
    }

    pub fn is_insecure(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("uid", &self.uid)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Thumber client and webhook service configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct ThumberConfig {
    /// Thumber account UID
    #[serde(default)]
    pub uid: String,

    /// Secret paired with the UID; never transmitted
    #[serde(default)]
    pub user_secret: String,

    /// Thumber API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Public webhook URL used when a request has no callback
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// User-Agent header sent with every call
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Outbound HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Bind address for the webhook service
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Route the webhook is served on
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Expected value of the `action` dispatch marker, when present
    #[serde(default = "default_webhook_action")]
    pub webhook_action: String,

    /// Largest webhook body accepted, in bytes
    #[serde(default = "default_max_webhook_body_bytes")]
    pub max_webhook_body_bytes: usize,

    /// Directory received thumbnails are written to
    #[serde(default = "default_thumbnail_dir")]
    pub thumbnail_dir: PathBuf,

    #[serde(default = "default_thumbnail_dimension")]
    pub thumbnail_width: u32,

    #[serde(default = "default_thumbnail_dimension")]
    pub thumbnail_height: u32,

    /// Host-side upload limit in bytes
    #[serde(default)]
    pub max_upload_size: Option<u64>,
}

impl ThumberConfig {
    /// Configuration with defaults for everything but the credentials
    pub fn new(uid: impl Into<String>, user_secret: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            user_secret: user_secret.into(),
            base_url: default_base_url(),
            webhook_url: None,
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            listen_address: default_listen_address(),
            webhook_path: default_webhook_path(),
            webhook_action: default_webhook_action(),
            max_webhook_body_bytes: default_max_webhook_body_bytes(),
            thumbnail_dir: default_thumbnail_dir(),
            thumbnail_width: default_thumbnail_dimension(),
            thumbnail_height: default_thumbnail_dimension(),
            max_upload_size: None,
        }
    }

    /// Load configuration from `THUMBER_*` environment variables
    pub fn from_env() -> Result<Self> {
        let config: Self = envy::prefixed(ENV_PREFIX)
            .from_env()
            .map_err(|e| Error::Config(format!("Failed to parse environment variables: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with `THUMBER_*` variables taking precedence
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX.trim_end_matches('_')).try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Invalid configuration in {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// An empty secret is accepted but flagged, since every checksum becomes forgeable.
    pub fn validate(&self) -> Result<()> {
        if self.uid.trim().is_empty() {
            return Err(Error::Config(
                "uid cannot be empty (set THUMBER_UID)".to_string(),
            ));
        }

        let base = self.base_url()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base_url must be http or https, got '{}'",
                base.scheme()
            )));
        }

        if let Some(webhook) = &self.webhook_url {
            Url::parse(webhook)
                .map_err(|e| Error::Config(format!("Invalid webhook_url '{}': {}", webhook, e)))?;
        }

        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be > 0".to_string()));
        }

        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(Error::Config(
                "thumbnail_width and thumbnail_height must be > 0".to_string(),
            ));
        }

        if !self.webhook_path.starts_with('/') {
            return Err(Error::Config(format!(
                "webhook_path must start with '/', got '{}'",
                self.webhook_path
            )));
        }

        if self.max_webhook_body_bytes == 0 {
            return Err(Error::Config("max_webhook_body_bytes must be > 0".to_string()));
        }

        if self.user_secret.is_empty() {
            warn!("user_secret is empty: request and response checksums are not authenticated");
        }

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.uid.clone(), self.user_secret.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.thumbnail_width, self.thumbnail_height)
    }

    /// Base URL normalized with a trailing slash, so endpoints join beneath it
    pub fn base_url(&self) -> Result<Url> {
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base).map_err(|e| Error::Config(format!("Invalid base_url '{}': {}", self.base_url, e)))
    }

    pub fn create_url(&self) -> Result<Url> {
        self.endpoint(CREATE_PATH)
    }

    pub fn mime_types_url(&self) -> Result<Url> {
        self.endpoint(MIME_TYPES_PATH)
    }

    pub fn subscription_url(&self) -> Result<Url> {
        self.endpoint(SUBSCRIPTION_PATH)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url()?
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }
}

impl fmt::Debug for ThumberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumberConfig")
            .field("uid", &self.uid)
            .field("user_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("webhook_url", &self.webhook_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("listen_address", &self.listen_address)
            .field("webhook_path", &self.webhook_path)
            .field("max_webhook_body_bytes", &self.max_webhook_body_bytes)
            .field("thumbnail_dir", &self.thumbnail_dir)
            .finish_non_exhaustive()
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://api.thumber.co".to_string()
}

fn default_user_agent() -> String {
    format!(
        "Thumber Client/{} (Rust; {} {})",
        crate::VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_webhook_path() -> String {
    "/thumber/webhook".to_string()
}

fn default_webhook_action() -> String {
    "thumber_response".to_string()
}

fn default_max_webhook_body_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_thumbnail_dir() -> PathBuf {
    PathBuf::from("thumbnails")
}

fn default_thumbnail_dimension() -> u32 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_validation() {
        let config = ThumberConfig::new("user-1", "secret");
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.uid = " ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.base_url = "ftp://api.thumber.co".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.webhook_url = Some("not a url".to_string());
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.thumbnail_width = 0;
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.max_webhook_body_bytes = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_empty_secret_is_only_a_warning() {
        let config = ThumberConfig::new("user-1", "");
        assert!(config.validate().is_ok());
        assert!(config.credentials().is_insecure());
    }

    #[test]
    fn test_endpoints() {
        let mut config = ThumberConfig::new("user-1", "secret");
        assert_eq!(config.create_url().unwrap().as_str(), "http://api.thumber.co/create.json");
        assert_eq!(
            config.mime_types_url().unwrap().as_str(),
            "http://api.thumber.co/mime_types.json"
        );

        config.base_url = "https://example.com/api".to_string();
        assert_eq!(config.subscription_url().unwrap().as_str(), "https://example.com/api/subscription.json");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ThumberConfig::new("user-1", "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert!(!format!("{:?}", config.credentials()).contains("hunter2"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "uid: file-user\nuser_secret: file-secret\nwebhook_url: https://blog.example.com/hook\nthumbnail_width: 320\nthumbnail_height: 240"
        )
        .unwrap();

        let config = ThumberConfig::from_file(file.path()).unwrap();
        assert_eq!(config.uid, "file-user");
        assert_eq!(config.geometry(), Geometry::new(320, 240));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.webhook_path, "/thumber/webhook");
        assert_eq!(config.max_webhook_body_bytes, 32 * 1024 * 1024);
    }
}
