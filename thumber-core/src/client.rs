// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Thumber API client
//!
//! Sends signed thumbnail requests, dispatches webhook deliveries to the registered
//! [`ResponseHandler`], and queries service capabilities.
//!
//! Outbound calls never return `Err`: [`RequestOutcome`] carries the HTTP status, and
//! failures that never reached the network are reported with
//! [`LOCAL_FAILURE_STATUS`] so callers can branch on the outcome alone.

use crate::capability::Quota;
use crate::checksum;
use crate::config::{Credentials, ThumberConfig};
use crate::metrics::Metrics;
use crate::protocol::{nonce, ThumbRequest, ThumbResponse};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::{Error, Result, LOCAL_FAILURE_STATUS};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Longest slice of a webhook body echoed into logs
const LOG_PREVIEW_CHARS: usize = 256;

/// Why a request did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Failed validation before sending; nothing was transmitted
    LocalValidation,
    /// Transport failed before a status was received
    Network,
    /// Service answered with a non-2xx status
    Remote,
}

/// Result of submitting a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    /// HTTP status, or [`LOCAL_FAILURE_STATUS`] when the network was never reached
    pub status: u16,
    /// Response body, or the failure message for local and network failures
    pub body: String,
    /// Nonce the request was sent with, once one was assigned
    pub nonce: Option<String>,
    pub failure: Option<FailureKind>,
}

impl RequestOutcome {
    fn local(kind: FailureKind, nonce: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: LOCAL_FAILURE_STATUS,
            body: message.into(),
            nonce,
            failure: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_local_failure(&self) -> bool {
        self.status >= LOCAL_FAILURE_STATUS
    }
}

/// Outcome of checking an inbound webhook body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Parsed and the checksum matched
    Valid,
    /// Body was not a well-formed response
    ParseFailed(String),
    /// Parsed, but the checksum did not match
    SignatureInvalid,
}

/// What the response handler receives for every webhook call
///
/// Handlers are invoked regardless of validity. Check [`Delivery::is_valid`] before
/// trusting the response.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub response: Option<ThumbResponse>,
    pub verdict: Verdict,
    /// Body as received
    pub raw: String,
}

impl Delivery {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    /// The response, only if its checksum matched
    pub fn verified(&self) -> Option<&ThumbResponse> {
        if self.is_valid() {
            self.response.as_ref()
        } else {
            None
        }
    }
}

/// Receives webhook deliveries
pub trait ResponseHandler: Send + Sync {
    fn handle(&self, delivery: Delivery);
}

impl<F> ResponseHandler for F
where
    F: Fn(Delivery) + Send + Sync,
{
    fn handle(&self, delivery: Delivery) {
        self(delivery)
    }
}

/// Builder for [`ThumberClient`]
pub struct ThumberClientBuilder {
    config: ThumberConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    handler: Option<Arc<dyn ResponseHandler>>,
    metrics: Option<Metrics>,
}

impl ThumberClientBuilder {
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn handler(mut self, handler: impl ResponseHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<ThumberClient> {
        self.config.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(
                self.config.request_timeout(),
                &self.config.user_agent,
            )?),
        };

        let credentials = self.config.credentials();
        if credentials.is_insecure() {
            warn!(
                "Thumber client for uid '{}' has an empty secret; checksums are forgeable",
                credentials.uid
            );
        }

        Ok(ThumberClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                credentials,
                transport,
                handler: self.handler,
                metrics: self.metrics.unwrap_or_default(),
            }),
        })
    }
}

/// Client for the Thumber API
///
/// Cheap to clone; clones share configuration, handler and metrics.
#[derive(Clone)]
pub struct ThumberClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ThumberConfig,
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    handler: Option<Arc<dyn ResponseHandler>>,
    metrics: Metrics,
}

impl ThumberClient {
    pub fn builder(config: ThumberConfig) -> ThumberClientBuilder {
        ThumberClientBuilder {
            config,
            transport: None,
            handler: None,
            metrics: None,
        }
    }

    pub fn config(&self) -> &ThumberConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn has_insecure_credentials(&self) -> bool {
        self.inner.credentials.is_insecure()
    }

    fn json_headers(&self) -> [(&str, &str); 2] {
        [
            ("Content-Type", "application/json"),
            ("User-Agent", self.inner.config.user_agent.as_str()),
        ]
    }

    fn reject(&self, nonce: Option<String>, reason: String) -> RequestOutcome {
        error!("Request is invalid, not sending: {}", reason);
        self.inner.metrics.record_request_rejected();
        RequestOutcome::local(FailureKind::LocalValidation, nonce, reason)
    }

    /// Finalize, validate and submit a thumbnail request
    ///
    /// Identity, callback and nonce are filled from configuration when empty, and the
    /// timestamp is always stamped fresh. A request that fails validation is never
    /// transmitted.
    #[instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn send_request(&self, mut request: ThumbRequest) -> RequestOutcome {
        let credentials = &self.inner.credentials;

        if let Err(e) = request.finalize(
            credentials,
            self.inner.config.webhook_url.as_deref(),
            Utc::now(),
        ) {
            return self.reject(None, e.to_string());
        }
        let nonce = request.nonce().to_string();
        debug!(nonce = %nonce, "Request finalized");

        if !request.is_valid(&credentials.secret) {
            let missing = request.missing_fields();
            let reason = if missing.is_empty() {
                "checksum mismatch".to_string()
            } else {
                format!("missing required fields: {}", missing.join(", "))
            };
            return self.reject(Some(nonce), reason);
        }
        debug!(nonce = %nonce, "Request validated");

        let (url, body) = match self.inner.config.create_url().and_then(|url| Ok((url, request.to_json()?))) {
            Ok(parts) => parts,
            Err(e) => return self.reject(Some(nonce), e.to_string()),
        };
        debug!("Sending request: {}", body);

        let start = Instant::now();
        let result = self
            .inner
            .transport
            .post(&url, &self.json_headers(), body.into_bytes())
            .await;

        match result {
            Ok(resp) if resp.is_success() => {
                self.inner.metrics.record_request(start.elapsed().as_micros() as u64);
                info!("Thumbnail request {} accepted ({})", nonce, resp.status);
                RequestOutcome {
                    status: resp.status,
                    body: resp.body,
                    nonce: Some(nonce),
                    failure: None,
                }
            }
            Ok(resp) => {
                self.inner.metrics.record_request_failure();
                warn!("Thumbnail request {} refused: HTTP {}", nonce, resp.status);
                RequestOutcome {
                    status: resp.status,
                    body: resp.body,
                    nonce: Some(nonce),
                    failure: Some(FailureKind::Remote),
                }
            }
            Err(e) => {
                self.inner.metrics.record_request_failure();
                error!("Failed to post thumbnail request {}: {}", nonce, e);
                RequestOutcome::local(FailureKind::Network, Some(nonce), e.to_string())
            }
        }
    }

    /// Handle a webhook body posted by Thumber
    ///
    /// The registered handler is invoked for every body, whatever the verdict, so the
    /// application makes the final accept/reject decision. The verdict is also
    /// returned for the HTTP layer.
    pub fn receive_callback(&self, raw_body: &[u8]) -> Verdict {
        let metrics = &self.inner.metrics;
        metrics.record_callback();

        let raw = String::from_utf8_lossy(raw_body).into_owned();
        let parsed = std::str::from_utf8(raw_body)
            .map_err(|e| Error::Parse(format!("Body is not UTF-8: {}", e)))
            .and_then(ThumbResponse::parse);

        let (response, verdict) = match parsed {
            Err(e) => {
                metrics.record_callback_unparseable();
                error!("Failed to parse JSON in webhook body ({}): {}", e, preview(&raw));
                (None, Verdict::ParseFailed(e.to_string()))
            }
            Ok(resp) if resp.is_valid(&self.inner.credentials.secret) => {
                debug!(nonce = %resp.nonce(), "Webhook response verified");
                (Some(resp), Verdict::Valid)
            }
            Ok(resp) => {
                metrics.record_callback_forged();
                error!("Received invalid response for nonce {}: {}", resp.nonce(), preview(&raw));
                (Some(resp), Verdict::SignatureInvalid)
            }
        };

        match &self.inner.handler {
            Some(handler) => {
                handler.handle(Delivery {
                    response,
                    verdict: verdict.clone(),
                    raw,
                });
                debug!("Webhook delivery dispatched");
            }
            None => error!("No response handler registered; dropping webhook delivery"),
        }

        verdict
    }

    /// MIME types the service can thumbnail; empty when the query fails
    #[instrument(skip(self))]
    pub async fn get_mime_types(&self) -> HashSet<String> {
        match self.fetch_mime_types().await {
            Ok(types) => {
                let mut listed: Vec<&str> = types.iter().map(String::as_str).collect();
                listed.sort_unstable();
                debug!("Thumber MIME types: {}", listed.join(", "));
                types
            }
            Err(e) => {
                warn!("Failed to fetch Thumber MIME types: {}", e);
                HashSet::new()
            }
        }
    }

    async fn fetch_mime_types(&self) -> Result<HashSet<String>> {
        let url = self.inner.config.mime_types_url()?;
        let resp = self.inner.transport.get(&url, &self.json_headers()).await?;
        if !resp.is_success() {
            return Err(Error::Remote {
                status: resp.status,
                body: resp.body,
            });
        }

        let types: Vec<String> = serde_json::from_str(&resp.body)?;
        Ok(types.into_iter().collect())
    }

    /// Subscription limits; `None` means no data, which callers treat as no limit
    #[instrument(skip(self))]
    pub async fn get_subscription(&self) -> Option<Quota> {
        match self.fetch_subscription().await {
            Ok(quota) => {
                debug!("Thumber subscription: {:?}", quota);
                Some(quota)
            }
            Err(e) => {
                warn!("No Thumber subscription data available: {}", e);
                None
            }
        }
    }

    async fn fetch_subscription(&self) -> Result<Quota> {
        let credentials = &self.inner.credentials;
        let nonce = nonce::random_token();
        let timestamp = Utc::now().timestamp().to_string();
        let checksum = checksum::sign(
            &[
                ("uid", credentials.uid.as_str()),
                ("nonce", nonce.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &credentials.secret,
        )?;

        let mut url = self.inner.config.subscription_url()?;
        url.query_pairs_mut()
            .append_pair("uid", &credentials.uid)
            .append_pair("nonce", &nonce)
            .append_pair("timestamp", &timestamp)
            .append_pair("checksum", &checksum);

        let resp = self.inner.transport.get(&url, &self.json_headers()).await?;
        if !resp.is_success() {
            return Err(Error::Remote {
                status: resp.status,
                body: resp.body,
            });
        }

        serde_json::from_str(&resp.body).map_err(Into::into)
    }
}

fn preview(raw: &str) -> String {
    if raw.chars().count() <= LOG_PREVIEW_CHARS {
        raw.to_string()
    } else {
        let head: String = raw.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Geometry;
    use mockito::Matcher;
    use parking_lot::Mutex;
    use serde_json::json;

    const SECRET: &str = "s3cret";

    fn config(base_url: &str) -> ThumberConfig {
        let mut config = ThumberConfig::new("user-1", SECRET);
        config.base_url = base_url.to_string();
        config.webhook_url = Some("https://blog.example.com/hook?action=thumber_response".to_string());
        config
    }

    fn recording_client(base_url: &str) -> (ThumberClient, Arc<Mutex<Vec<Delivery>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let client = ThumberClient::builder(config(base_url))
            .handler(move |delivery: Delivery| sink.lock().push(delivery))
            .build()
            .unwrap();
        (client, seen)
    }

    fn png_request() -> ThumbRequest {
        ThumbRequest::new()
            .with_url("http://x/y.png")
            .with_mime_type("image/png")
            .with_geometry(Geometry::new(200, 200))
            .with_page(1)
            .with_nonce("42_abc123")
    }

    #[tokio::test]
    async fn test_send_request_posts_signed_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/create.json")
            .match_header("content-type", "application/json")
            .match_header("user-agent", Matcher::Regex("^Thumber Client/".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "uid": "user-1",
                    "callback": "https://blog.example.com/hook?action=thumber_response",
                    "nonce": "42_abc123",
                    "mime_type": "image/png",
                    "url": "http://x/y.png",
                    "geometry": "200x200",
                    "page": 1,
                })),
                Matcher::Regex(r#""checksum":"[0-9a-f]{64}""#.to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"queued":true}"#)
            .create_async()
            .await;

        let (client, _) = recording_client(&server.url());
        let outcome = client.send_request(png_request()).await;

        mock.assert_async().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.nonce.as_deref(), Some("42_abc123"));
        assert_eq!(client.metrics().requests_sent(), 1);
    }

    #[tokio::test]
    async fn test_local_validation_failure_is_not_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/create.json").expect(0).create_async().await;

        let mut cfg = config(&server.url());
        cfg.webhook_url = None;
        let client = ThumberClient::builder(cfg).build().unwrap();

        let outcome = client.send_request(png_request()).await;

        mock.assert_async().await;
        assert_eq!(outcome.status, LOCAL_FAILURE_STATUS);
        assert_eq!(outcome.failure, Some(FailureKind::LocalValidation));
        assert!(outcome.is_local_failure());
        assert!(outcome.body.contains("callback"));
        assert_eq!(client.metrics().requests_rejected(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_out_of_band() {
        let (client, _) = recording_client("http://127.0.0.1:1");
        let outcome = client.send_request(png_request()).await;

        assert_eq!(outcome.status, LOCAL_FAILURE_STATUS);
        assert_eq!(outcome.failure, Some(FailureKind::Network));
        assert!(!outcome.body.is_empty());
        assert_eq!(client.metrics().requests_failed(), 1);
    }

    #[tokio::test]
    async fn test_remote_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/create.json")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let (client, _) = recording_client(&server.url());
        let outcome = client.send_request(png_request()).await;

        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.body, "boom");
        assert_eq!(outcome.failure, Some(FailureKind::Remote));
        assert!(!outcome.is_local_failure());
    }

    #[tokio::test]
    async fn test_get_mime_types() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mime_types.json")
            .with_status(200)
            .with_body(r#"["image/png","application/pdf","image/png"]"#)
            .create_async()
            .await;

        let (client, _) = recording_client(&server.url());
        let types = client.get_mime_types().await;
        assert_eq!(types.len(), 2);
        assert!(types.contains("application/pdf"));
    }

    #[tokio::test]
    async fn test_get_mime_types_degrades_to_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mime_types.json")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let (client, _) = recording_client(&server.url());
        assert!(client.get_mime_types().await.is_empty());

        let (offline, _) = recording_client("http://127.0.0.1:1");
        assert!(offline.get_mime_types().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_subscription() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/subscription.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uid".to_string(), "user-1".to_string()),
                Matcher::Regex("checksum=[0-9a-f]{64}".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"max_file_size":1048576,"monthly_limit":100,"used_this_month":40}"#)
            .create_async()
            .await;

        let (client, _) = recording_client(&server.url());
        let quota = client.get_subscription().await.unwrap();

        mock.assert_async().await;
        assert_eq!(quota.max_file_size, Some(1_048_576));
        assert_eq!(quota.remaining(), Some(60));
    }

    #[tokio::test]
    async fn test_missing_subscription_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/subscription.json")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let (client, _) = recording_client(&server.url());
        assert!(client.get_subscription().await.is_none());
    }

    #[test]
    fn test_receive_valid_callback() {
        let (client, seen) = recording_client("http://127.0.0.1:1");
        let body = ThumbResponse::succeeded("42_abc", b"\x89PNG\r\n")
            .sign(SECRET)
            .unwrap()
            .to_json()
            .unwrap();

        assert_eq!(client.receive_callback(body.as_bytes()), Verdict::Valid);

        let deliveries = seen.lock();
        assert_eq!(deliveries.len(), 1);
        let resp = deliveries[0].verified().unwrap();
        assert!(resp.success());
        assert_eq!(resp.decoded_data().unwrap(), b"\x89PNG\r\n");
    }

    #[test]
    fn test_receive_tampered_callback_still_dispatches() {
        let (client, seen) = recording_client("http://127.0.0.1:1");
        let mut value: serde_json::Value = serde_json::from_str(
            &ThumbResponse::succeeded("42_abc", b"thumb").sign(SECRET).unwrap().to_json().unwrap(),
        )
        .unwrap();
        value["checksum"] = json!("0".repeat(64));

        let verdict = client.receive_callback(value.to_string().as_bytes());
        assert_eq!(verdict, Verdict::SignatureInvalid);

        let deliveries = seen.lock();
        assert_eq!(deliveries.len(), 1);
        assert!(!deliveries[0].is_valid());
        assert!(deliveries[0].response.is_some());
        assert!(deliveries[0].verified().is_none());
        assert_eq!(client.metrics().callbacks_forged(), 1);
    }

    #[test]
    fn test_receive_unparseable_callback_still_dispatches() {
        let (client, seen) = recording_client("http://127.0.0.1:1");

        let verdict = client.receive_callback(b"{not json");
        assert!(matches!(verdict, Verdict::ParseFailed(_)));

        let deliveries = seen.lock();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].response.is_none());
        assert_eq!(deliveries[0].raw, "{not json");
        assert_eq!(client.metrics().callbacks_unparseable(), 1);
    }

    #[test]
    fn test_duplicate_deliveries_dispatch_twice() {
        let (client, seen) = recording_client("http://127.0.0.1:1");
        let body = ThumbResponse::failed("7_x", "corrupt file").sign(SECRET).unwrap().to_json().unwrap();

        client.receive_callback(body.as_bytes());
        client.receive_callback(body.as_bytes());
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(client.metrics().callbacks_received(), 2);
    }

    #[test]
    fn test_receive_without_handler() {
        let client = ThumberClient::builder(config("http://127.0.0.1:1")).build().unwrap();
        assert!(matches!(client.receive_callback(b""), Verdict::ParseFailed(_)));
    }

    #[test]
    fn test_insecure_credentials_flagged() {
        let client = ThumberClient::builder(ThumberConfig::new("user-1", "")).build().unwrap();
        assert!(client.has_insecure_credentials());
    }

    #[test]
    fn test_preview_truncates() {
        let long = "a".repeat(LOG_PREVIEW_CHARS + 10);
        assert_eq!(preview(&long).len(), LOG_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
