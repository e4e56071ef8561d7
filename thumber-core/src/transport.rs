// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! HTTP transport for talking to the Thumber API
//!
//! The client only needs GET and POST with a handful of headers, so the transport is
//! a small trait. [`ReqwestTransport`] is the production implementation; tests and
//! embedders can substitute their own.

use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Status and body of an HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP transport
///
/// An `Err` means the exchange never completed (connection refused, timeout, TLS).
/// Any status the server returns, including 4xx and 5xx, is an `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<HttpResponse>;

    async fn post(&self, url: &Url, headers: &[(&str, &str)], body: Vec<u8>) -> Result<HttpResponse>;
}

/// reqwest-backed transport with a bounded timeout and a fixed user agent
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(user_agent)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .use_rustls_tls()
            .build()
            .map_err(Error::Network)?;

        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(Error::Network)?;
        if !(200..300).contains(&status) {
            warn!("HTTP error {}: {}", status, body);
        }
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        debug!("GET {}", url);
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Failed to GET {}: {}", url, e);
            Error::Network(e)
        })?;
        Self::read(response).await
    }

    async fn post(&self, url: &Url, headers: &[(&str, &str)], body: Vec<u8>) -> Result<HttpResponse> {
        debug!("POST {} ({} bytes)", url, body.len());
        let mut request = self.client.post(url.clone()).body(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Failed to POST {}: {}", url, e);
            Error::Network(e)
        })?;
        Self::read(response).await
    }
}
