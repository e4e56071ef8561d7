// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Metrics collection and reporting

use parking_lot::RwLock;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const LATENCY_WINDOW: usize = 10_000;

/// Shared counters for outbound requests and inbound webhook deliveries
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Instant,

    // Outbound
    requests_sent: AtomicU64,
    requests_rejected: AtomicU64,
    requests_failed: AtomicU64,

    // Inbound
    callbacks_received: AtomicU64,
    callbacks_unparseable: AtomicU64,
    callbacks_forged: AtomicU64,
    thumbnail_bytes: AtomicU64,

    // Outbound latency (microseconds)
    request_latencies: RwLock<Vec<u64>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Instant::now(),
                requests_sent: AtomicU64::new(0),
                requests_rejected: AtomicU64::new(0),
                requests_failed: AtomicU64::new(0),
                callbacks_received: AtomicU64::new(0),
                callbacks_unparseable: AtomicU64::new(0),
                callbacks_forged: AtomicU64::new(0),
                thumbnail_bytes: AtomicU64::new(0),
                request_latencies: RwLock::new(Vec::with_capacity(LATENCY_WINDOW)),
            }),
        }
    }

    /// Request reached the service and was accepted
    pub fn record_request(&self, latency_micros: u64) {
        self.inner.requests_sent.fetch_add(1, Ordering::Relaxed);

        let mut latencies = self.inner.request_latencies.write();
        latencies.push(latency_micros);
        if latencies.len() > LATENCY_WINDOW {
            latencies.drain(0..LATENCY_WINDOW / 2);
        }
    }

    /// Request failed local validation and was never sent
    pub fn record_request_rejected(&self) {
        self.inner.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Request failed in transit or the service refused it
    pub fn record_request_failure(&self) {
        self.inner.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback(&self) {
        self.inner.callbacks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_unparseable(&self) {
        self.inner.callbacks_unparseable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_forged(&self) {
        self.inner.callbacks_forged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_thumbnail(&self, bytes: usize) {
        self.inner.thumbnail_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn requests_sent(&self) -> u64 {
        self.inner.requests_sent.load(Ordering::Relaxed)
    }

    pub fn requests_rejected(&self) -> u64 {
        self.inner.requests_rejected.load(Ordering::Relaxed)
    }

    pub fn requests_failed(&self) -> u64 {
        self.inner.requests_failed.load(Ordering::Relaxed)
    }

    pub fn callbacks_received(&self) -> u64 {
        self.inner.callbacks_received.load(Ordering::Relaxed)
    }

    pub fn callbacks_unparseable(&self) -> u64 {
        self.inner.callbacks_unparseable.load(Ordering::Relaxed)
    }

    pub fn callbacks_forged(&self) -> u64 {
        self.inner.callbacks_forged.load(Ordering::Relaxed)
    }

    pub fn thumbnail_bytes(&self) -> u64 {
        self.inner.thumbnail_bytes.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    pub fn latency_percentile(&self, percentile: f64) -> Option<u64> {
        let latencies = self.inner.request_latencies.read();
        if latencies.is_empty() {
            return None;
        }

        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let index = ((sorted.len() as f64 * percentile).ceil() as usize).min(sorted.len() - 1);
        Some(sorted[index])
    }

    pub fn latency_p50(&self) -> Option<u64> {
        self.latency_percentile(0.50)
    }

    pub fn latency_p99(&self) -> Option<u64> {
        self.latency_percentile(0.99)
    }

    /// Generate Prometheus-compatible metrics output
    pub fn prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("thumber_requests_sent_total", "Requests accepted by the Thumber API", self.requests_sent()),
            ("thumber_requests_rejected_total", "Requests that failed local validation", self.requests_rejected()),
            ("thumber_requests_failed_total", "Requests that failed in transit or were refused", self.requests_failed()),
            ("thumber_callbacks_received_total", "Webhook deliveries received", self.callbacks_received()),
            ("thumber_callbacks_unparseable_total", "Webhook deliveries that could not be parsed", self.callbacks_unparseable()),
            ("thumber_callbacks_forged_total", "Webhook deliveries with an invalid checksum", self.callbacks_forged()),
            ("thumber_thumbnail_bytes_total", "Thumbnail bytes stored", self.thumbnail_bytes()),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value);
        }

        let _ = writeln!(output, "# HELP thumber_uptime_seconds Service uptime in seconds");
        let _ = writeln!(output, "# TYPE thumber_uptime_seconds gauge");
        let _ = writeln!(output, "thumber_uptime_seconds {}", self.uptime_seconds());

        if let Some(p50) = self.latency_p50() {
            let _ = writeln!(output, "# HELP thumber_request_latency_p50_microseconds Request latency 50th percentile");
            let _ = writeln!(output, "# TYPE thumber_request_latency_p50_microseconds gauge");
            let _ = writeln!(output, "thumber_request_latency_p50_microseconds {}", p50);
        }

        if let Some(p99) = self.latency_p99() {
            let _ = writeln!(output, "# HELP thumber_request_latency_p99_microseconds Request latency 99th percentile");
            let _ = writeln!(output, "# TYPE thumber_request_latency_p99_microseconds gauge");
            let _ = writeln!(output, "thumber_request_latency_p99_microseconds {}", p99);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_request(100);
        metrics.record_request(200);
        metrics.record_request_rejected();
        metrics.record_request_failure();
        metrics.record_callback();
        metrics.record_callback_forged();
        metrics.record_thumbnail(2048);

        assert_eq!(metrics.requests_sent(), 2);
        assert_eq!(metrics.requests_rejected(), 1);
        assert_eq!(metrics.requests_failed(), 1);
        assert_eq!(metrics.callbacks_received(), 1);
        assert_eq!(metrics.callbacks_forged(), 1);
        assert_eq!(metrics.callbacks_unparseable(), 0);
        assert_eq!(metrics.thumbnail_bytes(), 2048);
    }

    #[test]
    fn test_latency_percentiles() {
        let metrics = Metrics::new();
        assert_eq!(metrics.latency_p50(), None);

        for i in 1..=100 {
            metrics.record_request(i);
        }

        let p50 = metrics.latency_p50().unwrap();
        assert!((45..=55).contains(&p50));

        let p99 = metrics.latency_p99().unwrap();
        assert!((95..=100).contains(&p99));
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_callback();
        let text = metrics.prometheus_format();
        assert!(text.contains("thumber_callbacks_received_total 1"));
        assert!(text.contains("# TYPE thumber_requests_sent_total counter"));
        assert!(!text.contains("p50"));
    }
}
