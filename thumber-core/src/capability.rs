// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Service capabilities and subscription limits
//!
//! Used to decide whether a job is worth submitting at all. Missing data never
//! blocks a job: an unknown MIME type list or absent quota means "no restriction".

use crate::client::ThumberClient;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Limits reported by the subscription endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Largest source file accepted, in bytes
    #[serde(default)]
    pub max_file_size: Option<u64>,

    /// Jobs allowed per billing month
    #[serde(default)]
    pub monthly_limit: Option<u64>,

    #[serde(default)]
    pub used_this_month: Option<u64>,
}

impl Quota {
    pub fn permits_file_size(&self, size: u64) -> bool {
        self.max_file_size.map_or(true, |max| size <= max)
    }

    /// Jobs left this month, when the subscription has a monthly limit
    pub fn remaining(&self) -> Option<u64> {
        self.monthly_limit
            .map(|limit| limit.saturating_sub(self.used_this_month.unwrap_or(0)))
    }
}

/// Whether a job should be submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    UnsupportedMimeType,
    FileTooLarge { size: u64, limit: u64 },
    QuotaExhausted,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

/// Snapshot of what the service will accept
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub mime_types: HashSet<String>,
    pub quota: Option<Quota>,
}

impl Capabilities {
    /// Query MIME types and subscription in parallel
    pub async fn fetch(client: &ThumberClient) -> Self {
        let (mime_types, quota) = tokio::join!(client.get_mime_types(), client.get_subscription());
        debug!(
            "Capabilities: {} MIME types, quota {:?}",
            mime_types.len(),
            quota
        );
        Self { mime_types, quota }
    }

    /// Host MIME types the service also supports
    ///
    /// With no service list available, the host list is returned unchanged.
    pub fn intersect<'a, I>(&self, host_types: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        host_types
            .into_iter()
            .filter(|t| self.mime_types.is_empty() || self.mime_types.contains(*t))
            .map(str::to_string)
            .collect()
    }

    /// Decide whether a job for `mime_type` of `file_size` bytes should be sent
    ///
    /// `host_max_upload` is the host application's own upload limit and is checked
    /// before the subscription's file size limit.
    pub fn admit(&self, mime_type: &str, file_size: Option<u64>, host_max_upload: Option<u64>) -> Admission {
        if self.intersect([mime_type]).is_empty() {
            return Admission::UnsupportedMimeType;
        }

        if let Some(size) = file_size {
            if let Some(limit) = host_max_upload.filter(|limit| size > *limit) {
                return Admission::FileTooLarge { size, limit };
            }
            if let Some(quota) = self.quota.as_ref().filter(|q| !q.permits_file_size(size)) {
                let limit = quota.max_file_size.unwrap_or_default();
                return Admission::FileTooLarge { size, limit };
            }
        }

        if self.quota.as_ref().and_then(Quota::remaining) == Some(0) {
            return Admission::QuotaExhausted;
        }

        Admission::Admit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(types: &[&str], quota: Option<Quota>) -> Capabilities {
        Capabilities {
            mime_types: types.iter().map(|t| t.to_string()).collect(),
            quota,
        }
    }

    #[test]
    fn test_quota() {
        let quota = Quota {
            max_file_size: Some(100),
            monthly_limit: Some(10),
            used_this_month: Some(12),
        };
        assert!(quota.permits_file_size(100));
        assert!(!quota.permits_file_size(101));
        assert_eq!(quota.remaining(), Some(0));
        assert!(Quota::default().permits_file_size(u64::MAX));
        assert_eq!(Quota::default().remaining(), None);
    }

    #[test]
    fn test_admit_mime_types() {
        let c = caps(&["application/pdf"], None);
        assert_eq!(c.admit("application/pdf", None, None), Admission::Admit);
        assert_eq!(c.admit("image/png", None, None), Admission::UnsupportedMimeType);

        // Unknown capabilities degrade to admitting everything
        assert!(caps(&[], None).admit("image/png", Some(1 << 30), None).is_admitted());
    }

    #[test]
    fn test_admit_size_limits() {
        let quota = Quota {
            max_file_size: Some(1_000),
            ..Default::default()
        };
        let c = caps(&[], Some(quota));
        assert_eq!(
            c.admit("image/png", Some(1_001), None),
            Admission::FileTooLarge { size: 1_001, limit: 1_000 }
        );
        assert_eq!(
            c.admit("image/png", Some(600), Some(500)),
            Admission::FileTooLarge { size: 600, limit: 500 }
        );
        assert_eq!(c.admit("image/png", None, Some(500)), Admission::Admit);
    }

    #[test]
    fn test_admit_quota_exhausted() {
        let quota = Quota {
            monthly_limit: Some(5),
            used_this_month: Some(5),
            ..Default::default()
        };
        assert_eq!(caps(&[], Some(quota)).admit("image/png", None, None), Admission::QuotaExhausted);
    }

    #[test]
    fn test_intersect() {
        let c = caps(&["image/png", "application/pdf"], None);
        let allowed = c.intersect(["image/png", "text/plain", "application/pdf"]);
        assert_eq!(allowed, vec!["image/png", "application/pdf"]);
        assert_eq!(caps(&[], None).intersect(["text/plain"]), vec!["text/plain"]);
    }
}
