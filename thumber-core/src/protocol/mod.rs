// SPDX-License-Identifier: MIT
//
// Thumber Client: Signed Thumbnail Requests and Webhook Responses
// Copyright (c) 2025 Thumber Client Contributors

//! Protocol data structures for the Thumber API
//!
//! Defines the JSON wire format for thumbnail requests sent to Thumber and for the
//! responses it posts back to the webhook. Both carry an HMAC checksum computed by
//! [`crate::checksum`].

pub mod nonce;
pub mod request;
pub mod response;

pub use request::ThumbRequest;
pub use response::ThumbResponse;

use crate::Error;
use std::fmt;
use std::str::FromStr;

/// Requested thumbnail size, written on the wire as `WIDTHxHEIGHT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(200, 200)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Geometry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::Parse(format!("Invalid geometry '{}': expected WxH", s)))?;

        let parse_dim = |d: &str| {
            d.parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| Error::Parse(format!("Invalid geometry dimension '{}' in '{}'", d, s)))
        };

        Ok(Self::new(parse_dim(w)?, parse_dim(h)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_parse() {
        assert_eq!("200x150".parse::<Geometry>().unwrap(), Geometry::new(200, 150));
        assert_eq!("64X64".parse::<Geometry>().unwrap(), Geometry::new(64, 64));
        assert!("200".parse::<Geometry>().is_err());
        assert!("0x10".parse::<Geometry>().is_err());
        assert!("axb".parse::<Geometry>().is_err());
    }

    #[test]
    fn test_geometry_display() {
        assert_eq!(Geometry::new(320, 240).to_string(), "320x240");
        assert_eq!(Geometry::default().to_string(), "200x200");
    }
}
