//! Cellular Sentinel
//! =================
//! Distributed cellular threat detection: rogue base station, jamming, and
//! downgrade-attack telemetry with cross-device correlation.
//!
//! Copyright © 2025 Stephen Bilodeau. All rights reserved.
//! Licensed under GPL-3.0.

pub mod config;
pub mod edge;
pub mod error;
pub mod metrics;
pub mod model;
pub mod protocol;
pub mod server;
pub mod stats;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
