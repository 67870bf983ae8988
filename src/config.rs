//! Edge and server configuration.
//!
//! Both configs are plain `serde`-derived structs with a `Default` matching
//! the thresholds named in §4, loaded with read-or-write-defaults semantics:
//! if the file at the given path is missing, the defaults are serialized and
//! written there so subsequent runs (and operators) can see/edit them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EdgeError;

/// Per-detector thresholds; every magic number in §4 lives here so it is
/// configurable rather than hard-coded in the detector implementations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorThresholds {
    pub window_size: usize,
    pub buffer_size: usize,

    pub d2_rf_fingerprint_min_samples: usize,
    pub d2_rsrq_std_threshold_db: f64,
    pub d2_rsrp_rsrq_ratio_high: f64,
    pub d2_rsrp_rsrq_ratio_low: f64,

    pub d3_pci_min: i32,
    pub d3_pci_max: i32,
    pub d3_neighbor_excessive: usize,

    pub d4_frequency_hopping_window: usize,
    pub d4_frequency_hopping_min_distinct: usize,

    pub d5_power_control_window: usize,
    pub d5_power_control_max_delta_db: f64,

    pub d6_jamming_sinr_threshold_db: f64,

    pub d7_signal_jump_threshold_db: f64,
    pub d7_forced_downgrade_window: usize,

    pub d9_tower_churn_window: usize,
    pub d9_tower_churn_max_distinct: usize,

    pub d10_max_speed_kmh: f64,

    pub d11_signal_variation_min_samples: usize,
    pub d11_signal_variation_std_threshold_db: f64,

    pub signature_match_min_buffered: usize,
    pub signature_match_threshold: f64,

    pub ml_min_train_rows: usize,
    pub ml_max_buffered_rows: usize,
    pub ml_contamination: f64,
    pub ml_tree_count: usize,
    pub ml_severity_score_threshold: f64,
    pub ml_pattern_window: usize,
    pub ml_pattern_eps: f64,
    pub ml_pattern_min_points: usize,
    pub ml_pattern_outlier_fraction_threshold: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            window_size: 100,
            buffer_size: 1000,

            d2_rf_fingerprint_min_samples: 10,
            d2_rsrq_std_threshold_db: 10.0,
            d2_rsrp_rsrq_ratio_high: 50.0,
            d2_rsrp_rsrq_ratio_low: 0.1,

            d3_pci_min: 0,
            d3_pci_max: 503,
            d3_neighbor_excessive: 20,

            d4_frequency_hopping_window: 5,
            d4_frequency_hopping_min_distinct: 3,

            d5_power_control_window: 3,
            d5_power_control_max_delta_db: 10.0,

            d6_jamming_sinr_threshold_db: -10.0,

            d7_signal_jump_threshold_db: 20.0,
            d7_forced_downgrade_window: 5,

            d9_tower_churn_window: 10,
            d9_tower_churn_max_distinct: 5,

            d10_max_speed_kmh: 500.0,

            d11_signal_variation_min_samples: 10,
            d11_signal_variation_std_threshold_db: 15.0,

            signature_match_min_buffered: 20,
            signature_match_threshold: 0.85,

            ml_min_train_rows: 50,
            ml_max_buffered_rows: 1000,
            ml_contamination: 0.10,
            ml_tree_count: 100,
            ml_severity_score_threshold: -0.3,
            ml_pattern_window: 50,
            ml_pattern_eps: 0.5,
            ml_pattern_min_points: 5,
            ml_pattern_outlier_fraction_threshold: 0.20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeConfig {
    /// Monitor interval in seconds between acquisition ticks.
    pub interval_seconds: u64,
    /// Acquisition call timeout in seconds.
    pub acquisition_timeout_seconds: u64,
    /// Path to the persisted anomaly-model artifact.
    pub model_path: String,
    /// Server websocket URL to forward detected threats to.
    pub server_url: String,
    /// Device identity announced at registration.
    pub device_id: String,
    pub device_name: String,
    pub api_key: String,
    pub thresholds: DetectorThresholds,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            acquisition_timeout_seconds: 10,
            model_path: "sentinel_model.bin".to_string(),
            server_url: "ws://127.0.0.1:8765".to_string(),
            device_id: "edge-device".to_string(),
            device_name: "Cellular Sentinel Edge".to_string(),
            api_key: String::new(),
            thresholds: DetectorThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ssl_enabled: bool,
    pub correlation_enabled: bool,
    pub auto_export_enabled: bool,
    pub high_severity_immediate: bool,
    pub api_key_file: String,
    pub database_path: String,
    /// Heartbeat cadence expected from clients, seconds.
    pub heartbeat_interval_seconds: u64,
    /// A session with `last_seen` older than this is stale and may be reaped.
    pub stale_session_seconds: u64,
    /// Coordinated-attack correlation window, minutes.
    pub correlation_window_minutes: i64,
    /// Minimum distinct IMSI-typed threats from other devices to fire a
    /// coordinated-attack alert.
    pub correlation_min_related: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            ssl_enabled: false,
            correlation_enabled: true,
            auto_export_enabled: false,
            high_severity_immediate: true,
            api_key_file: "cellular_api_keys.txt".to_string(),
            database_path: "cellular_threats.db".to_string(),
            heartbeat_interval_seconds: 30,
            stale_session_seconds: 90,
            correlation_window_minutes: 60,
            correlation_min_related: 2,
        }
    }
}

/// Loads JSON config from `path`, writing the default back if the file does
/// not exist yet (mirrors the original system's `load_config`).
pub fn load_or_init<T>(path: &str) -> Result<T, EdgeError>
where
    T: Default + Serialize + for<'de> Deserialize<'de>,
{
    if Path::new(path).exists() {
        let raw = std::fs::read_to_string(path)?;
        let cfg = serde_json::from_str(&raw)?;
        Ok(cfg)
    } else {
        let cfg = T::default();
        let raw = serde_json::to_string_pretty(&cfg)?;
        std::fs::write(path, raw)?;
        Ok(cfg)
    }
}
