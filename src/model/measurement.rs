//! Measurement and advanced-measurement shapes (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tower::{GeoPoint, TechTag, TowerId};

/// Ciphering suite in use. `A5/3` is the strongest; `Unknown` ranks below
/// `None` for D8's strict-decrease rule but contributes 0 to the ML feature
/// score (two distinct scales, both preserved from the original source).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EncryptionTag {
    #[serde(rename = "A5/3")]
    A53,
    #[serde(rename = "A5/1")]
    A51,
    #[serde(rename = "A5/0")]
    A50,
    None,
    Unknown,
}

impl EncryptionTag {
    /// D8's strength rank: A5/3=3, A5/1=2, A5/0=1, None=0, Unknown=-1.
    pub fn rank(&self) -> i8 {
        match self {
            EncryptionTag::A53 => 3,
            EncryptionTag::A51 => 2,
            EncryptionTag::A50 => 1,
            EncryptionTag::None => 0,
            EncryptionTag::Unknown => -1,
        }
    }

    /// D7's "encryption absent" check: tag in `{None, A5/0}`.
    pub fn is_absent(&self) -> bool {
        matches!(self, EncryptionTag::None | EncryptionTag::A50)
    }

    /// ML feature vector's encryption score: A5/3=3, A5/1=1, else 0.
    pub fn ml_score(&self) -> f64 {
        match self {
            EncryptionTag::A53 => 3.0,
            EncryptionTag::A51 => 1.0,
            _ => 0.0,
        }
    }
}

/// A neighbour-tower descriptor. Detectors only need the count, but the
/// identity is kept for completeness / future correlation use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborCell {
    pub tower_id: TowerId,
    pub signal_strength_dbm: Option<i32>,
}

/// Fields shared by every measurement variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonFields {
    pub timestamp: DateTime<Utc>,
    pub tower_id: TowerId,
    pub technology: TechTag,
    pub signal_strength_dbm: i32,
    /// 0-31 (GSM RxQual/RxLev style) or dB, per spec.md §3.
    pub signal_quality: i32,
    pub encryption: EncryptionTag,
    pub location: Option<GeoPoint>,
    pub neighbors: Option<Vec<NeighborCell>>,
}

/// Fields only present on advanced samples. All optional; a detector that
/// needs one and finds it absent skips the sample (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedFields {
    pub timing_advance: Option<u8>,
    pub frame_number: Option<u32>,
    pub arfcn: Option<u32>,
    pub pci: Option<i32>,
    pub rsrp_dbm: Option<f64>,
    pub rsrq_db: Option<f64>,
    pub sinr_db: Option<f64>,
    pub cqi: Option<u8>,
    pub uplink_tx_power_dbm: Option<f64>,
    pub downlink_freq_mhz: Option<f64>,
    pub uplink_freq_mhz: Option<f64>,
    pub band: Option<String>,
    pub carrier_aggregation_bands: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicMeasurement {
    pub common: CommonFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedMeasurement {
    pub common: CommonFields,
    pub advanced: AdvancedFields,
}

/// Tagged union replacing the original's dynamically-attributed sample
/// record (spec.md §9 redesign note).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Measurement {
    Basic(BasicMeasurement),
    Advanced(AdvancedMeasurement),
}

impl Measurement {
    pub fn common(&self) -> &CommonFields {
        match self {
            Measurement::Basic(m) => &m.common,
            Measurement::Advanced(m) => &m.common,
        }
    }

    pub fn advanced(&self) -> Option<&AdvancedFields> {
        match self {
            Measurement::Basic(_) => None,
            Measurement::Advanced(m) => Some(&m.advanced),
        }
    }
}
