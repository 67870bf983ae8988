//! Tower identity and per-tower signal history (C2 data shape).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a serving cell: `(cell_id, LAC, MCC, MNC)`. Immutable once a
/// `Tower` is inserted into the registry.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TowerId {
    pub cell_id: String,
    pub lac: u32,
    pub mcc: u16,
    pub mnc: u16,
}

impl TowerId {
    pub fn new(cell_id: impl Into<String>, lac: u32, mcc: u16, mnc: u16) -> Self {
        TowerId { cell_id: cell_id.into(), lac, mcc, mnc }
    }

    /// The registry's key: `cell_id|LAC`.
    pub fn key(&self) -> String {
        format!("{}|{}", self.cell_id, self.lac)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Great-circle distance in kilometers (haversine formula).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Radio technology tag. `2G`/`GSM` and `4G`/`LTE` are kept distinct because
/// D7's forced-downgrade rule and the ML feature extractor's technology
/// score both distinguish them.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TechTag {
    #[serde(rename = "5G")]
    FiveG,
    #[serde(rename = "4G")]
    FourG,
    #[serde(rename = "LTE")]
    Lte,
    #[serde(rename = "3G")]
    ThreeG,
    #[serde(rename = "2G")]
    TwoG,
    #[serde(rename = "GSM")]
    Gsm,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl TechTag {
    /// Used by D7's forced-downgrade rule: "current tech in {2G, GSM}".
    pub fn is_2g_like(&self) -> bool {
        matches!(self, TechTag::TwoG | TechTag::Gsm)
    }

    /// Used by D7's forced-downgrade rule: "{4G, LTE, 5G}".
    pub fn is_high_tech(&self) -> bool {
        matches!(self, TechTag::FourG | TechTag::Lte | TechTag::FiveG)
    }

    /// Technology score for the ML feature vector: 5G=5, 4G/LTE=4, 3G=3,
    /// 2G=2, GSM=1, Unknown=0.
    pub fn score(&self) -> f64 {
        match self {
            TechTag::FiveG => 5.0,
            TechTag::FourG | TechTag::Lte => 4.0,
            TechTag::ThreeG => 3.0,
            TechTag::TwoG => 2.0,
            TechTag::Gsm => 1.0,
            TechTag::Unknown => 0.0,
        }
    }
}

/// A serving or neighbour cell as tracked by the tower registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tower {
    pub id: TowerId,
    pub technology: TechTag,
    pub frequency_mhz: Option<f64>,
    pub position: Option<GeoPoint>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Bounded history of signal strengths, capacity 1000; oldest evicted.
    #[serde(skip)]
    pub signal_history: VecDeque<i32>,
}

impl Tower {
    pub const SIGNAL_HISTORY_CAPACITY: usize = 1000;

    pub fn new(id: TowerId, technology: TechTag, frequency_mhz: Option<f64>, now: DateTime<Utc>) -> Self {
        Tower {
            id,
            technology,
            frequency_mhz,
            position: None,
            first_seen: now,
            last_seen: now,
            signal_history: VecDeque::with_capacity(Self::SIGNAL_HISTORY_CAPACITY),
        }
    }

    /// Appends a signal sample and advances `last_seen`. `last_seen` is
    /// never allowed to move backwards even if `now` races behind a prior
    /// update (monotonic invariant from spec.md §3).
    pub fn observe_signal(&mut self, signal_dbm: i32, now: DateTime<Utc>) {
        if self.signal_history.len() >= Self::SIGNAL_HISTORY_CAPACITY {
            self.signal_history.pop_front();
        }
        self.signal_history.push_back(signal_dbm);
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}
