//! Threat record and the closed `ThreatType`/`Severity` enums (spec.md §3,
//! §9 redesign note: the original's open string-typed `threat_type` becomes
//! a closed sum type here).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tower::{GeoPoint, TowerId};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ThreatType {
    #[serde(rename = "TIMING_ADVANCE_ZERO")]
    TimingAdvanceZero,
    #[serde(rename = "IMPOSSIBLE_TIMING_ADVANCE_CHANGE")]
    ImpossibleTimingAdvanceChange,
    #[serde(rename = "RF_FINGERPRINT_ANOMALY")]
    RfFingerprintAnomaly,
    #[serde(rename = "SUSPICIOUS_RF_SIGNATURE")]
    SuspiciousRfSignature,
    #[serde(rename = "INVALID_PHYSICAL_CELL_ID")]
    InvalidPhysicalCellId,
    #[serde(rename = "NO_NEIGHBOR_CELLS")]
    NoNeighborCells,
    #[serde(rename = "EXCESSIVE_NEIGHBOR_CELLS")]
    ExcessiveNeighborCells,
    #[serde(rename = "FREQUENCY_OUT_OF_BAND")]
    FrequencyOutOfBand,
    #[serde(rename = "SUSPICIOUS_FREQUENCY_HOPPING")]
    SuspiciousFrequencyHopping,
    #[serde(rename = "SUSPICIOUS_POWER_CONTROL")]
    SuspiciousPowerControl,
    #[serde(rename = "POTENTIAL_JAMMING")]
    PotentialJamming,
    #[serde(rename = "IMSI_CATCHER_SUSPECTED")]
    ImsiCatcherSuspected,
    #[serde(rename = "ENCRYPTION_DOWNGRADE")]
    EncryptionDowngrade,
    #[serde(rename = "FORCED_TECHNOLOGY_DOWNGRADE")]
    ForcedTechnologyDowngrade,
    #[serde(rename = "EXCESSIVE_TOWER_CHANGES")]
    ExcessiveTowerChanges,
    #[serde(rename = "IMPOSSIBLE_MOVEMENT_SPEED")]
    ImpossibleMovementSpeed,
    #[serde(rename = "SIGNAL_STRENGTH_ANOMALY")]
    SignalStrengthAnomaly,
    #[serde(rename = "SOPHISTICATED_IMSI_CATCHER")]
    SophisticatedImsiCatcher,
    #[serde(rename = "ML_SIGNAL_MANIPULATION")]
    MlSignalManipulation,
    #[serde(rename = "ML_FREQUENT_HANDOVERS")]
    MlFrequentHandovers,
    #[serde(rename = "ML_CLOSE_RANGE_THREAT")]
    MlCloseRangeThreat,
    #[serde(rename = "ML_SIGNAL_INSTABILITY")]
    MlSignalInstability,
    #[serde(rename = "ML_GENERAL_ANOMALY")]
    MlGeneralAnomaly,
    #[serde(rename = "ML_BEHAVIORAL_ANOMALY")]
    MlBehavioralAnomaly,
}

impl ThreatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatType::TimingAdvanceZero => "TIMING_ADVANCE_ZERO",
            ThreatType::ImpossibleTimingAdvanceChange => "IMPOSSIBLE_TIMING_ADVANCE_CHANGE",
            ThreatType::RfFingerprintAnomaly => "RF_FINGERPRINT_ANOMALY",
            ThreatType::SuspiciousRfSignature => "SUSPICIOUS_RF_SIGNATURE",
            ThreatType::InvalidPhysicalCellId => "INVALID_PHYSICAL_CELL_ID",
            ThreatType::NoNeighborCells => "NO_NEIGHBOR_CELLS",
            ThreatType::ExcessiveNeighborCells => "EXCESSIVE_NEIGHBOR_CELLS",
            ThreatType::FrequencyOutOfBand => "FREQUENCY_OUT_OF_BAND",
            ThreatType::SuspiciousFrequencyHopping => "SUSPICIOUS_FREQUENCY_HOPPING",
            ThreatType::SuspiciousPowerControl => "SUSPICIOUS_POWER_CONTROL",
            ThreatType::PotentialJamming => "POTENTIAL_JAMMING",
            ThreatType::ImsiCatcherSuspected => "IMSI_CATCHER_SUSPECTED",
            ThreatType::EncryptionDowngrade => "ENCRYPTION_DOWNGRADE",
            ThreatType::ForcedTechnologyDowngrade => "FORCED_TECHNOLOGY_DOWNGRADE",
            ThreatType::ExcessiveTowerChanges => "EXCESSIVE_TOWER_CHANGES",
            ThreatType::ImpossibleMovementSpeed => "IMPOSSIBLE_MOVEMENT_SPEED",
            ThreatType::SignalStrengthAnomaly => "SIGNAL_STRENGTH_ANOMALY",
            ThreatType::SophisticatedImsiCatcher => "SOPHISTICATED_IMSI_CATCHER",
            ThreatType::MlSignalManipulation => "ML_SIGNAL_MANIPULATION",
            ThreatType::MlFrequentHandovers => "ML_FREQUENT_HANDOVERS",
            ThreatType::MlCloseRangeThreat => "ML_CLOSE_RANGE_THREAT",
            ThreatType::MlSignalInstability => "ML_SIGNAL_INSTABILITY",
            ThreatType::MlGeneralAnomaly => "ML_GENERAL_ANOMALY",
            ThreatType::MlBehavioralAnomaly => "ML_BEHAVIORAL_ANOMALY",
        }
    }

    /// Used by the correlator: "the threat's type contains substring IMSI
    /// (case-insensitive)". All variants are ASCII so a plain `contains` on
    /// the uppercase representation is sufficient.
    pub fn is_imsi_related(&self) -> bool {
        self.as_str().contains("IMSI")
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn is_high_priority(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

/// A detected threat. `evidence` must include every numeric input the
/// decision depended on (spec.md §8 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    pub threat_id: String,
    pub threat_type: ThreatType,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub evidence: BTreeMap<String, serde_json::Value>,
    pub confidence: f64,
    pub location: Option<GeoPoint>,
    pub affected_towers: Vec<TowerId>,
    pub mitigation_advice: String,
}

impl Threat {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        threat_type: ThreatType,
        severity: Severity,
        timestamp: DateTime<Utc>,
        description: impl Into<String>,
        evidence: BTreeMap<String, serde_json::Value>,
        confidence: f64,
        location: Option<GeoPoint>,
        affected_towers: Vec<TowerId>,
        mitigation_advice: impl Into<String>,
    ) -> Self {
        debug_assert!((0.0..=1.0).contains(&confidence), "confidence must be in [0,1]");
        Threat {
            threat_id: uuid::Uuid::new_v4().to_string(),
            threat_type,
            severity,
            timestamp,
            description: description.into(),
            evidence,
            confidence: confidence.clamp(0.0, 1.0),
            location,
            affected_towers,
            mitigation_advice: mitigation_advice.into(),
        }
    }
}

/// Convenience builder for the `evidence` bag so detectors don't hand-roll
/// `BTreeMap` construction at every call site.
#[derive(Default)]
pub struct Evidence(BTreeMap<String, serde_json::Value>);

impl Evidence {
    pub fn new() -> Self {
        Evidence(BTreeMap::new())
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> BTreeMap<String, serde_json::Value> {
        self.0
    }
}
