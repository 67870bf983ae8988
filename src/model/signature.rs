//! Known rogue-BTS signature catalog (C5 data shape, spec.md §3/§4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum PowerVariationClass {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ProtocolDeviationTag {
    InvalidLac,
    Forced2g,
    EncryptionDowngrade,
    /// Reserved: catalogued but never scored by the matcher (see
    /// DESIGN.md Open Question #2).
    FakePaging,
    /// Reserved: catalogued but never scored by the matcher.
    LocationUpdateReject,
}

/// A named rogue-BTS profile. `ta_zero_pattern` is a bitmask (as a list of
/// 0/1) whose zero-count `E` anchors the TA-zero contribution in C5's
/// scoring formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub ta_zero_pattern: Vec<u8>,
    pub power_variation_class: Option<PowerVariationClass>,
    pub protocol_deviations: Vec<ProtocolDeviationTag>,
}

impl Signature {
    /// `E`: expected count of TA=0 occurrences this profile's fingerprint
    /// predicts — the sum of the 0/1 pattern, each `1` marking a position
    /// where the known attack's timing advance sat at zero.
    pub fn ta_zero_count(&self) -> usize {
        self.ta_zero_pattern.iter().filter(|&&b| b == 1).count()
    }

    pub fn has_forced_2g(&self) -> bool {
        self.protocol_deviations.contains(&ProtocolDeviationTag::Forced2g)
    }
}

/// Default catalog of known-rogue-BTS profiles (StingRay, Hailstorm, DRT
/// Box) used to seed the similarity scorer when no custom catalog is
/// configured.
pub fn default_catalog() -> Vec<Signature> {
    vec![
        Signature {
            name: "StingRay".to_string(),
            ta_zero_pattern: vec![1, 1, 1, 0, 1, 1, 1, 1, 1, 1],
            power_variation_class: Some(PowerVariationClass::High),
            protocol_deviations: vec![
                ProtocolDeviationTag::Forced2g,
                ProtocolDeviationTag::FakePaging,
            ],
        },
        Signature {
            name: "Hailstorm".to_string(),
            ta_zero_pattern: vec![1, 1, 0, 1, 1, 0, 1, 1, 1, 1],
            power_variation_class: Some(PowerVariationClass::Medium),
            protocol_deviations: vec![
                ProtocolDeviationTag::EncryptionDowngrade,
                ProtocolDeviationTag::LocationUpdateReject,
            ],
        },
        Signature {
            name: "DRT Box".to_string(),
            ta_zero_pattern: vec![1, 0, 1, 1, 1, 1, 1, 0, 1, 1],
            power_variation_class: Some(PowerVariationClass::Low),
            protocol_deviations: vec![
                ProtocolDeviationTag::InvalidLac,
                ProtocolDeviationTag::Forced2g,
            ],
        },
    ]
}
