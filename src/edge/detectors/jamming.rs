//! D6: jamming detection via SINR.

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

pub struct JammingDetector;

impl Detector for JammingDetector {
    fn name(&self) -> &'static str {
        "D6_jamming"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let cfg = ctx.config;
        if let Some(sinr) = sample.advanced().and_then(|a| a.sinr_db) {
            if sinr < cfg.d6_jamming_sinr_threshold_db {
                let common = sample.common();
                return vec![Threat::new(
                    ThreatType::PotentialJamming,
                    Severity::High,
                    common.timestamp,
                    "Signal-to-interference-plus-noise ratio is abnormally low, consistent with RF jamming",
                    Evidence::new().with("sinr_db", sinr).build(),
                    0.7,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Possible jamming; check for denial-of-service conditions before trusting this link.",
                )];
            }
        }
        Vec::new()
    }
}
