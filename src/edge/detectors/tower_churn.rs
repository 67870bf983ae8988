//! D9: excessive tower churn over a trailing sample window.

use std::collections::HashSet;

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

pub struct TowerChurnDetector;

impl Detector for TowerChurnDetector {
    fn name(&self) -> &'static str {
        "D9_tower_churn"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let cfg = ctx.config;
        let window = ctx.last_n(cfg.d9_tower_churn_window);
        let distinct: HashSet<_> = window.iter().map(|m| m.common().tower_id.key()).collect();
        if distinct.len() > cfg.d9_tower_churn_max_distinct {
            let common = sample.common();
            return vec![Threat::new(
                ThreatType::ExcessiveTowerChanges,
                Severity::Medium,
                common.timestamp,
                "Device changed serving towers more than expected over the recent window",
                Evidence::new().with("distinct_towers", distinct.len() as i64).with("window_size", window.len() as i64).build(),
                0.6,
                common.location,
                vec![common.tower_id.clone()],
                "Frequent tower handovers can indicate a mobile rogue base station following the device.",
            )];
        }
        Vec::new()
    }
}
