//! D5: uplink power-control anomalies.

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

pub struct PowerControlDetector;

impl Detector for PowerControlDetector {
    fn name(&self) -> &'static str {
        "D5_power_control"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let cfg = ctx.config;
        let window = ctx.last_n(cfg.buffer_size.min(ctx.buffer.len()));
        let powers: Vec<f64> = window
            .iter()
            .filter_map(|m| m.advanced().and_then(|a| a.uplink_tx_power_dbm))
            .rev()
            .take(cfg.d5_power_control_window)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        if powers.len() < cfg.d5_power_control_window {
            return Vec::new();
        }

        let max_delta = powers.windows(2).map(|w| w[1] - w[0]).fold(0.0_f64, f64::max);
        if max_delta > cfg.d5_power_control_max_delta_db {
            let common = sample.common();
            return vec![Threat::new(
                ThreatType::SuspiciousPowerControl,
                Severity::Medium,
                common.timestamp,
                "Uplink transmit power increased more than expected between consecutive samples",
                Evidence::new().with("max_delta_db", max_delta).with("recent_powers", powers).build(),
                0.5,
                common.location,
                vec![common.tower_id.clone()],
                "Abrupt power-control commands can indicate an adversarial base station probing the device.",
            )];
        }
        Vec::new()
    }
}
