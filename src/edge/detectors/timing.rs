//! D1: timing-advance anomalies.

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

pub struct TimingAdvanceDetector;

impl Detector for TimingAdvanceDetector {
    fn name(&self) -> &'static str {
        "D1_timing_advance"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let mut threats = Vec::new();
        let Some(adv) = sample.advanced() else { return threats };
        let Some(ta) = adv.timing_advance else { return threats };
        let common = sample.common();

        if ta == 0 {
            threats.push(Threat::new(
                ThreatType::TimingAdvanceZero,
                Severity::Medium,
                common.timestamp,
                "Timing advance is zero, indicating the serving cell is extremely close",
                Evidence::new().with("timing_advance", ta as i64).build(),
                0.6,
                common.location,
                vec![common.tower_id.clone()],
                "Verify the serving tower's physical location; TA=0 can indicate a nearby rogue base station.",
            ));
        }

        if let Some(prev) = ctx.previous() {
            if let Some(prev_ta) = prev.advanced().and_then(|a| a.timing_advance) {
                let dt_seconds = (common.timestamp - prev.common().timestamp).num_milliseconds() as f64 / 1000.0;
                if dt_seconds > 0.0 {
                    let delta_ta = (ta as f64 - prev_ta as f64).abs();
                    let max_plausible = ((300_000.0 / 3600.0) * dt_seconds) / 554.0;
                    if delta_ta > 2.0 * max_plausible {
                        threats.push(Threat::new(
                            ThreatType::ImpossibleTimingAdvanceChange,
                            Severity::High,
                            common.timestamp,
                            "Timing advance changed more than physically plausible between consecutive samples",
                            Evidence::new()
                                .with("timing_advance", ta as i64)
                                .with("previous_timing_advance", prev_ta as i64)
                                .with("delta_ta", delta_ta)
                                .with("delta_t_seconds", dt_seconds)
                                .with("max_plausible_delta_ta", max_plausible)
                                .build(),
                            0.9,
                            common.location,
                            vec![common.tower_id.clone()],
                            "Impossible TA jump; treat as evidence of a spoofed or relocated base station.",
                        ));
                    }
                }
            }
        }

        threats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorThresholds;
    use crate::edge::context::DetectionBuffer;
    use crate::model::{AdvancedFields, AdvancedMeasurement, CommonFields, EncryptionTag, TechTag, TowerId};
    use crate::stats::StatsEngine;
    use chrono::{Duration, Utc};

    fn adv_sample(ta: u8, ts: chrono::DateTime<Utc>) -> Measurement {
        Measurement::Advanced(AdvancedMeasurement {
            common: CommonFields {
                timestamp: ts,
                tower_id: TowerId::new("1", 1, 310, 260),
                technology: TechTag::FourG,
                signal_strength_dbm: -80,
                signal_quality: 20,
                encryption: EncryptionTag::A51,
                location: None,
                neighbors: None,
            },
            advanced: AdvancedFields { timing_advance: Some(ta), ..Default::default() },
        })
    }

    #[test]
    fn ta_zero_fires() {
        let config = DetectorThresholds::default();
        let stats = StatsEngine::new(config.window_size);
        let mut buf = DetectionBuffer::new(config.buffer_size);
        let sample = adv_sample(0, Utc::now());
        buf.push(sample.clone());
        let ctx = DetectorContext { registry: &crate::edge::registry::TowerRegistry::new(1000), stats: &stats, buffer: buf.as_deque(), config: &config, now: Utc::now() };
        let threats = TimingAdvanceDetector.run(&ctx, &sample);
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].threat_type, ThreatType::TimingAdvanceZero);
        assert_eq!(threats[0].confidence, 0.6);
    }

    #[test]
    fn impossible_ta_change_boundary_fires_at_delta_one() {
        let config = DetectorThresholds::default();
        let stats = StatsEngine::new(config.window_size);
        let mut buf = DetectionBuffer::new(config.buffer_size);
        let t0 = Utc::now();
        let prev = adv_sample(10, t0);
        buf.push(prev);
        let curr = adv_sample(11, t0 + Duration::seconds(1));
        buf.push(curr.clone());
        let ctx = DetectorContext { registry: &crate::edge::registry::TowerRegistry::new(1000), stats: &stats, buffer: buf.as_deque(), config: &config, now: t0 };
        let threats = TimingAdvanceDetector.run(&ctx, &curr);
        assert!(threats.iter().any(|t| t.threat_type == ThreatType::ImpossibleTimingAdvanceChange));
    }
}
