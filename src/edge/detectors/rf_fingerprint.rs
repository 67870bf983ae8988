//! D2: RF-fingerprint anomalies, and D11: signal-variation anomaly. Grouped
//! together because both are population-std-over-a-trailing-window checks.

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.max(0.0).sqrt()
}

/// Minimum count of RSRQ-bearing samples in the window before the std-dev
/// check is trusted to mean anything.
const MIN_RSRQ_SAMPLES: usize = 5;

pub struct RfFingerprintDetector;

impl Detector for RfFingerprintDetector {
    fn name(&self) -> &'static str {
        "D2_rf_fingerprint"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let mut threats = Vec::new();
        let common = sample.common();
        let cfg = ctx.config;

        if ctx.buffer.len() >= cfg.d2_rf_fingerprint_min_samples {
            let window = ctx.last_n(cfg.d2_rf_fingerprint_min_samples);
            let rsrqs: Vec<f64> = window.iter().filter_map(|m| m.advanced().and_then(|a| a.rsrq_db)).collect();
            if rsrqs.len() >= MIN_RSRQ_SAMPLES {
                let std = population_std(&rsrqs);
                if std > cfg.d2_rsrq_std_threshold_db {
                    threats.push(Threat::new(
                        ThreatType::RfFingerprintAnomaly,
                        Severity::Medium,
                        common.timestamp,
                        "RSRQ variance over the recent window exceeds the expected range for a stable cell",
                        Evidence::new().with("rsrq_std_db", std).with("sample_count", rsrqs.len() as i64).build(),
                        0.5,
                        common.location,
                        vec![common.tower_id.clone()],
                        "Investigate possible RF fingerprint spoofing; compare against known tower profiles.",
                    ));
                }
            }
        }

        if let Some(adv) = sample.advanced() {
            if let (Some(rsrp), Some(rsrq)) = (adv.rsrp_dbm, adv.rsrq_db) {
                if rsrq != 0.0 {
                    let ratio = rsrp / rsrq;
                    if ratio > cfg.d2_rsrp_rsrq_ratio_high || ratio < cfg.d2_rsrp_rsrq_ratio_low {
                        threats.push(Threat::new(
                            ThreatType::SuspiciousRfSignature,
                            Severity::Medium,
                            common.timestamp,
                            "RSRP/RSRQ ratio is outside the plausible range for a genuine cell",
                            Evidence::new().with("rsrp_dbm", rsrp).with("rsrq_db", rsrq).with("ratio", ratio).build(),
                            0.6,
                            common.location,
                            vec![common.tower_id.clone()],
                            "Suspicious RF signature; cross-check against the signature catalog.",
                        ));
                    }
                }
            }
        }

        threats
    }
}

pub struct SignalVariationDetector;

impl Detector for SignalVariationDetector {
    fn name(&self) -> &'static str {
        "D11_signal_variation"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let cfg = ctx.config;
        if ctx.buffer.len() < cfg.d11_signal_variation_min_samples {
            return Vec::new();
        }
        let window = ctx.last_n(cfg.d11_signal_variation_min_samples);
        let signals: Vec<f64> = window.iter().map(|m| m.common().signal_strength_dbm as f64).collect();
        let std = population_std(&signals);
        if std > cfg.d11_signal_variation_std_threshold_db {
            let common = sample.common();
            return vec![Threat::new(
                ThreatType::SignalStrengthAnomaly,
                Severity::Medium,
                common.timestamp,
                "Signal strength variance over the recent window exceeds the expected range",
                Evidence::new().with("signal_std_db", std).with("sample_count", signals.len() as i64).build(),
                0.5,
                common.location,
                vec![common.tower_id.clone()],
                "Unusually volatile signal strength; consider this alongside other detector output.",
            )];
        }
        Vec::new()
    }
}
