//! D7: basic IMSI-catcher indicators, and D8: encryption-transition
//! detector. Grouped together since both reason over the encryption tag /
//! technology transitions between consecutive samples.

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

pub struct BasicImsiCatcherDetector;

impl Detector for BasicImsiCatcherDetector {
    fn name(&self) -> &'static str {
        "D7_basic_imsi_catcher"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let mut threats = Vec::new();
        let common = sample.common();
        let cfg = ctx.config;

        if let Some(prev) = ctx.previous() {
            let delta_signal = (common.signal_strength_dbm - prev.common().signal_strength_dbm) as f64;
            if delta_signal > cfg.d7_signal_jump_threshold_db {
                threats.push(Threat::new(
                    ThreatType::ImsiCatcherSuspected,
                    Severity::High,
                    common.timestamp,
                    "Signal strength jumped sharply between consecutive samples",
                    Evidence::new()
                        .with("delta_signal_db", delta_signal)
                        .with("signal_strength_dbm", common.signal_strength_dbm as i64)
                        .with("previous_signal_strength_dbm", prev.common().signal_strength_dbm as i64)
                        .build(),
                    0.7,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Sudden signal jump is a classic IMSI-catcher indicator; corroborate with other detectors.",
                ));
            }
        }

        if common.encryption.is_absent() {
            threats.push(Threat::new(
                ThreatType::EncryptionDowngrade,
                Severity::High,
                common.timestamp,
                "Cellular encryption is absent or disabled",
                Evidence::new().with("encryption", format!("{:?}", common.encryption)).build(),
                0.8,
                common.location,
                vec![common.tower_id.clone()],
                "Unencrypted cellular traffic is a strong indicator of a rogue base station.",
            ));
        }

        if common.technology.is_2g_like() {
            let window = ctx.last_n(cfg.d7_forced_downgrade_window);
            let saw_high_tech = window.iter().any(|m| m.common().technology.is_high_tech());
            if saw_high_tech {
                threats.push(Threat::new(
                    ThreatType::ForcedTechnologyDowngrade,
                    Severity::Medium,
                    common.timestamp,
                    "Device was forced down to 2G/GSM after recently using a higher-generation network",
                    Evidence::new().with("current_technology", format!("{:?}", common.technology)).build(),
                    0.6,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Forced downgrade to 2G is a common precursor to IMSI-catcher exploitation.",
                ));
            }
        }

        threats
    }
}

pub struct EncryptionTransitionDetector;

impl Detector for EncryptionTransitionDetector {
    fn name(&self) -> &'static str {
        "D8_encryption_transition"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let common = sample.common();
        if let Some(prev) = ctx.previous() {
            let prev_rank = prev.common().encryption.rank();
            let curr_rank = common.encryption.rank();
            if prev_rank > curr_rank && curr_rank >= 0 {
                return vec![Threat::new(
                    ThreatType::EncryptionDowngrade,
                    Severity::Medium,
                    common.timestamp,
                    "Encryption strength decreased between consecutive samples",
                    Evidence::new()
                        .with("previous_rank", prev_rank as i64)
                        .with("current_rank", curr_rank as i64)
                        .build(),
                    0.7,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Decreasing encryption strength across samples suggests an active downgrade attack.",
                )];
            }
        }
        Vec::new()
    }
}
