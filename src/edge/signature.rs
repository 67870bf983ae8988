//! Signature matcher (C5): scores the current feature vector against a
//! catalog of known rogue-BTS profiles by weighted similarity (see
//! `model::signature::default_catalog`). Every catalog entry is scored;
//! there is no pre-filter stage.

use crate::model::{Evidence, Measurement, PowerVariationClass, Severity, Signature, Threat, ThreatType};

use super::context::DetectorContext;

pub struct SignatureMatcher {
    catalog: Vec<Signature>,
}

impl SignatureMatcher {
    pub fn new(catalog: Vec<Signature>) -> Self {
        SignatureMatcher { catalog }
    }

    pub fn with_default_catalog() -> Self {
        SignatureMatcher { catalog: crate::model::default_catalog() }
    }

    pub fn catalog(&self) -> &[Signature] {
        &self.catalog
    }

    /// Returns one threat per signature whose score exceeds the configured
    /// threshold. Requires at least `signature_match_min_buffered` samples
    /// in the buffer to fire at all.
    pub fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let cfg = ctx.config;
        if ctx.buffer.len() < cfg.signature_match_min_buffered {
            return Vec::new();
        }

        let ta_zero_count = ctx
            .buffer
            .iter()
            .filter(|m| m.advanced().and_then(|a| a.timing_advance) == Some(0))
            .count();

        let signal_values: Vec<f64> = ctx.buffer.iter().map(|m| m.common().signal_strength_dbm as f64).collect();
        let signal_std = population_std(&signal_values);

        let has_2g_like = ctx.buffer.iter().any(|m| m.common().technology.is_2g_like());

        let mut threats = Vec::new();
        for sig in &self.catalog {
            let (score, matched_checks) = self.score_signature(sig, ta_zero_count, signal_std, has_2g_like);
            if score > cfg.signature_match_threshold {
                let common = sample.common();
                threats.push(Threat::new(
                    ThreatType::SophisticatedImsiCatcher,
                    Severity::Critical,
                    common.timestamp,
                    format!("Feature vector matches known rogue-BTS profile '{}'", sig.name),
                    Evidence::new()
                        .with("signature_name", sig.name.clone())
                        .with("score", score)
                        .with("matched_checks", matched_checks.join(","))
                        .build(),
                    score,
                    common.location,
                    vec![common.tower_id.clone()],
                    format!("High-confidence match against known rogue base station profile '{}'.", sig.name),
                ));
            }
        }
        threats
    }

    fn score_signature(
        &self,
        sig: &Signature,
        ta_zero_count_in_buffer: usize,
        signal_std: f64,
        has_2g_like: bool,
    ) -> (f64, Vec<&'static str>) {
        let mut contributions = Vec::new();
        let mut matched = Vec::new();

        let expected_zeros = sig.ta_zero_count();
        if expected_zeros > 0 {
            let contribution = (ta_zero_count_in_buffer as f64 / expected_zeros as f64).min(1.0);
            if contribution > 0.0 {
                matched.push("ta_zero_pattern");
            }
            contributions.push(contribution);
        }

        if let Some(class) = sig.power_variation_class {
            let contribution = match class {
                PowerVariationClass::High if signal_std > 10.0 => 1.0,
                PowerVariationClass::Medium if (5.0..=15.0).contains(&signal_std) => 1.0,
                PowerVariationClass::Low if signal_std < 5.0 => 1.0,
                _ => 0.0,
            };
            if contribution > 0.0 {
                matched.push("power_variation");
            }
            contributions.push(contribution);
        }

        if sig.has_forced_2g() {
            let contribution = if has_2g_like { 1.0 } else { 0.0 };
            if contribution > 0.0 {
                matched.push("forced_2g");
            }
            contributions.push(contribution);
        }

        if contributions.is_empty() {
            (0.0, matched)
        } else {
            (contributions.iter().sum::<f64>() / contributions.len() as f64, matched)
        }
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.max(0.0).sqrt()
}
