//! D4: frequency-band and frequency-hopping anomalies.

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

/// Accepted bands in MHz: (name, low, high).
const ACCEPTED_BANDS: &[(&str, f64, f64)] = &[
    ("B1", 1920.0, 1980.0),
    ("B3", 1710.0, 1785.0),
    ("B7", 2500.0, 2570.0),
    ("B8", 880.0, 915.0),
    ("B20", 832.0, 862.0),
];

fn in_any_band(freq: f64) -> bool {
    ACCEPTED_BANDS.iter().any(|(_, low, high)| freq >= *low && freq <= *high)
}

pub struct FrequencyDetector;

impl Detector for FrequencyDetector {
    fn name(&self) -> &'static str {
        "D4_frequency"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let mut threats = Vec::new();
        let common = sample.common();
        let cfg = ctx.config;

        if let Some(freq) = sample.advanced().and_then(|a| a.downlink_freq_mhz) {
            if !in_any_band(freq) {
                threats.push(Threat::new(
                    ThreatType::FrequencyOutOfBand,
                    Severity::High,
                    common.timestamp,
                    "Downlink frequency falls outside all recognized cellular bands",
                    Evidence::new().with("downlink_freq_mhz", freq).build(),
                    0.8,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Out-of-band frequency strongly suggests non-carrier equipment.",
                ));
            }
        }

        let window = ctx.last_n(cfg.d4_frequency_hopping_window);
        let freqs: Vec<f64> = window.iter().filter_map(|m| m.advanced().and_then(|a| a.downlink_freq_mhz)).collect();
        if freqs.len() >= cfg.d4_frequency_hopping_min_distinct {
            let distinct: std::collections::HashSet<_> = freqs.iter().map(|f| f.to_bits()).collect();
            if distinct.len() == freqs.len() {
                threats.push(Threat::new(
                    ThreatType::SuspiciousFrequencyHopping,
                    Severity::Medium,
                    common.timestamp,
                    "All recent samples used distinct downlink frequencies, consistent with frequency hopping",
                    Evidence::new().with("recent_frequencies", freqs.clone()).build(),
                    0.6,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Frequent frequency changes are unusual for a stationary serving cell.",
                ));
            }
        }

        threats
    }
}
