//! Feature vector construction for the online anomaly model (C6).
//!
//! Produces a 13-dimensional vector for the main ensemble and a
//! 7-dimensional vector for the pattern sub-model.

use chrono::Duration;

use crate::model::Measurement;

use super::super::context::DetectorContext;

pub const FEATURE_DIM: usize = 13;
pub const PATTERN_DIM: usize = 7;

/// 13-dim feature vector: signal, signal_quality, window-mean signal,
/// window-std signal, signal-range, Δsignal vs previous, tower-changes-1h,
/// tower-changes-24h, TA, tech score, encryption score, inter-sample
/// distance (km), inter-sample speed (km/h, capped at 500). Missing
/// fields become 0.
pub fn extract_features(ctx: &DetectorContext<'_>, sample: &Measurement) -> [f64; FEATURE_DIM] {
    let common = sample.common();
    let signal = common.signal_strength_dbm as f64;
    let signal_quality = common.signal_quality as f64;

    let window_mean = ctx.stats.mean(crate::stats::Channel::Signal);
    let window_std = ctx.stats.std(crate::stats::Channel::Signal);
    let signal_range = ctx.stats.range(crate::stats::Channel::Signal);

    let prev = ctx.previous();
    let delta_signal = prev.map(|p| signal - p.common().signal_strength_dbm as f64).unwrap_or(0.0);

    let tower_changes_1h = ctx.registry.distinct_towers_since(ctx.now, Duration::hours(1)) as f64;
    let tower_changes_24h = ctx.registry.distinct_towers_since(ctx.now, Duration::hours(24)) as f64;

    let ta = sample.advanced().and_then(|a| a.timing_advance).map(|t| t as f64).unwrap_or(0.0);
    let tech_score = common.technology.score();
    let enc_score = common.encryption.ml_score();

    let (distance_km, speed_kmh) = match (common.location, prev.and_then(|p| p.common().location)) {
        (Some(curr_loc), Some(prev_loc)) => {
            let dt_hours = prev
                .map(|p| (common.timestamp - p.common().timestamp).num_milliseconds() as f64 / 3_600_000.0)
                .unwrap_or(0.0);
            let distance = prev_loc.distance_km(&curr_loc);
            let speed = if dt_hours > 0.0 { (distance / dt_hours).min(500.0) } else { 0.0 };
            (distance, speed)
        }
        _ => (0.0, 0.0),
    };

    [
        signal,
        signal_quality,
        window_mean,
        window_std,
        signal_range,
        delta_signal,
        tower_changes_1h,
        tower_changes_24h,
        ta,
        tech_score,
        enc_score,
        distance_km,
        speed_kmh,
    ]
}

/// 7-dim pattern-analysis row for the DBSCAN-style sub-model: signal,
/// signal_quality, TA, tech score, enc score, Δt (seconds), Δsignal. `prev`
/// is this sample's own predecessor within the window being analyzed, not
/// necessarily the orchestrator's "current previous sample".
pub fn extract_pattern_row(sample: &Measurement, prev: Option<&Measurement>) -> [f64; PATTERN_DIM] {
    let common = sample.common();
    let signal = common.signal_strength_dbm as f64;
    let signal_quality = common.signal_quality as f64;
    let ta = sample.advanced().and_then(|a| a.timing_advance).map(|t| t as f64).unwrap_or(0.0);
    let tech_score = common.technology.score();
    let enc_score = common.encryption.ml_score();

    let dt_seconds = prev
        .map(|p| (common.timestamp - p.common().timestamp).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0);
    let delta_signal = prev.map(|p| signal - p.common().signal_strength_dbm as f64).unwrap_or(0.0);

    [signal, signal_quality, ta, tech_score, enc_score, dt_seconds, delta_signal]
}
