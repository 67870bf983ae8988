//! D10: impossible movement speed between consecutive located samples.

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

pub struct LocationImpossibilityDetector;

impl Detector for LocationImpossibilityDetector {
    fn name(&self) -> &'static str {
        "D10_location_impossibility"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let common = sample.common();
        let Some(curr_loc) = common.location else { return Vec::new() };
        let Some(prev) = ctx.previous() else { return Vec::new() };
        let Some(prev_loc) = prev.common().location else { return Vec::new() };

        let elapsed_hours = (common.timestamp - prev.common().timestamp).num_milliseconds() as f64 / 3_600_000.0;
        if elapsed_hours <= 0.0 {
            return Vec::new();
        }

        let distance_km = prev_loc.distance_km(&curr_loc);
        let speed_kmh = distance_km / elapsed_hours;

        if speed_kmh > ctx.config.d10_max_speed_kmh {
            return vec![Threat::new(
                ThreatType::ImpossibleMovementSpeed,
                Severity::High,
                common.timestamp,
                "Implied speed between consecutive located samples exceeds any plausible mode of travel",
                Evidence::new()
                    .with("distance_km", distance_km)
                    .with("elapsed_hours", elapsed_hours)
                    .with("speed_kmh", speed_kmh)
                    .build(),
                0.9,
                Some(curr_loc),
                vec![common.tower_id.clone()],
                "Impossible movement speed indicates spoofed location data or a relayed/replayed measurement.",
            )];
        }
        Vec::new()
    }
}
