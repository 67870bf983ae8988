//! End-to-end detection scenarios (spec.md §8 S1-S6), each driven through
//! `Orchestrator::process_sample` so the full C2-C6 stack participates,
//! exactly as it would on a live tick.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use cellular_sentinel::config::EdgeConfig;
use cellular_sentinel::edge::{Acquisition, Orchestrator};
use cellular_sentinel::error::EdgeError;
use cellular_sentinel::model::{
    AdvancedFields, AdvancedMeasurement, CommonFields, EncryptionTag, GeoPoint, Measurement,
    TechTag, ThreatType, TowerId,
};

/// No scenario here drives the orchestrator through `tick()`, so the
/// acquisition side is never actually called; it only satisfies
/// `Orchestrator::new`'s constructor.
struct NeverAcquires;

#[async_trait]
impl Acquisition for NeverAcquires {
    async fn acquire(&self) -> Result<Option<Measurement>, EdgeError> {
        Ok(None)
    }
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(EdgeConfig::default(), Box::new(NeverAcquires))
}

fn common(ts: chrono::DateTime<Utc>, signal: i32, encryption: EncryptionTag) -> CommonFields {
    CommonFields {
        timestamp: ts,
        tower_id: TowerId::new("200", 1, 310, 260),
        technology: TechTag::FourG,
        signal_strength_dbm: signal,
        signal_quality: 20,
        encryption,
        location: None,
        neighbors: None,
    }
}

fn sample(common: CommonFields, advanced: AdvancedFields) -> Measurement {
    Measurement::Advanced(AdvancedMeasurement { common, advanced })
}

/// S1: close-in rogue BTS. Timing advance collapses to zero while signal
/// jumps sharply, consistent with a rogue base station much closer than the
/// legitimate serving cell.
#[test]
fn s1_close_in_rogue_bts() {
    let mut orch = orchestrator();
    let t0 = Utc::now();
    let tas = [12u8, 11, 13, 0];
    let signals = [-95, -90, -92, -60];

    let mut last = Vec::new();
    for (i, (ta, signal)) in tas.iter().zip(signals.iter()).enumerate() {
        let ts = t0 + Duration::seconds(i as i64);
        let m = sample(
            common(ts, *signal, EncryptionTag::A51),
            AdvancedFields { timing_advance: Some(*ta), ..Default::default() },
        );
        last = orch.process_sample(m);
    }

    assert!(last.iter().any(|t| t.threat_type == ThreatType::ImsiCatcherSuspected));
    assert!(last.iter().any(|t| t.threat_type == ThreatType::TimingAdvanceZero));
}

/// S2: encryption downgrade. D7 (absence check) and D8 (strict-decrease
/// check) both fire `ENCRYPTION_DOWNGRADE`, as two independently-identified
/// threats with distinct ids.
#[test]
fn s2_encryption_downgrade_fires_from_both_detectors() {
    let mut orch = orchestrator();
    let t0 = Utc::now();

    orch.process_sample(sample(common(t0, -80, EncryptionTag::A51), AdvancedFields::default()));
    let threats = orch.process_sample(sample(common(t0 + Duration::seconds(5), -80, EncryptionTag::A50), AdvancedFields::default()));

    let downgrades: Vec<_> = threats.iter().filter(|t| t.threat_type == ThreatType::EncryptionDowngrade).collect();
    assert_eq!(downgrades.len(), 2, "expected both D7 and D8 to independently flag the downgrade");
    assert_ne!(downgrades[0].threat_id, downgrades[1].threat_id);
}

/// S3: impossible movement. Two consecutive located samples imply a speed
/// no real device could achieve.
#[test]
fn s3_impossible_movement_speed() {
    let mut orch = orchestrator();
    let t0 = Utc::now();

    let mut first = common(t0, -80, EncryptionTag::A51);
    first.location = Some(GeoPoint { latitude: 37.7749, longitude: -122.4194 });
    orch.process_sample(sample(first, AdvancedFields::default()));

    let mut second = common(t0 + Duration::seconds(60), -80, EncryptionTag::A51);
    second.location = Some(GeoPoint { latitude: 40.7128, longitude: -74.0060 });
    let threats = orch.process_sample(sample(second, AdvancedFields::default()));

    let movement = threats.iter().find(|t| t.threat_type == ThreatType::ImpossibleMovementSpeed);
    assert!(movement.is_some());
    assert_eq!(movement.unwrap().confidence, 0.9);
}

/// S5: jamming. SINR well below the configured threshold flags potential
/// jamming at the detector's fixed confidence.
#[test]
fn s5_jamming_low_sinr() {
    let mut orch = orchestrator();
    let t0 = Utc::now();
    let m = sample(common(t0, -80, EncryptionTag::A51), AdvancedFields { sinr_db: Some(-15.0), ..Default::default() });
    let threats = orch.process_sample(m);

    let jamming = threats.iter().find(|t| t.threat_type == ThreatType::PotentialJamming);
    assert!(jamming.is_some());
    assert_eq!(jamming.unwrap().confidence, 0.7);
}

/// S6: ML outlier. After the anomaly model has trained on a steady signal
/// environment, a sudden 45 dB jump is flagged as a manipulation-class
/// anomaly by the online model rather than by any rule-based detector.
#[test]
fn s6_ml_flags_signal_manipulation_outlier() {
    let mut orch = orchestrator();
    let t0 = Utc::now();

    for i in 0..60 {
        let ts = t0 + Duration::seconds(i);
        // Small jitter around -85 dBm so the feature distribution isn't
        // perfectly constant (and thus trivially zero-variance).
        let signal = -85 + ((i % 3) - 1) as i32;
        orch.process_sample(sample(common(ts, signal, EncryptionTag::A51), AdvancedFields::default()));
    }

    let outlier_ts = t0 + Duration::seconds(61);
    let threats = orch.process_sample(sample(common(outlier_ts, -40, EncryptionTag::A51), AdvancedFields::default()));

    assert!(threats.iter().any(|t| t.threat_type == ThreatType::MlSignalManipulation));
}
