//! Edge orchestrator (C7): per tick, pull one sample, update shared state,
//! run the full detection stack, and forward any resulting threats.
//!
//! Single-threaded cooperative loop (spec.md §5): one sample, one pass
//! through detectors, one forward to the server per tick. The ML trainer is
//! the only detector-adjacent call allowed to run inline and take
//! non-trivial time, and only when enough rows have accrued since the last
//! fit (spec.md §5, §4.5).

use std::time::Duration as StdDuration;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::EdgeConfig;
use crate::error::EdgeError;
use crate::metrics;
use crate::model::{Measurement, Threat};
use crate::stats::{Channel, StatsEngine};

use super::acquisition::Acquisition;
use super::client::ThreatForwarder;
use super::context::{DetectionBuffer, DetectorContext};
use super::detectors::{default_pipeline, Detector};
use super::ml::{pattern_threat, AnomalyModel};
use super::registry::TowerRegistry;
use super::signature::SignatureMatcher;

pub struct Orchestrator {
    config: EdgeConfig,
    acquisition: Box<dyn Acquisition>,
    registry: TowerRegistry,
    stats: StatsEngine,
    buffer: DetectionBuffer,
    detectors: Vec<Box<dyn Detector>>,
    signature_matcher: SignatureMatcher,
    anomaly_model: AnomalyModel,
    forwarder: ThreatForwarder,
    sys: sysinfo::System,
    ticks: u64,
}

impl Orchestrator {
    pub fn new(config: EdgeConfig, acquisition: Box<dyn Acquisition>) -> Self {
        let thresholds = config.thresholds.clone();
        let anomaly_model = AnomalyModel::new(
            std::path::PathBuf::from(&config.model_path),
            thresholds.ml_max_buffered_rows,
            thresholds.ml_min_train_rows,
            thresholds.ml_tree_count,
            thresholds.ml_contamination,
        );
        let forwarder = ThreatForwarder::new(&config);

        Orchestrator {
            registry: TowerRegistry::new(thresholds.buffer_size),
            stats: StatsEngine::new(thresholds.window_size),
            buffer: DetectionBuffer::new(thresholds.buffer_size),
            detectors: default_pipeline(),
            signature_matcher: SignatureMatcher::with_default_catalog(),
            anomaly_model,
            forwarder,
            config,
            acquisition,
            sys: sysinfo::System::new(),
            ticks: 0,
        }
    }

    /// Runs forever at `config.interval_seconds`, until `shutdown` resolves.
    pub async fn run(&mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let interval = StdDuration::from_secs(self.config.interval_seconds.max(1));
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("orchestrator shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Runs exactly one tick: acquire, update state, detect, forward. Never
    /// panics or propagates — per spec.md §7, the orchestrator never dies on
    /// a single-tick failure.
    pub async fn tick(&mut self) -> Vec<Threat> {
        self.ticks += 1;
        metrics::refresh_edge_memory_gauge(&mut self.sys);

        let acquired = tokio::time::timeout(
            StdDuration::from_secs(self.config.acquisition_timeout_seconds.max(1)),
            self.acquisition.acquire(),
        )
        .await;

        let sample = match acquired {
            Ok(Ok(Some(sample))) => sample,
            Ok(Ok(None)) => {
                metrics::EDGE_TICKS_SKIPPED_TOTAL.with_label_values(&["unavailable"]).inc();
                return Vec::new();
            }
            Ok(Err(e)) => {
                warn!(error = %e, "acquisition error; skipping tick");
                metrics::EDGE_TICKS_SKIPPED_TOTAL.with_label_values(&["error"]).inc();
                return Vec::new();
            }
            Err(_) => {
                warn!("acquisition timed out; skipping tick");
                metrics::EDGE_TICKS_SKIPPED_TOTAL.with_label_values(&["timeout"]).inc();
                return Vec::new();
            }
        };

        let threats = self.process_sample(sample);

        for threat in &threats {
            metrics::THREATS_DETECTED_TOTAL
                .with_label_values(&[threat.threat_type.as_str(), severity_label(threat), "edge"])
                .inc();
            if let Err(e) = self.forwarder.forward(threat).await {
                warn!(error = %e, threat_id = %threat.threat_id, "failed to forward threat to server");
            }
        }

        metrics::EDGE_TICKS_TOTAL.with_label_values(&["processed"]).inc();
        threats
    }

    /// Updates shared state (registry, stats, buffer) from `sample`, then
    /// runs the full C4/C5/C6 detection stack and returns the union of
    /// threats. Split out from `tick` so tests can drive it without an
    /// `Acquisition` implementation.
    pub fn process_sample(&mut self, sample: Measurement) -> Vec<Threat> {
        let timer = metrics::DETECTOR_LATENCY_SECONDS.start_timer();
        let common = sample.common().clone();

        if let Err(e) = self.registry.observe(&common) {
            warn!(error = %e, "tower registry rejected sample");
            timer.stop_and_discard();
            return Vec::new();
        }

        self.stats.push(Channel::Signal, common.signal_strength_dbm as f64);
        if let Some(adv) = sample.advanced() {
            if let Some(ta) = adv.timing_advance {
                self.stats.push(Channel::TimingAdvance, ta as f64);
            }
            if let Some(freq) = adv.downlink_freq_mhz {
                self.stats.push(Channel::Frequency, freq);
            }
            if let Some(power) = adv.uplink_tx_power_dbm {
                self.stats.push(Channel::UplinkPower, power);
            }
        }

        self.buffer.push(sample.clone());

        let ctx = DetectorContext {
            registry: &self.registry,
            stats: &self.stats,
            buffer: self.buffer.as_deque(),
            config: &self.config.thresholds,
            now: Utc::now(),
        };

        let mut threats = Vec::new();
        for detector in &self.detectors {
            threats.extend(detector.run(&ctx, &sample));
        }
        threats.extend(self.signature_matcher.run(&ctx, &sample));

        if let Some(t) = self.anomaly_model.observe_and_score(&ctx, &sample) {
            threats.push(t);
        }
        if let Some(t) = pattern_threat(&ctx, &sample) {
            threats.push(t);
        }

        timer.stop_and_record();
        threats
    }
}

fn severity_label(threat: &Threat) -> &'static str {
    match threat.severity {
        crate::model::Severity::Low => "low",
        crate::model::Severity::Medium => "medium",
        crate::model::Severity::High => "high",
        crate::model::Severity::Critical => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::acquisition::NullAcquisition;
    use crate::model::{AdvancedFields, AdvancedMeasurement, CommonFields, EncryptionTag, TechTag, TowerId};

    fn sample(ta: u8, signal: i32) -> Measurement {
        Measurement::Advanced(AdvancedMeasurement {
            common: CommonFields {
                timestamp: Utc::now(),
                tower_id: TowerId::new("100", 1, 310, 260),
                technology: TechTag::FourG,
                signal_strength_dbm: signal,
                signal_quality: 20,
                encryption: EncryptionTag::A51,
                location: None,
                neighbors: None,
            },
            advanced: AdvancedFields { timing_advance: Some(ta), ..Default::default() },
        })
    }

    #[test]
    fn process_sample_runs_full_pipeline_without_panicking() {
        let mut orch = Orchestrator::new(EdgeConfig::default(), Box::new(NullAcquisition));
        let threats = orch.process_sample(sample(0, -80));
        assert!(threats.iter().any(|t| t.threat_type == crate::model::ThreatType::TimingAdvanceZero));
    }

    #[test]
    fn close_in_rogue_bts_scenario_fires_expected_threats() {
        let mut orch = Orchestrator::new(EdgeConfig::default(), Box::new(NullAcquisition));
        orch.process_sample(sample(12, -95));
        orch.process_sample(sample(11, -90));
        orch.process_sample(sample(13, -92));
        let threats = orch.process_sample(sample(0, -60));

        assert!(threats.iter().any(|t| t.threat_type == crate::model::ThreatType::ImsiCatcherSuspected));
        assert!(threats.iter().any(|t| t.threat_type == crate::model::ThreatType::TimingAdvanceZero));
    }
}
