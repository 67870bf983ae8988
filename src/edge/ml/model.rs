//! Online anomaly model orchestration (C6): accumulates feature rows,
//! fits the standardizer + isolation forest once enough data has
//! accrued, scores each new sample, classifies the cause of any flagged
//! outlier, and runs the density-based pattern sub-model.

use std::collections::VecDeque;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::super::context::DetectorContext;
use super::cluster::outlier_fraction;
use super::features::{extract_features, extract_pattern_row, FEATURE_DIM};
use super::isolation_forest::IsolationForest;
use super::persist::ModelArtifact;
use super::scaler::Standardizer;

pub struct AnomalyModel {
    model_path: PathBuf,
    rows: VecDeque<[f64; FEATURE_DIM]>,
    max_rows: usize,
    min_train_rows: usize,
    tree_count: usize,
    contamination: f64,
    artifact: Option<ModelArtifact>,
    rows_since_fit: usize,
}

impl AnomalyModel {
    pub fn new(model_path: PathBuf, max_rows: usize, min_train_rows: usize, tree_count: usize, contamination: f64) -> Self {
        let artifact = match ModelArtifact::load(&model_path) {
            Ok(a) => {
                info!(path = %model_path.display(), "loaded persisted anomaly model");
                Some(a)
            }
            Err(e) => {
                // Model load failure: proceed untrained, keep collecting
                // features (spec.md §7).
                warn!(error = %e, "no usable persisted anomaly model; starting untrained");
                None
            }
        };

        AnomalyModel {
            model_path,
            rows: VecDeque::with_capacity(max_rows),
            max_rows,
            min_train_rows,
            tree_count,
            contamination,
            artifact,
            rows_since_fit: 0,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.artifact.is_some()
    }

    /// Accumulates the current sample's feature vector, (re)fits the model
    /// once enough rows have accrued, and returns an ML threat if the
    /// sample scores as an outlier.
    pub fn observe_and_score(&mut self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Option<Threat> {
        let features = extract_features(ctx, sample);
        if self.rows.len() >= self.max_rows {
            self.rows.pop_front();
        }
        self.rows.push_back(features);
        self.rows_since_fit += 1;

        if self.artifact.is_none() && self.rows.len() >= self.min_train_rows {
            self.fit();
        } else if self.artifact.is_some() && self.rows_since_fit >= self.min_train_rows {
            // Model fit failure leaves the previous model in place and
            // retries once min_train_rows more rows accrue (spec.md §7).
            self.fit();
        }

        let artifact = self.artifact.as_ref()?;
        let scaled = artifact.scaler.transform(&features);
        let score = artifact.forest.decision_score(&scaled);
        if !artifact.forest.is_outlier(&scaled) {
            return None;
        }

        let severity = if score > -0.3 { Severity::Medium } else { Severity::High };
        let confidence = score.abs().min(1.0);
        let threat_type = classify_cause(&features);

        let common = sample.common();
        Some(Threat::new(
            threat_type,
            severity,
            common.timestamp,
            "Online anomaly model flagged this sample as a statistical outlier",
            Evidence::new()
                .with("decision_score", score)
                .with("signal_strength_dbm", features[0])
                .with("delta_signal", features[5])
                .with("tower_changes_1h", features[6])
                .with("timing_advance", features[8])
                .with("window_std", features[3])
                .build(),
            confidence,
            common.location,
            vec![common.tower_id.clone()],
            "Model-flagged anomaly; corroborate against rule-based detector output before escalating.",
        ))
    }

    fn fit(&mut self) {
        let rows: Vec<Vec<f64>> = self.rows.iter().map(|r| r.to_vec()).collect();
        let scaler = Standardizer::fit(&rows, FEATURE_DIM);
        let scaled_rows: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();
        let forest = IsolationForest::fit(&scaled_rows, self.tree_count, self.contamination);
        let artifact = ModelArtifact { scaler, forest };

        if let Err(e) = artifact.save(&self.model_path) {
            warn!(error = %e, "failed to persist anomaly model; keeping it in memory only");
        }
        self.artifact = Some(artifact);
        self.rows_since_fit = 0;
    }
}

/// Classifies the cause of a flagged outlier from its raw (unstandardized)
/// feature vector. Branch order matters: the first matching condition
/// wins, most-specific signal-manipulation check first.
fn classify_cause(features: &[f64; FEATURE_DIM]) -> ThreatType {
    let delta_signal = features[5];
    let tower_changes_1h = features[6];
    let ta = features[8];
    let signal = features[0];
    let window_std = features[3];

    if delta_signal.abs() > 25.0 {
        ThreatType::MlSignalManipulation
    } else if tower_changes_1h > 6.0 {
        ThreatType::MlFrequentHandovers
    } else if ta == 0.0 && signal > -60.0 {
        ThreatType::MlCloseRangeThreat
    } else if window_std > 20.0 {
        ThreatType::MlSignalInstability
    } else {
        ThreatType::MlGeneralAnomaly
    }
}

/// Pattern sub-model (the DBSCAN-shaped companion to the isolation
/// forest): clusters the last `window` samples' 7-dim pattern rows and
/// flags `ML_BEHAVIORAL_ANOMALY` when the noise fraction exceeds the
/// configured threshold. Recomputed fresh each tick from the detection
/// buffer rather than accumulated separately, since it only ever looks at
/// the trailing window.
pub fn pattern_threat(ctx: &DetectorContext<'_>, sample: &Measurement) -> Option<Threat> {
    let cfg = ctx.config;
    if ctx.buffer.len() < cfg.ml_pattern_window {
        return None;
    }
    let window = ctx.last_n(cfg.ml_pattern_window);
    let rows: Vec<Vec<f64>> = window
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let prev = if i == 0 { None } else { Some(window[i - 1]) };
            extract_pattern_row(*m, prev).to_vec()
        })
        .collect();
    let fraction = outlier_fraction(&rows, cfg.ml_pattern_eps, cfg.ml_pattern_min_points);

    if fraction > cfg.ml_pattern_outlier_fraction_threshold {
        let common = sample.common();
        Some(Threat::new(
            ThreatType::MlBehavioralAnomaly,
            Severity::Medium,
            common.timestamp,
            "Recent samples form an unusually high proportion of density-clustering outliers",
            Evidence::new()
                .with("outlier_fraction", fraction)
                .with("window_size", window.len() as i64)
                .build(),
            fraction,
            common.location,
            vec![common.tower_id.clone()],
            "Behavioral pattern anomaly; review the recent sample window for a systemic cause.",
        ))
    } else {
        None
    }
}
