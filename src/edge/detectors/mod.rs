//! Rule-based detector pipeline (C4): eleven independent, pure detectors.
//!
//! Every detector implements a single stateless contract:
//! `run(&DetectorContext, &Measurement) -> Vec<Threat>`, and never errors
//! out of the pipeline (an empty vec is "no threat", not failure).

mod frequency;
mod imsi_catcher;
mod jamming;
mod location;
mod power;
mod protocol;
mod rf_fingerprint;
mod timing;
mod tower_churn;

pub use frequency::FrequencyDetector;
pub use imsi_catcher::{BasicImsiCatcherDetector, EncryptionTransitionDetector};
pub use jamming::JammingDetector;
pub use location::LocationImpossibilityDetector;
pub use power::PowerControlDetector;
pub use protocol::ProtocolDetector;
pub use rf_fingerprint::{RfFingerprintDetector, SignalVariationDetector};
pub use timing::TimingAdvanceDetector;
pub use tower_churn::TowerChurnDetector;

use crate::model::{Measurement, Threat};

pub use crate::edge::context::DetectorContext;

pub trait Detector: Send + Sync {
    /// Stable name used in logs/metrics labels.
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat>;
}

/// Builds the full D1-D11 pipeline in a fixed order. Order doesn't affect
/// correctness (detectors run independently, spec.md §4.3 "Tie-break") but
/// is kept stable for deterministic evidence/log ordering.
pub fn default_pipeline() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(TimingAdvanceDetector),
        Box::new(RfFingerprintDetector),
        Box::new(ProtocolDetector),
        Box::new(FrequencyDetector),
        Box::new(PowerControlDetector),
        Box::new(JammingDetector),
        Box::new(BasicImsiCatcherDetector),
        Box::new(EncryptionTransitionDetector),
        Box::new(TowerChurnDetector),
        Box::new(LocationImpossibilityDetector),
        Box::new(SignalVariationDetector),
    ]
}
