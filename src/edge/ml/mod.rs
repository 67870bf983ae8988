//! Online anomaly model (C6): feature extraction, standardizer, isolation
//! forest, density-based pattern sub-model, and versioned binary
//! persistence.

pub mod cluster;
pub mod features;
pub mod isolation_forest;
pub mod model;
pub mod persist;
pub mod scaler;

pub use features::{extract_features, extract_pattern_row, FEATURE_DIM, PATTERN_DIM};
pub use isolation_forest::IsolationForest;
pub use model::{pattern_threat, AnomalyModel};
pub use persist::ModelArtifact;
pub use scaler::Standardizer;
