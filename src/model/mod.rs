//! Shared data model: towers, measurements, threats, and the signature
//! catalog. Replaces the original system's dynamically-attributed records
//! with closed, tagged Rust types (see DESIGN.md / spec.md §9).

pub mod measurement;
pub mod signature;
pub mod threat;
pub mod tower;

pub use measurement::{
    AdvancedFields, AdvancedMeasurement, BasicMeasurement, CommonFields, EncryptionTag,
    Measurement, NeighborCell,
};
pub use signature::{default_catalog, PowerVariationClass, ProtocolDeviationTag, Signature};
pub use threat::{Evidence, Severity, Threat, ThreatType};
pub use tower::{GeoPoint, TechTag, Tower, TowerId};
