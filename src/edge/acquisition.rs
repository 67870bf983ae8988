//! Measurement ingestion interface (C1). The acquisition layer itself
//! (platform-specific modem parsing) is out of scope; only the contract is
//! specified: return one normalized sample per call, or `None` when
//! unavailable, within the configured timeout.

use async_trait::async_trait;

use crate::error::EdgeError;
use crate::model::Measurement;

#[async_trait]
pub trait Acquisition: Send + Sync {
    /// Returns the next normalized measurement, or `None` if real data is
    /// unavailable right now. Implementations must never synthesize data to
    /// fill the gap in production — `None` means "skip this tick", not
    /// "simulate".
    async fn acquire(&self) -> Result<Option<Measurement>, EdgeError>;
}

/// Acquisition stand-in used only by tests; always reports unavailable.
/// Production wiring must supply a real platform-specific `Acquisition`.
#[cfg(test)]
pub struct NullAcquisition;

#[cfg(test)]
#[async_trait]
impl Acquisition for NullAcquisition {
    async fn acquire(&self) -> Result<Option<Measurement>, EdgeError> {
        Ok(None)
    }
}
