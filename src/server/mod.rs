//! Aggregation server (C8-C11): authenticated session layer, threat store,
//! cross-device correlator, and statistics endpoint.

pub mod auth;
pub mod correlator;
pub mod gateway;
pub mod session;
pub mod store;
pub mod stats_endpoint;

pub use auth::ApiKeyStore;
pub use correlator::Correlator;
pub use gateway::{router, run_reaper, AppState};
pub use session::{Session, SessionState, SessionTable};
pub use store::ThreatStore;
