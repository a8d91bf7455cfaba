//! Stake-gated report ingestion service.
//!
//! Participants post signed reports; the service admits a write only from
//! identities registered with enough stake in the most recent registry
//! snapshot. See [`app::start`] for the startup sequence.

pub mod app;
pub mod config;
pub mod http;
pub mod reports;

pub use app::{AppState, Running, StartupError, start, start_with_source};
pub use config::{ConfigError, ServerConfig};
pub use reports::{MinerInfoReport, ReportStore};
