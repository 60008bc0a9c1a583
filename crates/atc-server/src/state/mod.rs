//! Shared server state.

pub mod store;

pub use store::{AlertEvent, AppState, IngestError, IngestResult, ScenarioSummary};
