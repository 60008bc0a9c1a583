//! Offline traffic simulation and server client.

pub mod client;
pub mod runner;
pub mod scenarios;

pub use client::ServerClient;
pub use runner::{OfflineRunner, RunSummary, TickReport};
pub use scenarios::{builtin_scenario, builtin_scenario_ids};
