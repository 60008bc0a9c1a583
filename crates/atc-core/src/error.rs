//! Error types for the core.

use thiserror::Error;

use crate::fpl::MessageKind;
use crate::models::FlightStatus;

/// A flight plan message that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty flight plan message")]
    Empty,
    #[error("unrecognized message kind '{0}'")]
    UnknownKind(String),
    #[error("{kind} message is missing {field}")]
    MissingField {
        kind: MessageKind,
        field: &'static str,
    },
}

/// A status change that would move a flight backward or across flows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{callsign}: cannot move from {from} to {to}")]
pub struct TransitionError {
    pub callsign: String,
    pub from: FlightStatus,
    pub to: FlightStatus,
}

/// A scenario descriptor that cannot be turned into flights.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("{callsign}: invalid scheduled time '{value}' (expected +MM or HHMM)")]
    InvalidScheduledTime { callsign: String, value: String },
}
