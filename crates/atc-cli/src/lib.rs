//! Operator tools for the tower decision-support server.
//!
//! The `sim` module drives scenarios offline through the same clock and
//! sequencers the server uses, and talks to a running server over HTTP.

pub mod sim;
