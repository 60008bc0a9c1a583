//! Background loops for continuous processing.

pub mod safety_net_loop;
pub mod sequence_loop;
pub mod simulation_loop;
