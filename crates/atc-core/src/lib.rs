pub mod airport;
pub mod aman;
pub mod dman;
pub mod error;
pub mod fpl;
pub mod models;
pub mod performance;
pub mod rules;
pub mod safety_net;
pub mod scenario;
pub mod simulation;
pub mod spatial;
pub mod strips;
pub mod traffic;
pub mod trajectory;
pub mod wake;

pub use airport::{
    AirportDirectory, AirportLayout, AirportLookup, Runway, RunwayConfiguration, RunwayMode,
    RunwayStatus,
};
pub use aman::{AmanConfig, ArrivalManager, ArrivalSequence, RunwayUtilization, SequencedArrival};
pub use dman::{
    CtotCompliance, CtotStatus, DepartureManager, DepartureSequence, DmanConfig,
    SequencedDeparture, SlotComplianceViolation,
};
pub use error::{ParseError, ScenarioError, TransitionError};
pub use fpl::{FlightPlanMessage, MessageKind, ValidationDefect};
pub use models::{
    Annotation, Bay, Clearance, ClearanceType, FlightRecord, FlightRules, FlightStatus, FlightType,
    Position, StatusFlow, WakeCategory,
};
pub use performance::{AircraftPerformance, PerformanceLookup, PerformanceTable};
pub use rules::SafetyNetRules;
pub use safety_net::{Alert, AlertSeverity, AlertType, SafetyNetEngine, SurfacePosition};
pub use scenario::{ScenarioPlayer, TrafficScenario};
pub use simulation::{ProgressionMode, SimulationClock, SimulationConfig, StatusChange};
pub use spatial::haversine_nm;
pub use strips::{StripGenerator, StripOptions};
pub use traffic::{MessageOutcome, SequenceSnapshot, Sequencer, TrafficSet};
pub use trajectory::{FlightPhase, TrajectoryPrediction, TrajectoryPredictor};
pub use wake::{RecatCategory, RequiredSeparation, SeparationScheme};
