//! Departure manager (DMAN) and A-CDM timeline.
//!
//! Builds the TOBT/TSAT/TTOT/CTOT timeline for every departure still on the
//! ground. Take-off times are spaced by the wake departure interval (never
//! less than 90 s) and pulled into the ATFM slot window when a CTOT exists.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::airport::RunwayConfiguration;
use crate::aman::RunwayUtilization;
use crate::models::{FlightRecord, FlightStatus};
use crate::wake::{calculate_separation, optimize_sequence, SeparationScheme};

/// Statuses considered by the departure sequence.
pub const SEQUENCED_STATUSES: [FlightStatus; 6] = [
    FlightStatus::Filed,
    FlightStatus::ClearanceDelivered,
    FlightStatus::PushApproved,
    FlightStatus::Taxiing,
    FlightStatus::Holding,
    FlightStatus::Lineup,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmanConfig {
    pub taxi_time_average_min: i64,
    /// Added for terminal 2 gates (ids starting with `2`).
    pub cross_terminal_extra_min: i64,
    /// Added for remote stands (ids longer than three characters).
    pub remote_stand_extra_min: i64,
    /// Between off-block plus taxi and take-off.
    pub takeoff_buffer_min: i64,
    pub min_departure_interval_secs: i64,
    pub ctot_window_before_min: i64,
    pub ctot_window_after_min: i64,
    pub use_recat: bool,
}

impl Default for DmanConfig {
    fn default() -> Self {
        Self {
            taxi_time_average_min: 15,
            cross_terminal_extra_min: 5,
            remote_stand_extra_min: 8,
            takeoff_buffer_min: 5,
            min_departure_interval_secs: 90,
            ctot_window_before_min: 5,
            ctot_window_after_min: 10,
            use_recat: true,
        }
    }
}

/// Which side of the slot window the unconstrained TTOT fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotDeviation {
    TooEarly,
    TooLate,
}

/// The sequenced TTOT could not be kept inside the CTOT window and was
/// pinned to the nearer edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotComplianceViolation {
    pub callsign: String,
    pub ctot: DateTime<Utc>,
    pub window_open: DateTime<Utc>,
    pub window_close: DateTime<Utc>,
    pub unconstrained_ttot: DateTime<Utc>,
    pub applied_ttot: DateTime<Utc>,
    pub deviation: SlotDeviation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedDeparture {
    pub flight_id: String,
    pub callsign: String,
    pub tobt: DateTime<Utc>,
    pub tsat: DateTime<Utc>,
    pub ttot: DateTime<Utc>,
    pub ctot: Option<DateTime<Utc>>,
    pub taxi_time_min: i64,
    /// 1-based.
    pub sequence_position: usize,
    pub gate: String,
    pub runway: String,
    pub slot_violation: Option<SlotComplianceViolation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureSequence {
    pub runway: String,
    pub calculated_at: DateTime<Utc>,
    pub flights: Vec<SequencedDeparture>,
}

impl DepartureSequence {
    pub fn find(&self, flight_id: &str) -> Option<&SequencedDeparture> {
        self.flights.iter().find(|f| f.flight_id == flight_id)
    }

    /// 1-based position, 0 when the flight is not in this sequence.
    pub fn position_of(&self, flight_id: &str) -> usize {
        self.find(flight_id).map_or(0, |f| f.sequence_position)
    }

    pub fn departure_rate(&self, runway: &RunwayConfiguration) -> RunwayUtilization {
        let times: Vec<_> = self.flights.iter().map(|f| f.ttot).collect();
        RunwayUtilization::from_times(&times, runway.departure_rate)
    }

    pub fn violations(&self) -> impl Iterator<Item = &SlotComplianceViolation> {
        self.flights.iter().filter_map(|f| f.slot_violation.as_ref())
    }
}

/// Single-flight CDM timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdmTimeline {
    pub tobt: DateTime<Utc>,
    pub tsat: DateTime<Utc>,
    pub ttot: DateTime<Utc>,
    pub ctot: Option<DateTime<Utc>>,
    pub taxi_time_min: i64,
    pub sequence_number: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CtotStatus {
    Early,
    OnTime,
    Late,
    NoSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtotCompliance {
    pub compliant: bool,
    pub status: CtotStatus,
    pub window_opens: Option<DateTime<Utc>>,
    pub window_closes: Option<DateTime<Utc>>,
}

/// Time used to order departures: CTOT, then TTOT, then TSAT, then EOBT.
///
/// Flights with none of these sort after all others.
pub fn sequencing_time(flight: &FlightRecord) -> Option<DateTime<Utc>> {
    flight.ctot.or(flight.ttot).or(flight.tsat).or(flight.eobt)
}

/// Off-block time the timeline starts from: TOBT, then EOBT, then `now`.
pub fn off_block_time(flight: &FlightRecord, now: DateTime<Utc>) -> DateTime<Utc> {
    flight.tobt.or(flight.eobt).unwrap_or(now)
}

#[derive(Debug, Clone, Default)]
pub struct DepartureManager {
    config: DmanConfig,
}

impl DepartureManager {
    pub fn new(config: DmanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DmanConfig {
        &self.config
    }

    /// Taxi time in minutes from gate heuristics.
    pub fn estimate_taxi_time(&self, flight: &FlightRecord) -> i64 {
        let gate = flight.gate.as_deref().unwrap_or_default();
        let base = self.config.taxi_time_average_min;
        if gate.starts_with('2') {
            base + self.config.cross_terminal_extra_min
        } else if gate.len() > 3 {
            base + self.config.remote_stand_extra_min
        } else {
            base
        }
    }

    fn ctot_window(&self, ctot: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            ctot - Duration::minutes(self.config.ctot_window_before_min),
            ctot + Duration::minutes(self.config.ctot_window_after_min),
        )
    }

    /// Sequence ground departures for one runway.
    pub fn calculate_sequence(
        &self,
        flights: &[FlightRecord],
        runway: &RunwayConfiguration,
        now: DateTime<Utc>,
    ) -> DepartureSequence {
        let mut departures: Vec<&FlightRecord> = flights
            .iter()
            .filter(|f| SEQUENCED_STATUSES.contains(&f.status()))
            .collect();
        departures.sort_by_key(|f| {
            let key = sequencing_time(f);
            (key.is_none(), key)
        });

        let scheme = SeparationScheme::from_recat_flag(self.config.use_recat);
        let mut sequenced = Vec::with_capacity(departures.len());
        let mut previous: Option<(&FlightRecord, DateTime<Utc>)> = None;

        for (idx, flight) in departures.into_iter().enumerate() {
            let tobt = off_block_time(flight, now);
            let taxi_min = self.estimate_taxi_time(flight);
            let desired_ttot =
                tobt + Duration::minutes(taxi_min + self.config.takeoff_buffer_min);

            let mut ttot = match previous {
                None => desired_ttot,
                Some((leader, leader_ttot)) => {
                    let wake_secs = i64::from(calculate_separation(leader, flight, scheme).time_secs);
                    let interval = wake_secs.max(self.config.min_departure_interval_secs);
                    desired_ttot.max(leader_ttot + Duration::seconds(interval))
                }
            };

            let mut slot_violation = None;
            if let Some(ctot) = flight.ctot {
                let (open, close) = self.ctot_window(ctot);
                let deviation = if ttot < open {
                    Some((SlotDeviation::TooEarly, open))
                } else if ttot > close {
                    Some((SlotDeviation::TooLate, close))
                } else {
                    None
                };
                if let Some((deviation, edge)) = deviation {
                    let violation = SlotComplianceViolation {
                        callsign: flight.callsign.clone(),
                        ctot,
                        window_open: open,
                        window_close: close,
                        unconstrained_ttot: ttot,
                        applied_ttot: edge,
                        deviation,
                    };
                    tracing::warn!(
                        "{} cannot meet CTOT {}: TTOT {} pinned to {} ({:?})",
                        violation.callsign,
                        ctot.format("%H:%M"),
                        ttot.format("%H:%M:%S"),
                        edge.format("%H:%M:%S"),
                        deviation
                    );
                    ttot = edge;
                    slot_violation = Some(violation);
                }
            }

            sequenced.push(SequencedDeparture {
                flight_id: flight.id.clone(),
                callsign: flight.callsign.clone(),
                tobt,
                tsat: ttot - Duration::minutes(taxi_min),
                ttot,
                ctot: flight.ctot,
                taxi_time_min: taxi_min,
                sequence_position: idx + 1,
                gate: flight.gate.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
                runway: runway.runway.clone(),
                slot_violation,
            });
            previous = Some((flight, ttot));
        }

        tracing::debug!(
            "DMAN {}: {} departures sequenced",
            runway.runway,
            sequenced.len()
        );

        DepartureSequence {
            runway: runway.runway.clone(),
            calculated_at: now,
            flights: sequenced,
        }
    }

    /// Timeline for one flight without resequencing the others.
    ///
    /// # Arguments
    /// * `target_ttot` - Take-off time to plan backwards from; derived from
    ///   TOBT when absent
    /// * `current` - Latest sequence, used only for the sequence number
    pub fn calculate_tsat(
        &self,
        flight: &FlightRecord,
        target_ttot: Option<DateTime<Utc>>,
        current: Option<&DepartureSequence>,
        now: DateTime<Utc>,
    ) -> CdmTimeline {
        let tobt = off_block_time(flight, now);
        let taxi_min = self.estimate_taxi_time(flight);
        let ttot = target_ttot.unwrap_or_else(|| {
            tobt + Duration::minutes(taxi_min + self.config.takeoff_buffer_min)
        });

        CdmTimeline {
            tobt,
            tsat: ttot - Duration::minutes(taxi_min),
            ttot,
            ctot: flight.ctot,
            taxi_time_min: taxi_min,
            sequence_number: current.map_or(0, |seq| seq.position_of(&flight.id)),
        }
    }

    /// Where `now` falls relative to the flight's slot window.
    pub fn check_ctot_compliance(&self, flight: &FlightRecord, now: DateTime<Utc>) -> CtotCompliance {
        let Some(ctot) = flight.ctot else {
            return CtotCompliance {
                compliant: true,
                status: CtotStatus::NoSlot,
                window_opens: None,
                window_closes: None,
            };
        };

        let (open, close) = self.ctot_window(ctot);
        let status = if now < open {
            CtotStatus::Early
        } else if now > close {
            CtotStatus::Late
        } else {
            CtotStatus::OnTime
        };
        CtotCompliance {
            compliant: status == CtotStatus::OnTime,
            status,
            window_opens: Some(open),
            window_closes: Some(close),
        }
    }

    /// Suggested order that puts lighter departures first inside each window.
    pub fn optimize_sequence(&self, flights: &[FlightRecord]) -> Vec<FlightRecord> {
        optimize_sequence(flights)
    }
}
