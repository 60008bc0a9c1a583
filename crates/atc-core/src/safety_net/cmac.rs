//! Conformance monitoring (CMAC): is each aircraft doing what it was cleared
//! to do.

use chrono::{DateTime, Utc};

use super::{Alert, AlertSeverity, AlertType, SurfacePosition};
use crate::models::{ClearanceType, FlightRecord, FlightStatus};
use crate::rules::SafetyNetRules;

const RUNWAY_ENTRY_CLEARANCES: [ClearanceType; 3] = [
    ClearanceType::Lineup,
    ClearanceType::Takeoff,
    ClearanceType::Landing,
];

pub fn check(
    rules: &SafetyNetRules,
    flights: &[FlightRecord],
    positions: &[SurfacePosition],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for flight in flights {
        let Some(position) = positions.iter().find(|p| p.flight_id == flight.id) else {
            continue;
        };
        let status = flight.status();
        let runway = position.runway.clone().or_else(|| flight.runway.clone());

        let hold_short = flight.latest_clearance(ClearanceType::HoldShort);
        if let (FlightStatus::Holding, Some(hold), true) = (status, hold_short, position.on_runway) {
            alerts.push(Alert::new(
                AlertType::Cmac,
                AlertSeverity::Critical,
                format!(
                    "{} entered runway without clearance (hold short {})",
                    flight.callsign,
                    hold.value()
                ),
                vec![flight.callsign.clone()],
                runway,
                now,
            ));
            continue;
        }

        if matches!(
            status,
            FlightStatus::PushApproved | FlightStatus::ClearanceDelivered
        ) && position.ground_speed_kt > rules.moving_speed_kt
            && !flight.has_clearance(ClearanceType::Taxi)
        {
            alerts.push(Alert::new(
                AlertType::Cmac,
                AlertSeverity::Warning,
                format!("{} moving without taxi clearance", flight.callsign),
                vec![flight.callsign.clone()],
                None,
                now,
            ));
        }

        let cleared_onto_runway = RUNWAY_ENTRY_CLEARANCES
            .iter()
            .any(|kind| flight.has_clearance(*kind));
        if position.on_runway
            && !matches!(status, FlightStatus::Lineup | FlightStatus::TakeoffCleared)
            && !cleared_onto_runway
        {
            alerts.push(Alert::new(
                AlertType::Cmac,
                AlertSeverity::Critical,
                format!(
                    "{} on runway {} without lineup clearance",
                    flight.callsign,
                    runway.as_deref().unwrap_or("?")
                ),
                vec![flight.callsign.clone()],
                runway,
                now,
            ));
        }
    }

    alerts
}
