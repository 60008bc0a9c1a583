//! Runway incursion monitoring (RIMCAS).

use chrono::{DateTime, Utc};

use super::{Alert, AlertSeverity, AlertType, SurfacePosition};
use crate::airport::Runway;
use crate::models::{FlightRecord, FlightStatus};
use crate::rules::SafetyNetRules;
use crate::spatial::distance_to_segment_nm;

fn occupies(position: &SurfacePosition, runway: &Runway) -> bool {
    position
        .runway
        .as_deref()
        .is_some_and(|r| r.eq_ignore_ascii_case(&runway.id))
}

fn assigned_to(flight: &FlightRecord, runway: &Runway) -> bool {
    flight
        .runway
        .as_deref()
        .is_some_and(|r| r.eq_ignore_ascii_case(&runway.id))
}

/// Distance from the runway centreline, threshold to threshold.
pub fn distance_to_runway_nm(position: &SurfacePosition, runway: &Runway) -> f64 {
    distance_to_segment_nm(position.position, runway.threshold, runway.opposite_threshold)
}

/// Evaluate every open runway.
pub fn check(
    rules: &SafetyNetRules,
    flights: &[FlightRecord],
    positions: &[SurfacePosition],
    runways: &[Runway],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for runway in runways.iter().filter(|r| !r.is_closed()) {
        let occupants: Vec<&SurfacePosition> =
            positions.iter().filter(|p| occupies(p, runway)).collect();
        let occupant_callsigns: Vec<String> =
            occupants.iter().map(|p| p.callsign.clone()).collect();

        if occupants.len() > 1 {
            alerts.push(Alert::new(
                AlertType::Rimcas,
                AlertSeverity::Critical,
                format!(
                    "Multiple aircraft on runway {}: {}",
                    runway.id,
                    occupant_callsigns.join(", ")
                ),
                occupant_callsigns.clone(),
                Some(runway.id.clone()),
                now,
            ));
        }

        if let Some(first) = occupants.first() {
            for near in positions.iter().filter(|p| !occupies(p, runway)) {
                if near.ground_speed_kt <= rules.moving_speed_kt {
                    continue;
                }
                let distance = distance_to_runway_nm(near, runway);
                if distance >= rules.rimcas_warning_nm {
                    continue;
                }
                let severity = if distance < rules.rimcas_critical_nm {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                };
                let mut involved = vec![near.callsign.clone()];
                involved.extend(occupant_callsigns.iter().cloned());
                alerts.push(Alert::new(
                    AlertType::Rimcas,
                    severity,
                    format!(
                        "{} approaching occupied runway {} ({} on runway)",
                        near.callsign, runway.id, first.callsign
                    ),
                    involved,
                    Some(runway.id.clone()),
                    now,
                ));
            }
        }

        let departing = occupants.iter().find(|p| {
            flights.iter().any(|f| {
                f.id == p.flight_id
                    && matches!(f.status(), FlightStatus::Lineup | FlightStatus::TakeoffCleared)
            })
        });
        let arriving = flights
            .iter()
            .find(|f| assigned_to(f, runway) && f.status() == FlightStatus::FinalApproach);

        if let (Some(departure), Some(arrival)) = (departing, arriving) {
            alerts.push(Alert::new(
                AlertType::Rimcas,
                AlertSeverity::Critical,
                format!(
                    "Runway {} conflict: {} (departure) vs {} (arrival)",
                    runway.id, departure.callsign, arrival.callsign
                ),
                vec![departure.callsign.clone(), arrival.callsign.clone()],
                Some(runway.id.clone()),
                now,
            ));
        }
    }

    alerts
}
