//! Conflicting ATC clearance detection (CATC).

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use super::{Alert, AlertSeverity, AlertType};
use crate::airport::Runway;
use crate::models::{Clearance, ClearanceType, FlightRecord, FlightStatus};
use crate::rules::SafetyNetRules;

/// Runway clearances issued inside the window, by flight.
#[derive(Default)]
struct RunwayClearances<'a> {
    lineup: Vec<&'a FlightRecord>,
    takeoff: Vec<&'a FlightRecord>,
    landing: Vec<&'a FlightRecord>,
}

fn push_unique<'a>(list: &mut Vec<&'a FlightRecord>, flight: &'a FlightRecord) {
    if !list.iter().any(|f| f.id == flight.id) {
        list.push(flight);
    }
}

fn callsigns(flights: &[&FlightRecord]) -> Vec<String> {
    flights.iter().map(|f| f.callsign.clone()).collect()
}

fn is_recent(clearance: &Clearance, window: Duration, now: DateTime<Utc>) -> bool {
    now - clearance.issued_at() <= window && !clearance.is_expired(now)
}

/// Whether a taxi route names the runway, as `33L` or `RWY33L`.
pub fn taxi_route_crosses(route: &str, runway_id: &str) -> bool {
    let prefixed = format!("RWY{runway_id}");
    route
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .any(|token| token.eq_ignore_ascii_case(runway_id) || token.eq_ignore_ascii_case(&prefixed))
}

pub fn check(
    rules: &SafetyNetRules,
    flights: &[FlightRecord],
    runways: &[Runway],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let window = Duration::seconds(rules.catc_window_secs);
    let mut alerts = Vec::new();

    let mut by_runway: BTreeMap<String, RunwayClearances> = BTreeMap::new();
    for flight in flights {
        let Some(runway) = flight.runway.as_deref() else {
            continue;
        };
        for clearance in flight.clearances() {
            if !is_recent(clearance, window, now) {
                continue;
            }
            let entry = by_runway.entry(runway.to_uppercase()).or_default();
            match clearance.clearance_type() {
                ClearanceType::Lineup => push_unique(&mut entry.lineup, flight),
                ClearanceType::Takeoff => push_unique(&mut entry.takeoff, flight),
                ClearanceType::Landing => push_unique(&mut entry.landing, flight),
                _ => {}
            }
        }
    }

    for (runway, group) in &by_runway {
        if group.lineup.len() > 1 {
            alerts.push(Alert::new(
                AlertType::Catc,
                AlertSeverity::Warning,
                format!(
                    "Multiple lineup clearances for runway {runway}: {}",
                    callsigns(&group.lineup).join(", ")
                ),
                callsigns(&group.lineup),
                Some(runway.clone()),
                now,
            ));
        }

        if group.takeoff.len() > 1 {
            alerts.push(Alert::new(
                AlertType::Catc,
                AlertSeverity::Critical,
                format!(
                    "Multiple takeoff clearances for runway {runway}: {}",
                    callsigns(&group.takeoff).join(", ")
                ),
                callsigns(&group.takeoff),
                Some(runway.clone()),
                now,
            ));
        }

        let conflicting = group.takeoff.iter().find_map(|takeoff| {
            group
                .landing
                .iter()
                .find(|landing| landing.id != takeoff.id)
                .map(|landing| (*takeoff, *landing))
        });
        if let Some((takeoff, landing)) = conflicting {
            alerts.push(Alert::new(
                AlertType::Catc,
                AlertSeverity::Critical,
                format!(
                    "Conflicting clearances on runway {runway}: {} (takeoff) vs {} (landing)",
                    takeoff.callsign, landing.callsign
                ),
                vec![takeoff.callsign.clone(), landing.callsign.clone()],
                Some(runway.clone()),
                now,
            ));
        }
    }

    for flight in flights.iter().filter(|f| f.status() == FlightStatus::Taxiing) {
        let Some(taxi) = flight.latest_clearance(ClearanceType::Taxi) else {
            continue;
        };

        for runway in runways.iter().filter(|r| !r.is_closed()) {
            if !taxi_route_crosses(taxi.value(), &runway.id) {
                continue;
            }
            let active_op = flights.iter().find(|other| {
                other.id != flight.id
                    && other
                        .runway
                        .as_deref()
                        .is_some_and(|r| r.eq_ignore_ascii_case(&runway.id))
                    && other.clearances().iter().any(|c| {
                        matches!(
                            c.clearance_type(),
                            ClearanceType::Takeoff | ClearanceType::Landing
                        ) && is_recent(c, window, now)
                    })
            });
            if let Some(other) = active_op {
                alerts.push(Alert::new(
                    AlertType::Catc,
                    AlertSeverity::Warning,
                    format!(
                        "{} taxi route crosses runway {} ({} has active clearance)",
                        flight.callsign, runway.id, other.callsign
                    ),
                    vec![flight.callsign.clone(), other.callsign.clone()],
                    Some(runway.id.clone()),
                    now,
                ));
            }
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airport::{AirportDirectory, AirportLookup};

    fn cleared(callsign: &str, runway: &str, kind: ClearanceType, at: DateTime<Utc>) -> FlightRecord {
        let mut flight = FlightRecord::new(callsign, "A320", FlightStatus::Filed, at);
        flight.runway = Some(runway.to_string());
        flight.issue_clearance(Clearance::new(kind, runway, "TWR", at));
        flight
    }

    #[test]
    fn test_taxi_route_crosses() {
        assert!(taxi_route_crosses("A B RWY33L C", "33L"));
        assert!(taxi_route_crosses("via K, cross 33L, hold N1", "33L"));
        assert!(!taxi_route_crosses("A B 133L", "33L"));
        assert!(!taxi_route_crosses("A B C", "33L"));
    }

    #[test]
    fn two_lineups_warn_and_two_takeoffs_are_critical() {
        let now = Utc::now();
        let flights = [
            cleared("KAL1", "33R", ClearanceType::Lineup, now),
            cleared("KAL2", "33R", ClearanceType::Lineup, now),
            cleared("KAL3", "33L", ClearanceType::Takeoff, now),
            cleared("KAL4", "33L", ClearanceType::Takeoff, now),
        ];
        let alerts = check(&SafetyNetRules::default(), &flights, &[], now);
        assert_eq!(alerts.len(), 2);
        let lineup = alerts.iter().find(|a| a.runway.as_deref() == Some("33R")).unwrap();
        assert_eq!(lineup.severity, AlertSeverity::Warning);
        let takeoff = alerts.iter().find(|a| a.runway.as_deref() == Some("33L")).unwrap();
        assert_eq!(takeoff.severity, AlertSeverity::Critical);
    }

    #[test]
    fn landing_with_takeoff_is_critical() {
        let now = Utc::now();
        let flights = [
            cleared("KAL1", "33L", ClearanceType::Takeoff, now),
            cleared("AAR2", "33L", ClearanceType::Landing, now),
        ];
        let alerts = check(&SafetyNetRules::default(), &flights, &[], now);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("KAL1 (takeoff) vs AAR2 (landing)"));
    }

    #[test]
    fn stale_and_repeated_clearances_are_ignored() {
        let now = Utc::now();
        let old = now - Duration::seconds(300);
        let mut repeat = cleared("KAL1", "33R", ClearanceType::Lineup, now);
        repeat.issue_clearance(Clearance::new(ClearanceType::Lineup, "33R", "TWR", now));
        let flights = [repeat, cleared("KAL2", "33R", ClearanceType::Lineup, old)];
        assert!(check(&SafetyNetRules::default(), &flights, &[], now).is_empty());
    }

    #[test]
    fn taxi_route_across_active_runway() {
        let now = Utc::now();
        let runways = AirportDirectory::builtin().layout("RKSI").runways;
        let mut taxiing = FlightRecord::new("JJA7", "B738", FlightStatus::Filed, now);
        taxiing.transition_to(FlightStatus::Taxiing, now).unwrap();
        taxiing.issue_clearance(Clearance::new(ClearanceType::Taxi, "A C RWY33L N2", "GND", now));
        let takeoff = cleared("KAL1", "33L", ClearanceType::Takeoff, now);

        let alerts = check(&SafetyNetRules::default(), &[taxiing, takeoff], &runways, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[0].runway.as_deref(), Some("33L"));
    }
}
