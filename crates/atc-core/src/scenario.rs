//! Declarative traffic scenarios.
//!
//! A scenario lists departures and arrivals with a scheduled time given
//! either as `+MM` (minutes after scenario start) or `HHMM` (UTC on the start
//! date). Loading turns every entry into a strip; flights scheduled at or
//! before the start are active at once, the rest are released by
//! [`ScenarioPlayer::release_due`] as simulated time reaches them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::ScenarioError;
use crate::models::{Annotation, FlightRecord};
use crate::performance::PerformanceLookup;
use crate::strips::{parse_zulu_time, ArrivalParams, DepartureParams, StripGenerator};

/// Placeholder aerodrome for the unknown end of a scenario flight.
pub const UNKNOWN_AERODROME: &str = "ZZZZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioFlightKind {
    Departure,
    Arrival,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFlight {
    pub callsign: String,
    #[serde(rename = "type")]
    pub kind: ScenarioFlightKind,
    pub aircraft_type: String,
    pub scheduled_time: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    pub runway: String,
    pub gate: String,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficScenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub airport: String,
    pub duration_minutes: u32,
    pub flights: Vec<ScenarioFlight>,
}

impl TrafficScenario {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn departures(&self) -> impl Iterator<Item = &ScenarioFlight> {
        self.flights
            .iter()
            .filter(|f| f.kind == ScenarioFlightKind::Departure)
    }

    pub fn arrivals(&self) -> impl Iterator<Item = &ScenarioFlight> {
        self.flights
            .iter()
            .filter(|f| f.kind == ScenarioFlightKind::Arrival)
    }
}

/// Resolve `+MM` or `HHMM` against the scenario start.
pub fn parse_scheduled_time(
    callsign: &str,
    value: &str,
    start: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScenarioError> {
    let invalid = || ScenarioError::InvalidScheduledTime {
        callsign: callsign.to_string(),
        value: value.to_string(),
    };
    let value = value.trim();

    if let Some(minutes) = value.strip_prefix('+') {
        let minutes: i64 = minutes.parse().map_err(|_| invalid())?;
        return Ok(start + Duration::minutes(minutes));
    }
    parse_zulu_time(value, start).ok_or_else(invalid)
}

/// Build one strip per scenario entry.
pub fn build_flights(
    scenario: &TrafficScenario,
    generator: &mut StripGenerator,
    performance: &dyn PerformanceLookup,
    start: DateTime<Utc>,
) -> Result<Vec<FlightRecord>, ScenarioError> {
    let mut flights = Vec::with_capacity(scenario.flights.len());

    for entry in &scenario.flights {
        let scheduled = parse_scheduled_time(&entry.callsign, &entry.scheduled_time, start)?;
        let runway = Some(entry.runway.clone()).filter(|r| !r.is_empty());
        let gate = Some(entry.gate.clone()).filter(|g| !g.is_empty());

        let mut record = match entry.kind {
            ScenarioFlightKind::Departure => generator.create_departure(
                DepartureParams {
                    callsign: entry.callsign.clone(),
                    aircraft_type: entry.aircraft_type.clone(),
                    departure: entry.origin.clone().unwrap_or_else(|| scenario.airport.clone()),
                    destination: entry
                        .destination
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_AERODROME.to_string()),
                    eobt: scheduled,
                    runway,
                    gate,
                    sid: None,
                },
                performance,
                start,
            ),
            ScenarioFlightKind::Arrival => generator.create_arrival(
                ArrivalParams {
                    callsign: entry.callsign.clone(),
                    aircraft_type: entry.aircraft_type.clone(),
                    departure: entry
                        .origin
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_AERODROME.to_string()),
                    destination: entry
                        .destination
                        .clone()
                        .unwrap_or_else(|| scenario.airport.clone()),
                    eta: scheduled,
                    runway,
                    gate,
                    star: None,
                },
                performance,
                start,
            ),
        };

        if let Some(route) = entry.route.as_ref().filter(|r| !r.is_empty()) {
            record.route = route.clone();
        }
        if let Some(remarks) = entry.remarks.as_ref().filter(|r| !r.is_empty()) {
            record.add_annotation(Annotation::new(remarks.clone(), "scenario", start));
        }
        flights.push(record);
    }

    Ok(flights)
}

/// Holds scenario flights until their scheduled time.
#[derive(Debug, Clone, Default)]
pub struct ScenarioPlayer {
    pending: VecDeque<(DateTime<Utc>, FlightRecord)>,
}

impl ScenarioPlayer {
    /// Load a scenario. Returns the player and the flights active at `start`.
    pub fn load(
        scenario: &TrafficScenario,
        generator: &mut StripGenerator,
        performance: &dyn PerformanceLookup,
        start: DateTime<Utc>,
    ) -> Result<(Self, Vec<FlightRecord>), ScenarioError> {
        let mut immediate = Vec::new();
        let mut pending = Vec::new();

        for flight in build_flights(scenario, generator, performance, start)? {
            match flight.eobt.or(flight.eta) {
                Some(at) if at > start => pending.push((at, flight)),
                _ => immediate.push(flight),
            }
        }
        pending.sort_by_key(|(at, _)| *at);

        tracing::info!(
            "Loaded scenario {} ({}): {} immediate, {} pending",
            scenario.id,
            scenario.name,
            immediate.len(),
            pending.len()
        );

        Ok((
            Self {
                pending: pending.into(),
            },
            immediate,
        ))
    }

    /// Flights whose scheduled time has been reached.
    pub fn release_due(&mut self, now: DateTime<Utc>) -> Vec<FlightRecord> {
        let mut released = Vec::new();
        while self.pending.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, flight)) = self.pending.pop_front() {
                released.push(flight);
            }
        }
        released
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_release_at(&self) -> Option<DateTime<Utc>> {
        self.pending.front().map(|(at, _)| *at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightStatus;
    use crate::performance::PerformanceTable;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn scenario() -> TrafficScenario {
        let json = serde_json::json!({
            "id": "test",
            "name": "Test morning",
            "airport": "RKSI",
            "duration_minutes": 60,
            "flights": [
                {"callsign": "KAL101", "type": "DEPARTURE", "aircraft_type": "B77W",
                 "scheduled_time": "+0", "runway": "33R", "gate": "105", "remarks": "VIP"},
                {"callsign": "AAR202", "type": "ARRIVAL", "aircraft_type": "A321",
                 "scheduled_time": "+20", "runway": "33L", "gate": "231", "origin": "RJTT"},
                {"callsign": "JJA303", "type": "DEPARTURE", "aircraft_type": "B738",
                 "scheduled_time": "0910", "runway": "33R", "gate": "",
                 "destination": "RKPC", "route": "BOPTA Y711"}
            ]
        });
        TrafficScenario::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn scheduled_time_formats() {
        assert_eq!(
            parse_scheduled_time("X", "+15", start()).unwrap(),
            start() + Duration::minutes(15)
        );
        assert_eq!(
            parse_scheduled_time("X", "0830", start()).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 30, 0).unwrap()
        );
        let err = parse_scheduled_time("KAL1", "soon", start()).unwrap_err();
        assert_eq!(
            err,
            ScenarioError::InvalidScheduledTime {
                callsign: "KAL1".into(),
                value: "soon".into()
            }
        );
        assert!(parse_scheduled_time("X", "+ab", start()).is_err());
    }

    #[test]
    fn builds_strips_with_defaults() {
        let mut generator = StripGenerator::new(5);
        let flights =
            build_flights(&scenario(), &mut generator, &PerformanceTable::builtin(), start()).unwrap();
        assert_eq!(flights.len(), 3);
        assert_eq!(scenario().departures().count(), 2);
        assert_eq!(scenario().arrivals().count(), 1);

        let kal = &flights[0];
        assert_eq!(kal.status(), FlightStatus::Filed);
        assert_eq!((kal.departure.as_str(), kal.destination.as_str()), ("RKSI", "ZZZZ"));
        assert_eq!(kal.annotations.len(), 1);
        assert_eq!(kal.annotations[0].content, "VIP");
        assert_eq!(kal.annotations[0].created_by, "scenario");

        let aar = &flights[1];
        assert_eq!(aar.status(), FlightStatus::InitialApproach);
        assert_eq!((aar.departure.as_str(), aar.destination.as_str()), ("RJTT", "RKSI"));
        assert_eq!(aar.eta, Some(start() + Duration::minutes(20)));

        let jja = &flights[2];
        assert_eq!(jja.gate, None);
        assert_eq!(jja.route, "BOPTA Y711");
        assert_eq!(jja.destination, "RKPC");
    }

    #[test]
    fn player_releases_pending_flights_in_order() {
        let mut generator = StripGenerator::new(5);
        let (mut player, immediate) = ScenarioPlayer::load(
            &scenario(),
            &mut generator,
            &PerformanceTable::builtin(),
            start(),
        )
        .unwrap();
        assert_eq!(immediate.len(), 1);
        assert_eq!(immediate[0].callsign, "KAL101");
        assert_eq!(player.pending_count(), 2);
        assert_eq!(player.next_release_at(), Some(start() + Duration::minutes(10)));

        assert!(player.release_due(start() + Duration::minutes(5)).is_empty());
        let released = player.release_due(start() + Duration::minutes(10));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].callsign, "JJA303");
        let released = player.release_due(start() + Duration::hours(1));
        assert_eq!(released[0].callsign, "AAR202");
        assert_eq!(player.pending_count(), 0);
    }
}
