//! Pre-defined RKSI traffic scenarios.

use atc_core::scenario::{ScenarioFlight, ScenarioFlightKind};
use atc_core::TrafficScenario;

fn departure(callsign: &str, aircraft: &str, at: &str, gate: &str, dest: &str) -> ScenarioFlight {
    ScenarioFlight {
        callsign: callsign.to_string(),
        kind: ScenarioFlightKind::Departure,
        aircraft_type: aircraft.to_string(),
        scheduled_time: at.to_string(),
        origin: None,
        destination: Some(dest.to_string()),
        runway: "33R".to_string(),
        gate: gate.to_string(),
        route: None,
        remarks: None,
    }
}

fn arrival(callsign: &str, aircraft: &str, at: &str, gate: &str, origin: &str) -> ScenarioFlight {
    ScenarioFlight {
        callsign: callsign.to_string(),
        kind: ScenarioFlightKind::Arrival,
        aircraft_type: aircraft.to_string(),
        scheduled_time: at.to_string(),
        origin: Some(origin.to_string()),
        destination: None,
        runway: "33L".to_string(),
        gate: gate.to_string(),
        route: None,
        remarks: None,
    }
}

/// Morning bank: a departure push on 33R with arrivals feeding 33L.
pub fn create_morning_bank() -> TrafficScenario {
    let mut heavy = arrival("KAL018", "B77W", "+6", "250", "KLAX");
    heavy.remarks = Some("HEAVY, request gate 250".to_string());

    TrafficScenario {
        id: "morning-bank".to_string(),
        name: "Morning bank".to_string(),
        description: Some("Departure push with mixed-wake arrivals".to_string()),
        airport: "RKSI".to_string(),
        duration_minutes: 45,
        flights: vec![
            departure("KAL101", "B738", "+0", "101", "RJTT"),
            departure("AAR301", "A321", "+2", "115", "RKPC"),
            departure("JJA1201", "B738", "+4", "120", "RJBB"),
            departure("KAL081", "B748", "+5", "230", "KJFK"),
            arrival("AAR702", "A333", "+3", "231", "VHHH"),
            heavy,
            arrival("TWB604", "B738", "+8", "122", "RKPK"),
        ],
    }
}

/// Arrival rush on 33L, several flights inside the same few minutes.
pub fn create_arrival_rush() -> TrafficScenario {
    TrafficScenario {
        id: "arrival-rush".to_string(),
        name: "Arrival rush".to_string(),
        description: Some("Closely spaced arrivals that need delay absorption".to_string()),
        airport: "RKSI".to_string(),
        duration_minutes: 30,
        flights: vec![
            arrival("KAL902", "A388", "+1", "251", "EGLL"),
            arrival("AAR112", "A321", "+1", "110", "ZSPD"),
            arrival("JNA214", "B738", "+2", "118", "RJFF"),
            arrival("KAL704", "B789", "+2", "240", "WSSS"),
            arrival("ESR322", "B738", "+3", "121", "RPLL"),
        ],
    }
}

pub fn builtin_scenario_ids() -> &'static [&'static str] {
    &["morning-bank", "arrival-rush"]
}

pub fn builtin_scenario(id: &str) -> Option<TrafficScenario> {
    match id {
        "morning-bank" => Some(create_morning_bank()),
        "arrival-rush" => Some(create_arrival_rush()),
        _ => None,
    }
}
