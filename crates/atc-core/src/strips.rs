//! Flight strip generation.
//!
//! Turns a decoded flight plan, or explicit departure/arrival parameters,
//! into a [`FlightRecord`] with a fresh id and a discrete squawk.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::fpl::{FlightPlanMessage, MessageKind};
use crate::models::{FlightRecord, FlightStatus};
use crate::performance::PerformanceLookup;

/// Hijack, radio failure, emergency.
pub const RESERVED_SQUAWKS: [&str; 3] = ["7500", "7600", "7700"];

const FEET_PER_METRE: f64 = 3.28084;
const DEFAULT_DEPARTURE_CRUISE_FT: u32 = 35_000;

/// Random four-digit octal transponder code, never one of the emergency codes.
pub fn generate_squawk<R: Rng + ?Sized>(rng: &mut R) -> String {
    loop {
        let code: String = (0..4)
            .map(|_| char::from(b'0' + rng.random_range(0..8u8)))
            .collect();
        if !RESERVED_SQUAWKS.contains(&code.as_str()) {
            return code;
        }
    }
}

/// Split a callsign into airline designator and flight number.
///
/// Accepts two or three letters followed by digits and an optional
/// trailing letter, e.g. `KAL123` or `JJA1305A`.
pub fn parse_callsign(callsign: &str) -> Option<(String, String)> {
    let callsign = callsign.trim();
    let prefix_len = callsign
        .chars()
        .take_while(|c| c.is_ascii_uppercase())
        .count();
    if !(2..=3).contains(&prefix_len) {
        return None;
    }

    let (airline, number) = callsign.split_at(prefix_len);
    let digits = number.chars().take_while(|c| c.is_ascii_digit()).count();
    let suffix = &number[digits..];
    let suffix_ok = suffix.is_empty()
        || (suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_uppercase()));
    if digits == 0 || !suffix_ok {
        return None;
    }
    Some((airline.to_string(), number.to_string()))
}

fn parse_hhmm(value: &str) -> Option<(u32, u32)> {
    let value = value.trim();
    if value.len() != 4 || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours = value[..2].parse().ok()?;
    let minutes = value[2..].parse().ok()?;
    Some((hours, minutes))
}

/// `HHMM` UTC on the reference date.
pub fn parse_zulu_time(hhmm: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (hours, minutes) = parse_hhmm(hhmm)?;
    let time = NaiveTime::from_hms_opt(hours, minutes, 0)?;
    Some(reference.date_naive().and_time(time).and_utc())
}

/// `HHMM` elapsed time (item 16 EET).
pub fn parse_elapsed(hhmm: &str) -> Option<Duration> {
    let (hours, minutes) = parse_hhmm(hhmm)?;
    (minutes < 60).then(|| Duration::minutes(i64::from(hours * 60 + minutes)))
}

/// Item 15 cruising level in feet.
///
/// `F`/`A` are hundreds of feet, `S`/`M` tens of metres, `VFR` is 0.
pub fn decode_cruise_level(level: &str) -> u32 {
    let level = level.trim().to_ascii_uppercase();
    if level.is_empty() || level == "VFR" {
        return 0;
    }
    let (unit, digits) = level.split_at(1);
    let Ok(value) = digits.parse::<u32>() else {
        return 0;
    };
    match unit {
        "F" | "A" => value * 100,
        "S" | "M" => (f64::from(value) * 10.0 * FEET_PER_METRE).round() as u32,
        _ => 0,
    }
}

/// Assignments that do not come from the flight plan itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripOptions {
    pub runway: Option<String>,
    pub gate: Option<String>,
    pub sid: Option<String>,
    pub star: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureParams {
    pub callsign: String,
    pub aircraft_type: String,
    pub departure: String,
    pub destination: String,
    pub eobt: DateTime<Utc>,
    #[serde(default)]
    pub runway: Option<String>,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalParams {
    pub callsign: String,
    pub aircraft_type: String,
    pub departure: String,
    pub destination: String,
    pub eta: DateTime<Utc>,
    #[serde(default)]
    pub runway: Option<String>,
    #[serde(default)]
    pub gate: Option<String>,
    #[serde(default)]
    pub star: Option<String>,
}

/// Initial status for a strip created from a message of this kind.
pub fn initial_status(kind: MessageKind) -> FlightStatus {
    match kind {
        MessageKind::Arr => FlightStatus::InitialApproach,
        MessageKind::Dep => FlightStatus::Departed,
        MessageKind::Fpl | MessageKind::Chg | MessageKind::Cnl => FlightStatus::Filed,
    }
}

/// Strip factory. Owns the squawk RNG so tests can seed it.
#[derive(Debug, Clone)]
pub struct StripGenerator {
    rng: StdRng,
}

impl Default for StripGenerator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

impl StripGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn squawk(&mut self) -> String {
        generate_squawk(&mut self.rng)
    }

    /// Build a record from a decoded message.
    ///
    /// EOBT is read on the date of `now`. The ETA is EOBT plus EET for filed
    /// plans, and the reported arrival time for ARR messages.
    pub fn from_flight_plan(
        &mut self,
        plan: &FlightPlanMessage,
        options: StripOptions,
        now: DateTime<Utc>,
    ) -> FlightRecord {
        let mut record = FlightRecord::new(
            plan.callsign.clone(),
            plan.aircraft_type.clone(),
            initial_status(plan.kind),
            now,
        );
        record.wake_category = plan.wake();
        record.flight_rules = plan.rules();
        record.flight_type = plan.flight_kind();
        record.squawk = self.squawk();
        record.departure = plan.departure.clone();
        record.destination = plan.destination.clone();
        record.cruise_altitude_ft = decode_cruise_level(&plan.cruise_level);
        record.route = plan.route.clone();
        record.eobt = parse_zulu_time(&plan.eobt, now);
        record.eta = match plan.kind {
            MessageKind::Arr => parse_zulu_time(&plan.eet, now),
            _ => record
                .eobt
                .zip(parse_elapsed(&plan.eet))
                .map(|(eobt, eet)| eobt + eet),
        };
        record.runway = options.runway;
        record.gate = options.gate;
        record.sid = options.sid;
        record.star = options.star;
        record
    }

    pub fn create_departure(
        &mut self,
        params: DepartureParams,
        performance: &dyn PerformanceLookup,
        now: DateTime<Utc>,
    ) -> FlightRecord {
        let mut record = FlightRecord::new(
            params.callsign,
            params.aircraft_type,
            FlightStatus::Filed,
            now,
        );
        record.wake_category = performance.wake_category(&record.aircraft_type);
        record.squawk = self.squawk();
        record.departure = params.departure;
        record.destination = params.destination;
        record.cruise_altitude_ft = DEFAULT_DEPARTURE_CRUISE_FT;
        record.route = "DCT".to_string();
        record.eobt = Some(params.eobt);
        record.runway = params.runway;
        record.gate = params.gate;
        record.sid = params.sid;
        record
    }

    pub fn create_arrival(
        &mut self,
        params: ArrivalParams,
        performance: &dyn PerformanceLookup,
        now: DateTime<Utc>,
    ) -> FlightRecord {
        let mut record = FlightRecord::new(
            params.callsign,
            params.aircraft_type,
            FlightStatus::InitialApproach,
            now,
        );
        record.wake_category = performance.wake_category(&record.aircraft_type);
        record.squawk = self.squawk();
        record.departure = params.departure;
        record.destination = params.destination;
        record.route = "DCT".to_string();
        record.eta = Some(params.eta);
        record.runway = params.runway;
        record.gate = params.gate;
        record.star = params.star;
        record
    }
}
