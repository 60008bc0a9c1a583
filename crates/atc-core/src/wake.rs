//! Wake turbulence separation minima.
//!
//! Two rule sets are available: the ICAO four-category scheme (distance and
//! departure time matrices) and the six-category RECAT-EU distance matrix.
//! All matrices are indexed `[leader][follower]`, heaviest category first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::models::{FlightRecord, WakeCategory};

/// Radar separation applied when no wake minimum exists (nm).
pub const RADAR_SEPARATION_NM: f64 = 3.0;

/// Width of the window inside which lighter aircraft are moved ahead.
pub const OPTIMIZATION_WINDOW_SECS: i64 = 300;

/// Default runway interval used to measure sequence delay.
pub const BASE_INTERVAL_SECS: u32 = 90;

/// ICAO distance minima (nm).
const ICAO_DISTANCE_NM: [[f64; 4]; 4] = [
    // J     H    M    L      follower
    [0.0, 6.0, 7.0, 8.0], // J leader
    [0.0, 4.0, 5.0, 6.0], // H
    [0.0, 0.0, 0.0, 5.0], // M
    [0.0, 0.0, 0.0, 0.0], // L
];

/// ICAO departure time minima (seconds).
const ICAO_DEPARTURE_SECS: [[u32; 4]; 4] = [
    [0, 180, 180, 180],
    [0, 120, 120, 180],
    [0, 0, 0, 120],
    [0, 0, 0, 0],
];

/// RECAT-EU distance minima (nm).
const RECAT_DISTANCE_NM: [[f64; 6]; 6] = [
    // A    B    C    D    E    F
    [3.0, 4.0, 5.0, 5.0, 6.0, 8.0], // A
    [0.0, 3.0, 4.0, 4.0, 5.0, 7.0], // B
    [0.0, 0.0, 3.0, 3.0, 4.0, 6.0], // C
    [0.0, 0.0, 0.0, 0.0, 0.0, 5.0], // D
    [0.0, 0.0, 0.0, 0.0, 0.0, 4.0], // E
    [0.0, 0.0, 0.0, 0.0, 0.0, 3.0], // F
];

/// RECAT-EU wake category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecatCategory {
    /// Super heavy
    A,
    /// Upper heavy
    B,
    /// Lower heavy
    C,
    /// Upper medium
    D,
    /// Lower medium
    E,
    /// Light
    F,
}

impl RecatCategory {
    fn index(self) -> usize {
        self as usize
    }

    /// Coarse mapping from the ICAO category.
    pub fn from_wake(wake: WakeCategory) -> Self {
        match wake {
            WakeCategory::Super => RecatCategory::A,
            WakeCategory::Heavy => RecatCategory::B,
            WakeCategory::Medium => RecatCategory::D,
            WakeCategory::Light => RecatCategory::F,
        }
    }

    /// Category for a known type designator.
    pub fn for_type(icao_type: &str) -> Option<Self> {
        let icao_type = icao_type.trim().to_uppercase();
        let category = match icao_type.as_str() {
            "A388" | "A38F" => RecatCategory::A,
            "B744" | "B748" | "B77W" | "B77L" | "A333" | "A339" | "A359" | "A35K" => {
                RecatCategory::B
            }
            "B763" | "B764" | "B772" | "A306" | "A310" | "A343" | "A346" => RecatCategory::C,
            "B738" | "B739" | "B39M" | "A320" | "A321" | "A20N" | "A21N" => RecatCategory::D,
            "E190" | "E195" | "CRJ9" | "AT76" | "DH8D" => RecatCategory::E,
            _ => return None,
        };
        Some(category)
    }

    /// Type-based category, falling back to the ICAO category.
    pub fn for_flight(flight: &FlightRecord) -> Self {
        Self::for_type(&flight.aircraft_type)
            .unwrap_or_else(|| Self::from_wake(flight.wake_category))
    }
}

impl fmt::Display for RecatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which separation scheme to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparationScheme {
    #[default]
    Icao,
    RecatEu,
}

impl SeparationScheme {
    pub fn from_recat_flag(use_recat: bool) -> Self {
        if use_recat {
            SeparationScheme::RecatEu
        } else {
            SeparationScheme::Icao
        }
    }
}

/// Required spacing between a leader and a follower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredSeparation {
    pub distance_nm: f64,
    pub time_secs: u32,
    pub reason: String,
}

/// Outcome of comparing actual spacing against the requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationCheck {
    pub adequate: bool,
    pub required: RequiredSeparation,
    /// How far the distance falls short (0 when met).
    pub distance_shortfall_nm: f64,
    /// How far the time gap falls short (0 when met).
    pub time_shortfall_secs: u32,
}

pub fn icao_distance_nm(leader: WakeCategory, follower: WakeCategory) -> f64 {
    ICAO_DISTANCE_NM[leader.index()][follower.index()]
}

pub fn departure_time_secs(leader: WakeCategory, follower: WakeCategory) -> u32 {
    ICAO_DEPARTURE_SECS[leader.index()][follower.index()]
}

pub fn recat_distance_nm(leader: RecatCategory, follower: RecatCategory) -> f64 {
    RECAT_DISTANCE_NM[leader.index()][follower.index()]
}

/// Required separation between two flights.
///
/// The time requirement always comes from the ICAO departure matrix. A zero
/// distance entry is replaced by the radar separation minimum.
pub fn calculate_separation(
    leading: &FlightRecord,
    following: &FlightRecord,
    scheme: SeparationScheme,
) -> RequiredSeparation {
    let lead = leading.wake_category;
    let follow = following.wake_category;
    let time_secs = departure_time_secs(lead, follow);

    let (distance_nm, reason) = match scheme {
        SeparationScheme::Icao => (
            icao_distance_nm(lead, follow),
            format!(
                "ICAO wake: {} ({}) -> {} ({})",
                lead.label(),
                lead.code(),
                follow.label(),
                follow.code()
            ),
        ),
        SeparationScheme::RecatEu => {
            let lead_cat = RecatCategory::for_flight(leading);
            let follow_cat = RecatCategory::for_flight(following);
            (
                recat_distance_nm(lead_cat, follow_cat),
                format!("RECAT-EU: {lead_cat} -> {follow_cat}"),
            )
        }
    };

    if distance_nm <= 0.0 {
        return RequiredSeparation {
            distance_nm: RADAR_SEPARATION_NM,
            time_secs,
            reason: "Standard radar separation (no wake requirement)".to_string(),
        };
    }

    RequiredSeparation {
        distance_nm,
        time_secs,
        reason,
    }
}

/// Compare actual spacing against the requirement.
///
/// Spacing is adequate when either the distance or the time criterion is
/// met. Both shortfalls are reported regardless.
pub fn check_separation(
    leading: &FlightRecord,
    following: &FlightRecord,
    actual_distance_nm: f64,
    actual_gap_secs: u32,
    scheme: SeparationScheme,
) -> SeparationCheck {
    let required = calculate_separation(leading, following, scheme);
    let distance_ok = actual_distance_nm >= required.distance_nm;
    let time_ok = actual_gap_secs >= required.time_secs;

    SeparationCheck {
        adequate: distance_ok || time_ok,
        distance_shortfall_nm: (required.distance_nm - actual_distance_nm).max(0.0),
        time_shortfall_secs: required.time_secs.saturating_sub(actual_gap_secs),
        required,
    }
}

/// Time used to place a flight in the wake optimisation: EOBT, then TSAT,
/// then TTOT.
pub fn scheduled_time(flight: &FlightRecord) -> Option<DateTime<Utc>> {
    flight.eobt.or(flight.tsat).or(flight.ttot)
}

/// Reorder flights so lighter categories go first within each five-minute
/// window, keeping chronological order between windows.
///
/// Windows are opened by the earliest remaining flight. Flights with no
/// scheduled time form a final group.
pub fn optimize_sequence(flights: &[FlightRecord]) -> Vec<FlightRecord> {
    let mut timed: Vec<(DateTime<Utc>, &FlightRecord)> = flights
        .iter()
        .filter_map(|f| scheduled_time(f).map(|t| (t, f)))
        .collect();
    let mut untimed: Vec<&FlightRecord> = flights
        .iter()
        .filter(|f| scheduled_time(f).is_none())
        .collect();
    timed.sort_by_key(|(t, _)| *t);

    let mut ordered = Vec::with_capacity(flights.len());
    let mut window: Vec<&FlightRecord> = Vec::new();
    let mut window_start: Option<DateTime<Utc>> = None;

    for (time, flight) in timed {
        let start = *window_start.get_or_insert(time);
        if (time - start).num_seconds() > OPTIMIZATION_WINDOW_SECS {
            flush_window(&mut window, &mut ordered);
            window_start = Some(time);
        }
        window.push(flight);
    }
    flush_window(&mut window, &mut ordered);

    untimed.sort_by(|a, b| lighter_first(a, b));
    ordered.extend(untimed.into_iter().cloned());
    ordered
}

fn lighter_first(a: &FlightRecord, b: &FlightRecord) -> Ordering {
    a.wake_category
        .lightness_rank()
        .cmp(&b.wake_category.lightness_rank())
}

fn flush_window(window: &mut Vec<&FlightRecord>, ordered: &mut Vec<FlightRecord>) {
    window.sort_by(|a, b| lighter_first(a, b));
    ordered.extend(window.drain(..).cloned());
}

/// Total wake-induced delay of a sequence beyond the base runway interval.
pub fn sequence_delay_secs(sequence: &[FlightRecord], base_interval_secs: u32) -> u32 {
    sequence
        .windows(2)
        .map(|pair| {
            calculate_separation(&pair[0], &pair[1], SeparationScheme::RecatEu)
                .time_secs
                .saturating_sub(base_interval_secs)
        })
        .sum()
}
