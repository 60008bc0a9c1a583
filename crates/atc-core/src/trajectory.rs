//! Phase-based 4D trajectory prediction.
//!
//! A flight is modelled as a fixed sequence of phases whose durations come
//! from the aircraft performance table:
//!
//! ```text
//! ground -> takeoff -> initial climb (1500 ft) -> climb -> cruise -> descent -> approach -> landing
//! ```
//!
//! The climb distance covers the initial climb leg plus the climb to cruise
//! altitude. The descent distance covers the descent to 3000 ft, the approach
//! leg, and the final 5 nm. Cruise takes whatever route distance remains and
//! disappears on short routes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FlightRecord, Position};
use crate::performance::{AircraftPerformance, PerformanceLookup};
use crate::spatial::{haversine_nm, path_length_nm, position_along_path, FEET_PER_NM};

const TAXI_OUT_MINUTES: f64 = 5.0;
const INITIAL_CLIMB_MINUTES: f64 = 2.0;
const INITIAL_CLIMB_NM: f64 = 3.0;
const INITIAL_CLIMB_ALT_FT: f64 = 1500.0;
const BOTTOM_OF_DESCENT_FT: f64 = 3000.0;
const APPROACH_MINUTES: f64 = 5.0;
const APPROACH_FIX_NM: f64 = 5.0;
const APPROACH_FIX_ALT_FT: f64 = 1500.0;
const LANDING_MINUTES: f64 = 3.0;
const DEFAULT_CRUISE_ALT_FT: f64 = 35_000.0;
/// Below this altitude level flight uses approach speed.
const LOW_LEVEL_FT: f64 = 10_000.0;

pub const TAXI_SPEED_KT: f64 = 15.0;
/// Taxi routes are longer than the straight line between gate and runway.
pub const TAXI_ROUTING_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightPhase {
    Ground,
    Takeoff,
    InitialClimb,
    Climb,
    Cruise,
    Descent,
    Approach,
    Landing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub position: Position,
    pub altitude_ft: f64,
    pub speed_kt: f64,
    pub time: DateTime<Utc>,
    pub phase: FlightPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPrediction {
    pub points: Vec<TrajectoryPoint>,
    pub estimated_duration_min: f64,
    pub total_distance_nm: f64,
}

/// Descent planning figures for one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescentProfile {
    /// Distance from the threshold at which a nominal descent starts.
    pub top_of_descent_nm: f64,
    /// Remaining distance before top of descent; negative once past it.
    pub distance_to_top_of_descent_nm: f64,
    pub descent_angle_deg: f64,
    /// Vertical speed for the nominal angle at descent speed.
    pub nominal_rate_fpm: f64,
    /// Vertical speed needed to lose the altitude over the given distance.
    pub required_rate_fpm: f64,
    pub required_angle_deg: f64,
}

fn minutes(value: f64) -> Duration {
    Duration::milliseconds((value * 60_000.0).round() as i64)
}

pub struct TrajectoryPredictor<'a> {
    performance: &'a dyn PerformanceLookup,
}

impl<'a> TrajectoryPredictor<'a> {
    pub fn new(performance: &'a dyn PerformanceLookup) -> Self {
        Self { performance }
    }

    /// Predict the full gate-to-gate profile.
    ///
    /// # Arguments
    /// * `flight` - Flight record (type, cruise altitude, EOBT)
    /// * `departure`, `arrival` - Aerodrome reference positions
    /// * `waypoints` - Intermediate route points, may be empty
    /// * `now` - Start time when the flight has no EOBT
    pub fn predict(
        &self,
        flight: &FlightRecord,
        departure: Position,
        arrival: Position,
        waypoints: &[Position],
        now: DateTime<Utc>,
    ) -> TrajectoryPrediction {
        let perf = self.performance.lookup(&flight.aircraft_type);
        let cruise_alt = cruise_altitude(flight, &perf);

        let mut path = Vec::with_capacity(waypoints.len() + 2);
        path.push(departure);
        path.extend_from_slice(waypoints);
        path.push(arrival);
        let total_nm = path_length_nm(&path);
        let at = |distance: f64| position_along_path(&path, distance).unwrap_or(departure);

        let climb_min = (cruise_alt - INITIAL_CLIMB_ALT_FT).max(0.0) / perf.climb_rate_initial_fpm;
        let climb_nm = climb_min / 60.0 * perf.speeds.climb;
        let descent_min = (cruise_alt - BOTTOM_OF_DESCENT_FT).max(0.0) / perf.descent_rate_fpm;
        let descent_nm = descent_min / 60.0 * perf.speeds.descent;
        let approach_leg_nm = APPROACH_MINUTES / 60.0 * perf.speeds.approach;

        let climb_total_nm = INITIAL_CLIMB_NM + climb_nm;
        let descent_total_nm = descent_nm + approach_leg_nm + APPROACH_FIX_NM;
        let cruise_nm = (total_nm - climb_total_nm - descent_total_nm).max(0.0);

        let start = flight.eobt.unwrap_or(now);
        let mut time = start;
        let mut points = Vec::with_capacity(8);
        let mut push = |phase, distance: f64, altitude_ft, speed_kt, time| {
            points.push(TrajectoryPoint {
                position: at(distance),
                altitude_ft,
                speed_kt,
                time,
                phase,
            });
        };

        push(FlightPhase::Ground, 0.0, 0.0, 0.0, time);

        time += minutes(TAXI_OUT_MINUTES);
        push(FlightPhase::Takeoff, 0.0, 0.0, perf.speeds.v2, time);

        time += minutes(INITIAL_CLIMB_MINUTES);
        let mut flown = INITIAL_CLIMB_NM;
        push(FlightPhase::InitialClimb, flown, INITIAL_CLIMB_ALT_FT, perf.speeds.climb, time);

        time += minutes(climb_min);
        flown += climb_nm;
        push(FlightPhase::Climb, flown, cruise_alt, perf.speeds.cruise, time);

        if cruise_nm > 0.0 {
            time += minutes(cruise_nm / perf.speeds.cruise * 60.0);
            flown += cruise_nm;
            push(FlightPhase::Cruise, flown, cruise_alt, perf.speeds.cruise, time);
        }

        time += minutes(descent_min);
        flown += descent_nm;
        push(FlightPhase::Descent, flown, BOTTOM_OF_DESCENT_FT, perf.speeds.approach, time);

        time += minutes(APPROACH_MINUTES);
        push(
            FlightPhase::Approach,
            (total_nm - APPROACH_FIX_NM).max(0.0),
            APPROACH_FIX_ALT_FT,
            perf.speeds.approach,
            time,
        );

        time += minutes(LANDING_MINUTES);
        push(FlightPhase::Landing, total_nm, 0.0, perf.speeds.landing, time);

        TrajectoryPrediction {
            points,
            estimated_duration_min: (time - start).num_milliseconds() as f64 / 60_000.0,
            total_distance_nm: total_nm,
        }
    }

    /// Time over `fix` from the current position.
    ///
    /// Climbing uses climb speed and initial climb rate, descending uses
    /// descent speed and rate, level flight uses cruise speed above
    /// 10,000 ft and approach speed below. The slower of the horizontal and
    /// vertical legs governs.
    pub fn predict_time_at_fix(
        &self,
        flight: &FlightRecord,
        current: Position,
        fix: Position,
        current_alt_ft: f64,
        target_alt_ft: f64,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let perf = self.performance.lookup(&flight.aircraft_type);
        let distance_nm = haversine_nm(current, fix);
        let alt_change = target_alt_ft - current_alt_ft;

        let (speed_kt, vertical_min) = if alt_change > 0.0 {
            (perf.speeds.climb, alt_change / perf.climb_rate_initial_fpm)
        } else if alt_change < 0.0 {
            (perf.speeds.descent, -alt_change / perf.descent_rate_fpm)
        } else if current_alt_ft > LOW_LEVEL_FT {
            (perf.speeds.cruise, 0.0)
        } else {
            (perf.speeds.approach, 0.0)
        };

        let flight_min = distance_nm / speed_kt * 60.0;
        now + minutes(flight_min.max(vertical_min))
    }

    /// Top of descent and descent rates for reaching `target_alt_ft` at the
    /// threshold.
    pub fn descent_profile(
        &self,
        flight: &FlightRecord,
        current_alt_ft: f64,
        target_alt_ft: f64,
        distance_to_threshold_nm: f64,
    ) -> DescentProfile {
        let perf = self.performance.lookup(&flight.aircraft_type);
        let angle_deg = if perf.descent_angle_deg > 0.0 {
            perf.descent_angle_deg
        } else {
            3.0
        };
        let feet_per_nm = angle_deg.to_radians().tan() * FEET_PER_NM;
        let alt_to_lose = (current_alt_ft - target_alt_ft).max(0.0);
        let top_of_descent_nm = alt_to_lose / feet_per_nm;
        let speed_kt = perf.speeds.descent;

        let remaining_nm = distance_to_threshold_nm.max(0.1);
        let required_rate_fpm = alt_to_lose / (remaining_nm / speed_kt * 60.0);
        let required_angle_deg = (alt_to_lose / (remaining_nm * FEET_PER_NM)).atan().to_degrees();

        DescentProfile {
            top_of_descent_nm,
            distance_to_top_of_descent_nm: distance_to_threshold_nm - top_of_descent_nm,
            descent_angle_deg: angle_deg,
            nominal_rate_fpm: (feet_per_nm * speed_kt / 60.0).round(),
            required_rate_fpm: required_rate_fpm.round(),
            required_angle_deg,
        }
    }
}

fn cruise_altitude(flight: &FlightRecord, perf: &AircraftPerformance) -> f64 {
    let filed = if flight.cruise_altitude_ft > 0 {
        f64::from(flight.cruise_altitude_ft)
    } else {
        DEFAULT_CRUISE_ALT_FT
    };
    filed.min(perf.max_altitude_ft)
}

/// Taxi time in minutes between two surface points at standard taxi speed.
pub fn taxi_time_minutes(from: Position, to: Position) -> f64 {
    haversine_nm(from, to) * TAXI_ROUTING_FACTOR / TAXI_SPEED_KT * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightStatus;
    use crate::performance::PerformanceTable;

    const RKSI: Position = Position::new(37.4691, 126.4505);
    const RJTT: Position = Position::new(35.5494, 139.7798);
    const RKSS: Position = Position::new(37.5583, 126.7906);

    fn flight(aircraft: &str, cruise_ft: u32) -> FlightRecord {
        let mut f = FlightRecord::new("KAL123", aircraft, FlightStatus::Filed, Utc::now());
        f.cruise_altitude_ft = cruise_ft;
        f
    }

    #[test]
    fn long_route_has_all_phases_in_time_order() {
        let table = PerformanceTable::builtin();
        let predictor = TrajectoryPredictor::new(&table);
        let now = Utc::now();
        let prediction = predictor.predict(&flight("B738", 35_000), RKSI, RJTT, &[], now);

        let phases: Vec<_> = prediction.points.iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            vec![
                FlightPhase::Ground,
                FlightPhase::Takeoff,
                FlightPhase::InitialClimb,
                FlightPhase::Climb,
                FlightPhase::Cruise,
                FlightPhase::Descent,
                FlightPhase::Approach,
                FlightPhase::Landing,
            ]
        );
        assert!(prediction.points.windows(2).all(|w| w[0].time <= w[1].time));
        assert_eq!(prediction.points[0].time, now);
        assert_eq!(prediction.points[2].altitude_ft, 1500.0);
        assert!((prediction.total_distance_nm - haversine_nm(RKSI, RJTT)).abs() < 1e-9);
        assert_eq!(prediction.points.last().unwrap().position, RJTT);
        assert!(prediction.estimated_duration_min > 100.0);
    }

    #[test]
    fn short_route_skips_cruise() {
        let table = PerformanceTable::builtin();
        let predictor = TrajectoryPredictor::new(&table);
        let prediction = predictor.predict(&flight("A320", 30_000), RKSI, RKSS, &[], Utc::now());
        assert!(prediction
            .points
            .iter()
            .all(|p| p.phase != FlightPhase::Cruise));
        assert_eq!(prediction.points.len(), 7);
    }

    #[test]
    fn eobt_anchors_the_ground_point() {
        let table = PerformanceTable::builtin();
        let predictor = TrajectoryPredictor::new(&table);
        let mut f = flight("B738", 0);
        let eobt = Utc::now() + Duration::hours(2);
        f.eobt = Some(eobt);
        let prediction = predictor.predict(&f, RKSI, RJTT, &[], Utc::now());
        assert_eq!(prediction.points[0].time, eobt);
        assert_eq!(prediction.points[3].altitude_ft, 35_000.0);
    }

    #[test]
    fn time_at_fix_takes_slower_of_horizontal_and_vertical() {
        let table = PerformanceTable::builtin();
        let predictor = TrajectoryPredictor::new(&table);
        let now = Utc::now();
        let f = flight("B738", 35_000);
        let fix = Position::new(RKSI.lat + 1.0, RKSI.lon);

        // ~60 nm level at FL350, 450 kt -> 8 minutes
        let level = predictor.predict_time_at_fix(&f, RKSI, fix, 35_000.0, 35_000.0, now);
        let level_min = (level - now).num_seconds() as f64 / 60.0;
        assert!((level_min - 8.0).abs() < 0.1, "got {level_min}");

        // 30,000 ft descent at 2000 fpm takes 15 min, longer than the ~12 min leg
        let descending = predictor.predict_time_at_fix(&f, RKSI, fix, 35_000.0, 5_000.0, now);
        assert_eq!((descending - now).num_minutes(), 15);
    }

    #[test]
    fn descent_profile_for_three_degrees() {
        let table = PerformanceTable::builtin();
        let predictor = TrajectoryPredictor::new(&table);
        let profile = predictor.descent_profile(&flight("B738", 35_000), 10_000.0, 0.0, 40.0);
        assert_eq!(profile.descent_angle_deg, 3.0);
        assert!((profile.top_of_descent_nm - 31.4).abs() < 0.1);
        assert!(profile.distance_to_top_of_descent_nm > 0.0);
        assert!(profile.required_angle_deg < 3.0);

        let late = predictor.descent_profile(&flight("B738", 35_000), 10_000.0, 0.0, 20.0);
        assert!(late.distance_to_top_of_descent_nm < 0.0);
        assert!(late.required_rate_fpm > late.nominal_rate_fpm);
    }

    #[test]
    fn taxi_time_uses_routing_factor() {
        let gate = Position::new(37.4491, 126.4505);
        let threshold = Position::new(gate.lat + 1.0 / 60.0, gate.lon);
        let minutes = taxi_time_minutes(gate, threshold);
        // 1 nm * 1.2 at 15 kt = 4.8 min
        assert!((minutes - 4.8).abs() < 0.05);
    }
}
