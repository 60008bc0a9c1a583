//! Simulation clock and status progression.
//!
//! Two progression modes:
//!
//! - `Dwell`: each status has a nominal dwell time (seconds at 1x) plus a
//!   per-flight jitter. Every tick subtracts `speed` seconds; when a timer
//!   runs out the flight advances exactly one status.
//! - `Schedule`: statuses change at fixed offsets from EOBT (departures) or
//!   ETA (arrivals), measured against simulated time.
//!
//! Ticks need `&mut self`, so callers serialise them.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::models::{Bay, FlightRecord, FlightStatus, StatusFlow};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionMode {
    #[default]
    Dwell,
    Schedule,
}

impl FromStr for ProgressionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dwell" => Ok(ProgressionMode::Dwell),
            "schedule" => Ok(ProgressionMode::Schedule),
            other => Err(format!("unknown progression mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated seconds per tick.
    pub speed: f64,
    /// Upper bound (exclusive) of the jitter added when a flight is first seen.
    pub registration_jitter_secs: u32,
    /// Upper bound (exclusive) of the jitter added after each transition.
    pub transition_jitter_secs: u32,
    /// Seed for the jitter RNG; random when absent.
    pub seed: Option<u64>,
    pub mode: ProgressionMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            registration_jitter_secs: 30,
            transition_jitter_secs: 20,
            seed: None,
            mode: ProgressionMode::Dwell,
        }
    }
}

/// Nominal time spent in a status at 1x, `None` for statuses that do not
/// progress on their own.
pub fn dwell_secs(status: FlightStatus) -> Option<f64> {
    let secs = match status {
        FlightStatus::Filed => 120.0,
        FlightStatus::ClearanceDelivered => 60.0,
        FlightStatus::PushApproved => 90.0,
        FlightStatus::Taxiing => 180.0,
        FlightStatus::Holding => 60.0,
        FlightStatus::Lineup => 30.0,
        FlightStatus::TakeoffCleared => 20.0,
        FlightStatus::InitialApproach => 180.0,
        FlightStatus::FinalApproach => 120.0,
        FlightStatus::Landed => 30.0,
        FlightStatus::TaxiIn => 180.0,
        _ => return None,
    };
    Some(secs)
}

/// Offset from EOBT (departures) or ETA (arrivals) at which a flight enters
/// `status`.
pub fn schedule_offset(status: FlightStatus) -> Option<Duration> {
    let minutes = match status {
        FlightStatus::ClearanceDelivered => -30,
        FlightStatus::PushApproved => -15,
        FlightStatus::Taxiing => -10,
        FlightStatus::Holding => -5,
        FlightStatus::Lineup => -2,
        FlightStatus::TakeoffCleared => -1,
        FlightStatus::Departed => 0,
        FlightStatus::FinalApproach => -10,
        FlightStatus::Landed => 0,
        FlightStatus::TaxiIn => 2,
        FlightStatus::AtGate => 10,
        _ => return None,
    };
    Some(Duration::minutes(minutes))
}

/// Upper bound on simulated seconds per tick.
pub const MAX_SPEED: f64 = 86_400.0;

/// Clamp a speed into `0..=MAX_SPEED`. NaN stops the clock.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        0.0
    } else {
        speed.clamp(0.0, MAX_SPEED)
    }
}

/// One status transition produced by a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub flight_id: String,
    pub callsign: String,
    pub from: FlightStatus,
    pub to: FlightStatus,
    pub bay: Bay,
}

pub struct SimulationClock {
    config: SimulationConfig,
    rng: StdRng,
    /// Remaining dwell seconds per flight id.
    timers: HashMap<String, f64>,
    sim_time: DateTime<Utc>,
}

impl SimulationClock {
    pub fn new(mut config: SimulationConfig, start: DateTime<Utc>) -> Self {
        if clamp_speed(config.speed) != config.speed {
            tracing::warn!("Simulation speed {} out of range, clamped", config.speed);
            config.speed = clamp_speed(config.speed);
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            rng,
            timers: HashMap::new(),
            sim_time: start,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn sim_time(&self) -> DateTime<Utc> {
        self.sim_time
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.config.speed = clamp_speed(speed);
    }

    /// Remaining dwell for a flight, if it has a timer.
    pub fn remaining(&self, flight_id: &str) -> Option<f64> {
        self.timers.get(flight_id).copied()
    }

    fn jitter(&mut self, max: u32) -> f64 {
        if max == 0 {
            0.0
        } else {
            f64::from(self.rng.random_range(0..max))
        }
    }

    fn start_timer(&mut self, flight: &FlightRecord, jitter_max: u32) {
        match dwell_secs(flight.status()) {
            Some(dwell) => {
                let remaining = dwell + self.jitter(jitter_max);
                self.timers.insert(flight.id.clone(), remaining);
            }
            None => {
                self.timers.remove(&flight.id);
            }
        }
    }

    /// Advance simulated time by one tick and progress the flights.
    pub fn tick(&mut self, flights: &mut [FlightRecord]) -> Vec<StatusChange> {
        let step = Duration::milliseconds((self.config.speed * 1000.0).round() as i64);
        match self.sim_time.checked_add_signed(step) {
            Some(next) => self.sim_time = next,
            None => tracing::warn!("Simulated time held at {}", self.sim_time),
        }

        let present: HashSet<&str> = flights.iter().map(|f| f.id.as_str()).collect();
        self.timers.retain(|id, _| present.contains(id.as_str()));

        let changes = match self.config.mode {
            ProgressionMode::Dwell => self.tick_dwell(flights),
            ProgressionMode::Schedule => self.tick_schedule(flights),
        };
        for change in &changes {
            tracing::debug!(
                "{}: {} -> {} ({})",
                change.callsign,
                change.from,
                change.to,
                change.bay
            );
        }
        changes
    }

    fn tick_dwell(&mut self, flights: &mut [FlightRecord]) -> Vec<StatusChange> {
        let mut changes = Vec::new();
        let registration_jitter = self.config.registration_jitter_secs;
        let transition_jitter = self.config.transition_jitter_secs;

        for flight in flights.iter_mut() {
            let Some(remaining) = self.timers.get(&flight.id).copied() else {
                self.start_timer(flight, registration_jitter);
                continue;
            };

            let left = remaining - self.config.speed;
            if left > 0.0 {
                self.timers.insert(flight.id.clone(), left);
                continue;
            }

            let from = flight.status();
            match flight.advance(self.sim_time) {
                Some(to) => {
                    changes.push(StatusChange {
                        flight_id: flight.id.clone(),
                        callsign: flight.callsign.clone(),
                        from,
                        to,
                        bay: flight.bay(),
                    });
                    self.start_timer(flight, transition_jitter);
                }
                None => {
                    self.timers.remove(&flight.id);
                }
            }
        }
        changes
    }

    fn tick_schedule(&mut self, flights: &mut [FlightRecord]) -> Vec<StatusChange> {
        let mut changes = Vec::new();

        for flight in flights.iter_mut() {
            let Some(flow) = flight.flow() else {
                continue;
            };
            let Some(next) = flow.next(flight.status()) else {
                continue;
            };
            let anchor = match flow {
                StatusFlow::Departure => flight.eobt,
                StatusFlow::Arrival => flight.eta,
            };
            let (Some(anchor), Some(offset)) = (anchor, schedule_offset(next)) else {
                continue;
            };
            if self.sim_time < anchor + offset {
                continue;
            }

            let from = flight.status();
            if let Some(to) = flight.advance(self.sim_time) {
                changes.push(StatusChange {
                    flight_id: flight.id.clone(),
                    callsign: flight.callsign.clone(),
                    from,
                    to,
                    bay: flight.bay(),
                });
            }
        }
        changes
    }
}
