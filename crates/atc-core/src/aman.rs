//! Arrival manager (AMAN).
//!
//! Orders inbound traffic by ETA and spaces each arrival behind its
//! predecessor using wake separation converted to time at a nominal approach
//! speed. Delayed arrivals receive a speed advisory and, beyond ten minutes,
//! holding advice. Every call recomputes the full sequence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::airport::RunwayConfiguration;
use crate::models::{FlightRecord, FlightStatus};
use crate::wake::{calculate_separation, SeparationScheme};

/// Statuses considered by the arrival sequence.
pub const SEQUENCED_STATUSES: [FlightStatus; 3] = [
    FlightStatus::InitialApproach,
    FlightStatus::FinalApproach,
    FlightStatus::Active,
];

/// Time from the meter fix to touchdown.
const FINAL_APPROACH_MINUTES: i64 = 5;

/// Upper bound on the spacing between two consecutive arrivals.
const MAX_SPACING_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmanConfig {
    /// Fix the scheduled times refer to.
    pub meter_fix: String,
    pub holding_fix: String,
    /// Nominal approach speed used to convert distance minima to time.
    pub approach_speed_kt: f64,
    /// Floor for the time spacing between consecutive arrivals.
    pub minimum_separation_secs: i64,
    pub use_recat: bool,
    /// Speed advisories start from this speed and lose 3 kt per minute of delay.
    pub advisory_base_speed_kt: u32,
    pub advisory_min_speed_kt: u32,
    pub advisory_kt_per_minute: u32,
    /// Delay above which holding is advised.
    pub holding_threshold_min: i64,
    /// Holding ends this long before the scheduled time.
    pub holding_exit_lead_min: i64,
}

impl Default for AmanConfig {
    fn default() -> Self {
        Self {
            meter_fix: "IC803".to_string(),
            holding_fix: "GUKDO".to_string(),
            approach_speed_kt: 140.0,
            minimum_separation_secs: 90,
            use_recat: true,
            advisory_base_speed_kt: 280,
            advisory_min_speed_kt: 220,
            advisory_kt_per_minute: 3,
            holding_threshold_min: 10,
            holding_exit_lead_min: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingAdvice {
    pub fix: String,
    pub expected_duration_min: i64,
    pub expected_exit_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedArrival {
    pub flight_id: String,
    pub callsign: String,
    pub original_eta: DateTime<Utc>,
    pub scheduled_time: DateTime<Utc>,
    /// Whole minutes between ETA and scheduled time.
    pub delay_min: i64,
    /// 1-based.
    pub sequence_position: usize,
    pub meter_fix: String,
    pub advised_speed_kt: Option<u32>,
    pub advised_delay_min: Option<i64>,
    pub holding: Option<HoldingAdvice>,
}

impl SequencedArrival {
    pub fn estimated_landing_time(&self) -> DateTime<Utc> {
        self.scheduled_time + Duration::minutes(FINAL_APPROACH_MINUTES)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalSequence {
    pub runway: String,
    pub calculated_at: DateTime<Utc>,
    pub flights: Vec<SequencedArrival>,
}

/// Achieved movement rate against declared capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunwayUtilization {
    pub current_rate: u32,
    pub max_rate: u32,
    pub utilization_percent: u32,
}

impl RunwayUtilization {
    /// Rate derived from the mean gap between consecutive times.
    pub(crate) fn from_times(times: &[DateTime<Utc>], max_rate: u32) -> Self {
        let idle = Self {
            current_rate: 0,
            max_rate,
            utilization_percent: 0,
        };
        let (Some(first), Some(last)) = (times.first(), times.last()) else {
            return idle;
        };
        if times.len() < 2 {
            return idle;
        }

        let avg_gap_secs = (*last - *first).num_milliseconds() as f64
            / 1000.0
            / (times.len() - 1) as f64;
        if avg_gap_secs <= 0.0 {
            return idle;
        }

        let current_rate = (3600.0 / avg_gap_secs).round() as u32;
        let utilization_percent = if max_rate == 0 {
            0
        } else {
            (f64::from(current_rate) / f64::from(max_rate) * 100.0).round() as u32
        };
        Self {
            current_rate,
            max_rate,
            utilization_percent,
        }
    }
}

impl ArrivalSequence {
    pub fn find(&self, flight_id: &str) -> Option<&SequencedArrival> {
        self.flights.iter().find(|f| f.flight_id == flight_id)
    }

    pub fn utilization(&self, runway: &RunwayConfiguration) -> RunwayUtilization {
        let times: Vec<_> = self.flights.iter().map(|f| f.scheduled_time).collect();
        RunwayUtilization::from_times(&times, runway.arrival_rate)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArrivalManager {
    config: AmanConfig,
}

impl ArrivalManager {
    pub fn new(config: AmanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AmanConfig {
        &self.config
    }

    /// Sequence inbound flights for one runway.
    ///
    /// Flights outside [`SEQUENCED_STATUSES`] are ignored. A flight with no
    /// ETA is sequenced as if arriving at `now`.
    pub fn calculate_sequence(
        &self,
        flights: &[FlightRecord],
        runway: &RunwayConfiguration,
        now: DateTime<Utc>,
    ) -> ArrivalSequence {
        let mut arrivals: Vec<(DateTime<Utc>, &FlightRecord)> = flights
            .iter()
            .filter(|f| SEQUENCED_STATUSES.contains(&f.status()))
            .map(|f| {
                let eta = f.eta.unwrap_or_else(|| {
                    tracing::debug!("{} has no ETA, sequencing at current time", f.callsign);
                    now
                });
                (eta, f)
            })
            .collect();
        arrivals.sort_by_key(|(eta, _)| *eta);

        let scheme = SeparationScheme::from_recat_flag(self.config.use_recat);
        let mut sequenced = Vec::with_capacity(arrivals.len());
        let mut previous: Option<(&FlightRecord, DateTime<Utc>)> = None;

        for (idx, (eta, flight)) in arrivals.into_iter().enumerate() {
            let mut scheduled_time = eta;
            let mut advised_delay_min = None;

            if let Some((leader, leader_time)) = previous {
                let separation = calculate_separation(leader, flight, scheme);
                let spacing_secs = self.spacing_secs(separation.distance_nm);
                let earliest = leader_time + Duration::seconds(spacing_secs);
                if eta < earliest {
                    scheduled_time = earliest;
                    advised_delay_min = Some(whole_minutes(earliest - eta));
                }
            }

            let delay_min = advised_delay_min.unwrap_or(0);
            sequenced.push(SequencedArrival {
                flight_id: flight.id.clone(),
                callsign: flight.callsign.clone(),
                original_eta: eta,
                scheduled_time,
                delay_min,
                sequence_position: idx + 1,
                meter_fix: self.config.meter_fix.clone(),
                advised_speed_kt: (delay_min > 0).then(|| self.speed_advisory(delay_min)),
                advised_delay_min,
                holding: self.holding_advice(delay_min, scheduled_time),
            });
            previous = Some((flight, scheduled_time));
        }

        tracing::debug!(
            "AMAN {}: {} arrivals sequenced",
            runway.runway,
            sequenced.len()
        );

        ArrivalSequence {
            runway: runway.runway.clone(),
            calculated_at: now,
            flights: sequenced,
        }
    }

    /// Speed that absorbs `delay_min` en route.
    /// Time spacing for a distance minimum, never below the configured floor.
    /// A non-positive approach speed leaves only the floor.
    pub fn spacing_secs(&self, distance_nm: f64) -> i64 {
        let floor = self.config.minimum_separation_secs.clamp(0, MAX_SPACING_SECS);
        let speed = self.config.approach_speed_kt;
        if !(speed.is_finite() && speed > 0.0) {
            return floor;
        }
        let secs = (distance_nm / speed * 3600.0).ceil();
        if secs.is_nan() {
            return floor;
        }
        floor.max((secs as i64).min(MAX_SPACING_SECS))
    }

    pub fn speed_advisory(&self, delay_min: i64) -> u32 {
        let cfg = &self.config;
        let max_reduction = cfg.advisory_base_speed_kt.saturating_sub(cfg.advisory_min_speed_kt);
        let reduction = u32::try_from(delay_min.max(0))
            .unwrap_or(u32::MAX)
            .saturating_mul(cfg.advisory_kt_per_minute)
            .min(max_reduction);
        cfg.advisory_base_speed_kt - reduction
    }

    /// Holding at the configured fix once the delay exceeds the threshold.
    pub fn holding_advice(
        &self,
        delay_min: i64,
        scheduled_time: DateTime<Utc>,
    ) -> Option<HoldingAdvice> {
        (delay_min > self.config.holding_threshold_min).then(|| HoldingAdvice {
            fix: self.config.holding_fix.clone(),
            expected_duration_min: delay_min,
            expected_exit_time: scheduled_time
                - Duration::minutes(self.config.holding_exit_lead_min),
        })
    }
}

fn whole_minutes(duration: Duration) -> i64 {
    (duration.num_milliseconds() as f64 / 60_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airport::RunwayMode;
    use crate::models::WakeCategory;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    fn arrival(callsign: &str, wake: WakeCategory, eta_offset_secs: i64) -> FlightRecord {
        let mut f = FlightRecord::new(callsign, "B738", FlightStatus::InitialApproach, t0());
        f.wake_category = wake;
        f.eta = Some(t0() + Duration::seconds(eta_offset_secs));
        f
    }

    fn runway() -> RunwayConfiguration {
        RunwayConfiguration::new("33L", RunwayMode::Arrival, 30)
    }

    fn icao_manager() -> ArrivalManager {
        ArrivalManager::new(AmanConfig {
            use_recat: false,
            ..Default::default()
        })
    }

    #[test]
    fn first_arrival_keeps_eta() {
        let flights = vec![arrival("KAL1", WakeCategory::Medium, 600)];
        let seq = icao_manager().calculate_sequence(&flights, &runway(), t0());
        assert_eq!(seq.flights.len(), 1);
        let first = &seq.flights[0];
        assert_eq!(first.scheduled_time, t0() + Duration::seconds(600));
        assert_eq!(first.delay_min, 0);
        assert_eq!(first.advised_speed_kt, None);
        assert_eq!(first.sequence_position, 1);
    }

    #[test]
    fn heavy_then_light_is_spaced_by_wake_distance() {
        // 6 nm at 140 kt = 155 s
        let flights = vec![
            arrival("KAL1", WakeCategory::Heavy, 0),
            arrival("KAL2", WakeCategory::Light, 60),
        ];
        let seq = icao_manager().calculate_sequence(&flights, &runway(), t0());
        let second = &seq.flights[1];
        assert_eq!(second.scheduled_time, t0() + Duration::seconds(155));
        assert_eq!(second.delay_min, 2);
        assert_eq!(second.advised_delay_min, Some(2));
        assert_eq!(second.advised_speed_kt, Some(274));
        assert!(second.holding.is_none());
    }

    #[test]
    fn eta_beyond_spacing_is_kept() {
        let flights = vec![
            arrival("KAL1", WakeCategory::Medium, 0),
            arrival("KAL2", WakeCategory::Medium, 600),
        ];
        let seq = icao_manager().calculate_sequence(&flights, &runway(), t0());
        assert_eq!(seq.flights[1].scheduled_time, t0() + Duration::seconds(600));
        assert_eq!(seq.flights[1].advised_delay_min, None);
    }

    #[test]
    fn long_delay_gets_holding_advice() {
        let flights: Vec<_> = (0..10)
            .map(|i| arrival(&format!("KAL{i}"), WakeCategory::Medium, i))
            .collect();
        let seq = icao_manager().calculate_sequence(&flights, &runway(), t0());
        let last = seq.flights.last().unwrap();
        // nine 90 s gaps
        assert_eq!(last.scheduled_time, t0() + Duration::seconds(810));
        assert_eq!(last.delay_min, 13);
        assert_eq!(last.advised_speed_kt, Some(241));
        let holding = last.holding.as_ref().unwrap();
        assert_eq!(holding.fix, "GUKDO");
        assert_eq!(holding.expected_duration_min, 13);
        assert_eq!(
            holding.expected_exit_time,
            last.scheduled_time - Duration::minutes(10)
        );
    }

    #[test]
    fn zero_approach_speed_falls_back_to_floor() {
        let manager = ArrivalManager::new(AmanConfig {
            approach_speed_kt: 0.0,
            use_recat: false,
            ..Default::default()
        });
        assert_eq!(manager.spacing_secs(6.0), 90);

        let flights = vec![
            arrival("KAL1", WakeCategory::Heavy, 0),
            arrival("KAL2", WakeCategory::Light, 10),
        ];
        let seq = manager.calculate_sequence(&flights, &runway(), t0());
        assert_eq!(seq.flights[1].scheduled_time, t0() + Duration::seconds(90));
    }

    #[test]
    fn spacing_converts_distance_at_approach_speed() {
        let manager = icao_manager();
        // 7 nm at 140 kt
        assert_eq!(manager.spacing_secs(7.0), 180);
        assert_eq!(manager.spacing_secs(1.0), 90);
    }

    #[test]
    fn speed_advisory_is_floored() {
        let manager = ArrivalManager::default();
        assert_eq!(manager.speed_advisory(1), 277);
        assert_eq!(manager.speed_advisory(40), 220);
    }

    #[test]
    fn scheduled_times_never_precede_eta_and_stay_ordered() {
        let wakes = [
            WakeCategory::Super,
            WakeCategory::Light,
            WakeCategory::Heavy,
            WakeCategory::Medium,
            WakeCategory::Light,
            WakeCategory::Heavy,
        ];
        let flights: Vec<_> = wakes
            .iter()
            .enumerate()
            .map(|(i, w)| arrival(&format!("T{i}"), *w, i as i64 * 45))
            .collect();
        for manager in [icao_manager(), ArrivalManager::default()] {
            let seq = manager.calculate_sequence(&flights, &runway(), t0());
            assert!(seq.flights.iter().all(|f| f.scheduled_time >= f.original_eta));
            assert!(seq
                .flights
                .windows(2)
                .all(|w| w[0].scheduled_time <= w[1].scheduled_time));
        }
    }

    #[test]
    fn ignores_other_statuses_and_defaults_missing_eta() {
        let mut departed = arrival("KAL9", WakeCategory::Medium, 0);
        departed.transition_to(FlightStatus::Landed, t0()).unwrap();
        let mut no_eta = arrival("KAL5", WakeCategory::Medium, 0);
        no_eta.eta = None;

        let seq = icao_manager().calculate_sequence(
            &[departed, no_eta],
            &runway(),
            t0() + Duration::minutes(3),
        );
        assert_eq!(seq.flights.len(), 1);
        assert_eq!(seq.flights[0].callsign, "KAL5");
        assert_eq!(seq.flights[0].original_eta, t0() + Duration::minutes(3));
    }

    #[test]
    fn utilization_from_scheduled_gaps() {
        let flights: Vec<_> = (0..4)
            .map(|i| arrival(&format!("KAL{i}"), WakeCategory::Medium, i * 120))
            .collect();
        let seq = icao_manager().calculate_sequence(&flights, &runway(), t0());
        let util = seq.utilization(&runway());
        assert_eq!(util.current_rate, 30);
        assert_eq!(util.max_rate, 30);
        assert_eq!(util.utilization_percent, 100);

        let single = icao_manager().calculate_sequence(&flights[..1], &runway(), t0());
        assert_eq!(single.utilization(&runway()).current_rate, 0);
    }

    #[test]
    fn landing_time_after_meter_fix() {
        let flights = vec![arrival("KAL1", WakeCategory::Medium, 0)];
        let seq = icao_manager().calculate_sequence(&flights, &runway(), t0());
        let id = flights[0].id.clone();
        let entry = seq.find(&id).unwrap();
        assert_eq!(entry.estimated_landing_time(), t0() + Duration::minutes(5));
    }
}
