//! Drive a scenario offline through the simulation clock and sequencers.

use std::collections::BTreeMap;

use atc_core::{
    FlightRecord, PerformanceTable, RunwayConfiguration, RunwayMode, ScenarioError,
    ScenarioPlayer, SequenceSnapshot, Sequencer, SimulationClock, SimulationConfig, StatusChange,
    StripGenerator, TrafficScenario, TrafficSet,
};
use chrono::{DateTime, Utc};

/// Movements per hour assumed for every scenario runway.
pub const DEFAULT_RUNWAY_RATE: u32 = 30;

/// What happened during one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub sim_time: DateTime<Utc>,
    pub released: Vec<String>,
    pub changes: Vec<StatusChange>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: usize,
    pub sim_time: DateTime<Utc>,
    pub released: usize,
    pub transitions: usize,
    pub pending: usize,
    pub flights: Vec<FlightRecord>,
    pub sequences: SequenceSnapshot,
}

pub struct OfflineRunner {
    clock: SimulationClock,
    player: ScenarioPlayer,
    traffic: TrafficSet,
    sequencer: Sequencer,
    runways: Vec<RunwayConfiguration>,
}

impl OfflineRunner {
    /// Load `scenario` at `start`. Flights already due are active at once.
    pub fn new(
        scenario: &TrafficScenario,
        config: SimulationConfig,
        start: DateTime<Utc>,
    ) -> Result<Self, ScenarioError> {
        let mut generator = match config.seed {
            Some(seed) => StripGenerator::new(seed),
            None => StripGenerator::from_os_rng(),
        };
        let performance = PerformanceTable::builtin();
        let (player, immediate) =
            ScenarioPlayer::load(scenario, &mut generator, &performance, start)?;

        let mut traffic = TrafficSet::new();
        traffic.extend(immediate);

        Ok(Self {
            clock: SimulationClock::new(config, start),
            player,
            traffic,
            sequencer: Sequencer::default(),
            runways: scenario_runways(scenario),
        })
    }

    pub fn sim_time(&self) -> DateTime<Utc> {
        self.clock.sim_time()
    }

    pub fn flights(&self) -> &[FlightRecord] {
        self.traffic.flights()
    }

    pub fn runways(&self) -> &[RunwayConfiguration] {
        &self.runways
    }

    pub fn pending_count(&self) -> usize {
        self.player.pending_count()
    }

    /// Advance the clock one tick, then release flights that became due.
    pub fn step(&mut self) -> TickReport {
        let changes = self.clock.tick(self.traffic.flights_mut());
        let sim_time = self.clock.sim_time();

        let due = self.player.release_due(sim_time);
        let released = due.iter().map(|f| f.callsign.clone()).collect();
        self.traffic.extend(due);

        TickReport {
            sim_time,
            released,
            changes,
        }
    }

    pub fn sequences(&self) -> SequenceSnapshot {
        self.sequencer
            .recompute(self.traffic.flights(), &self.runways, self.clock.sim_time())
    }

    /// Run `ticks` steps, calling `observe` after each.
    pub fn run(&mut self, ticks: usize, mut observe: impl FnMut(&TickReport)) -> RunSummary {
        let mut released = 0;
        let mut transitions = 0;
        for _ in 0..ticks {
            let report = self.step();
            released += report.released.len();
            transitions += report.changes.len();
            observe(&report);
        }

        RunSummary {
            ticks,
            sim_time: self.clock.sim_time(),
            released,
            transitions,
            pending: self.player.pending_count(),
            flights: self.traffic.snapshot(),
            sequences: self.sequences(),
        }
    }
}

/// One configuration per runway the scenario names. A runway used by both
/// flows is mixed.
pub fn scenario_runways(scenario: &TrafficScenario) -> Vec<RunwayConfiguration> {
    let mut flows: BTreeMap<&str, (bool, bool)> = BTreeMap::new();
    for flight in scenario.departures() {
        flows.entry(flight.runway.as_str()).or_default().1 = true;
    }
    for flight in scenario.arrivals() {
        flows.entry(flight.runway.as_str()).or_default().0 = true;
    }

    flows
        .into_iter()
        .filter(|(runway, _)| !runway.is_empty())
        .map(|(runway, flow)| {
            let mode = match flow {
                (true, true) => RunwayMode::Mixed,
                (true, false) => RunwayMode::Arrival,
                _ => RunwayMode::Departure,
            };
            RunwayConfiguration::new(runway, mode, DEFAULT_RUNWAY_RATE)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scenarios::{create_arrival_rush, create_morning_bank};
    use atc_core::FlightStatus;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap()
    }

    fn config(speed: f64) -> SimulationConfig {
        SimulationConfig {
            speed,
            seed: Some(42),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn runways_follow_scenario_flows() {
        let runways = scenario_runways(&create_morning_bank());
        assert_eq!(runways.len(), 2);
        assert_eq!(runways[0].runway, "33L");
        assert_eq!(runways[0].mode, RunwayMode::Arrival);
        assert_eq!(runways[1].runway, "33R");
        assert_eq!(runways[1].mode, RunwayMode::Departure);
    }

    #[test]
    fn only_due_flights_start_active() {
        let runner = OfflineRunner::new(&create_morning_bank(), config(60.0), start()).unwrap();
        assert_eq!(runner.flights().len(), 1);
        assert_eq!(runner.flights()[0].callsign, "KAL101");
        assert_eq!(runner.pending_count(), 6);
    }

    #[test]
    fn ticks_release_and_progress_flights() {
        let mut runner =
            OfflineRunner::new(&create_morning_bank(), config(60.0), start()).unwrap();

        let mut seen = 0;
        let summary = runner.run(10, |_| seen += 1);

        assert_eq!(seen, 10);
        assert_eq!(summary.sim_time, start() + chrono::Duration::minutes(10));
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.released, 6);
        assert_eq!(summary.flights.len(), 7);
        assert!(summary.transitions > 0);

        let kal101 = summary
            .flights
            .iter()
            .find(|f| f.callsign == "KAL101")
            .unwrap();
        assert_ne!(kal101.status(), FlightStatus::Filed);
    }

    #[test]
    fn same_seed_same_outcome() {
        let run = || {
            let mut runner =
                OfflineRunner::new(&create_arrival_rush(), config(30.0), start()).unwrap();
            let summary = runner.run(12, |_| {});
            summary
                .flights
                .iter()
                .map(|f| (f.callsign.clone(), f.status()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        let mut scenario = create_arrival_rush();
        scenario.flights[0].scheduled_time = "later".to_string();
        assert!(OfflineRunner::new(&scenario, config(1.0), start()).is_err());
    }
}
