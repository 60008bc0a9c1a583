//! In-memory state store.
//!
//! The traffic set sits behind one reader-writer lock. Passes that only read
//! (sequencing, safety nets) take a snapshot and release the lock before
//! computing. Lock order is clock, then strip generator, then traffic, then
//! scenario; `now()` must be read before taking any of the others.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use atc_core::fpl::{self, FlightPlanMessage, ValidationDefect};
use atc_core::scenario::{ScenarioPlayer, TrafficScenario};
use atc_core::{
    AirportDirectory, AirportLayout, AirportLookup, Alert, AmanConfig, Annotation, Clearance,
    DmanConfig, FlightRecord, FlightStatus, MessageOutcome, ParseError, PerformanceTable,
    RunwayConfiguration, SafetyNetEngine, ScenarioError, SequenceSnapshot, Sequencer,
    SimulationClock, StatusChange, StripGenerator, StripOptions, SurfacePosition, TrafficSet,
    TransitionError,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::Config;

const ALERT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid message: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Result of applying one inbound message.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub message: FlightPlanMessage,
    pub outcome: MessageOutcome,
    pub defects: Vec<ValidationDefect>,
    pub flight: Option<FlightRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub immediate: usize,
    pub pending: usize,
}

/// Safety-net notifications fanned out to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "alert", rename_all = "snake_case")]
pub enum AlertEvent {
    Raised(Alert),
    Resolved(Alert),
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Departed or parked at the gate: no longer part of the surface picture.
fn leaves_surface(status: FlightStatus) -> bool {
    matches!(status, FlightStatus::Departed | FlightStatus::AtGate)
}

/// Application state shared by handlers and background loops.
pub struct AppState {
    config: Config,
    traffic: RwLock<TrafficSet>,
    clock: Mutex<SimulationClock>,
    strips: Mutex<StripGenerator>,
    safety_net: Mutex<SafetyNetEngine>,
    surface: DashMap<String, SurfacePosition>,
    sequences: RwLock<Option<SequenceSnapshot>>,
    scenario: Mutex<Option<ScenarioPlayer>>,
    runways: RwLock<Vec<RunwayConfiguration>>,
    sequencer: Sequencer,
    performance: PerformanceTable,
    layout: AirportLayout,
    alert_events: broadcast::Sender<AlertEvent>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_start(config, Utc::now())
    }

    /// State whose simulated clock starts at `start`.
    pub fn with_start(config: Config, start: DateTime<Utc>) -> Self {
        let (alert_events, _) = broadcast::channel(ALERT_EVENT_CAPACITY);

        let mut safety_net = SafetyNetEngine::new(config.safety_net_rules());
        let raised_tx = alert_events.clone();
        safety_net.on_alert(move |alert| {
            let _ = raised_tx.send(AlertEvent::Raised(alert.clone()));
        });
        let resolved_tx = alert_events.clone();
        safety_net.on_resolve(move |alert| {
            let _ = resolved_tx.send(AlertEvent::Resolved(alert.clone()));
        });

        let strips = match config.sim_seed {
            Some(seed) => StripGenerator::new(seed),
            None => StripGenerator::from_os_rng(),
        };
        let layout = AirportDirectory::builtin().layout(&config.airport);
        if layout.runways.is_empty() {
            tracing::warn!("No layout for {}, runway safety nets are idle", config.airport);
        }

        Self {
            traffic: RwLock::new(TrafficSet::new()),
            clock: Mutex::new(SimulationClock::new(config.simulation_config(), start)),
            strips: Mutex::new(strips),
            safety_net: Mutex::new(safety_net),
            surface: DashMap::new(),
            sequences: RwLock::new(None),
            scenario: Mutex::new(None),
            runways: RwLock::new(config.runway_configurations()),
            sequencer: Sequencer::new(AmanConfig::default(), DmanConfig::default()),
            performance: PerformanceTable::builtin(),
            layout,
            alert_events,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &AirportLayout {
        &self.layout
    }

    pub fn performance(&self) -> &PerformanceTable {
        &self.performance
    }

    /// Current simulated time.
    pub fn now(&self) -> DateTime<Utc> {
        lock(&self.clock).sim_time()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_events.subscribe()
    }

    // === Traffic ===

    /// Decode, validate and apply a message.
    pub fn ingest_message(
        &self,
        raw: &str,
        options: StripOptions,
    ) -> Result<IngestResult, IngestError> {
        let now = self.now();
        let message = fpl::parse(raw).inspect_err(|e| {
            tracing::warn!("Rejected message: {}", e);
        })?;
        let defects = fpl::validate(&message);
        if !defects.is_empty() {
            tracing::debug!("{} accepted with {} defect(s)", message.callsign, defects.len());
        }

        let mut strips = lock(&self.strips);
        let mut traffic = write(&self.traffic);
        let outcome = traffic.apply_message(&message, &mut strips, options, now)?;
        let flight = outcome
            .flight_id()
            .and_then(|id| traffic.get(id))
            .cloned();
        match &outcome {
            MessageOutcome::Cancelled { flight_id } => self.drop_surface_position(flight_id),
            MessageOutcome::StatusChanged { flight_id, to, .. } if leaves_surface(*to) => {
                self.drop_surface_position(flight_id)
            }
            _ => {}
        }
        tracing::info!("Ingested {} {}", message.kind.as_str(), message.callsign);

        Ok(IngestResult {
            message,
            outcome,
            defects,
            flight,
        })
    }

    pub fn flights(&self) -> Vec<FlightRecord> {
        read(&self.traffic).snapshot()
    }

    pub fn flight(&self, id: &str) -> Option<FlightRecord> {
        read(&self.traffic).get(id).cloned()
    }

    pub fn flight_by_callsign(&self, callsign: &str) -> Option<FlightRecord> {
        read(&self.traffic).find_by_callsign(callsign).cloned()
    }

    pub fn flight_count(&self) -> usize {
        read(&self.traffic).len()
    }

    pub fn issue_clearance(&self, flight_id: &str, clearance: Clearance) -> Option<Clearance> {
        let mut traffic = write(&self.traffic);
        let flight = traffic.get_mut(flight_id)?;
        let issued = flight.issue_clearance(clearance).clone();
        tracing::info!(
            "{} cleared {:?} {}",
            flight.callsign,
            issued.clearance_type(),
            issued.value()
        );
        Some(issued)
    }

    /// `None` when the flight or clearance is unknown.
    pub fn confirm_readback(&self, flight_id: &str, clearance_id: &str) -> Option<Clearance> {
        let now = self.now();
        let mut traffic = write(&self.traffic);
        let flight = traffic.get_mut(flight_id)?;
        flight.confirm_readback(clearance_id, now)?;
        flight
            .clearances()
            .iter()
            .find(|c| c.id() == clearance_id)
            .cloned()
    }

    pub fn add_annotation(&self, flight_id: &str, annotation: Annotation) -> Option<Annotation> {
        let mut traffic = write(&self.traffic);
        let flight = traffic.get_mut(flight_id)?;
        flight.add_annotation(annotation.clone());
        Some(annotation)
    }

    // === Surface ===

    pub fn upsert_surface_position(&self, position: SurfacePosition) {
        self.surface.insert(position.flight_id.clone(), position);
    }

    fn drop_surface_position(&self, flight_id: &str) {
        if let Some((_, position)) = self.surface.remove(flight_id) {
            tracing::debug!("Dropped surface position for {}", position.callsign);
        }
    }

    pub fn surface_positions(&self) -> Vec<SurfacePosition> {
        self.surface.iter().map(|r| r.value().clone()).collect()
    }

    // === Sequencing ===

    pub fn runway_configurations(&self) -> Vec<RunwayConfiguration> {
        read(&self.runways).clone()
    }

    /// Recompute and store the sequences. Returns the new snapshot and
    /// whether its order differs from the previous one.
    pub fn recompute_sequences(&self) -> (SequenceSnapshot, bool) {
        let now = self.now();
        let flights = self.flights();
        let runways = self.runway_configurations();
        let snapshot = self.sequencer.recompute(&flights, &runways, now);

        let mut latest = write(&self.sequences);
        let changed = latest
            .as_ref()
            .map_or(true, |previous| !previous.same_order_as(&snapshot));
        *latest = Some(snapshot.clone());
        (snapshot, changed)
    }

    /// Latest snapshot, computed now if there is none yet.
    pub fn sequences(&self) -> SequenceSnapshot {
        if let Some(snapshot) = read(&self.sequences).clone() {
            return snapshot;
        }
        self.recompute_sequences().0
    }

    // === Safety nets ===

    /// Run every enabled safety net. Returns only alerts raised by this pass.
    pub fn check_safety_nets(&self) -> Vec<Alert> {
        let now = self.now();
        let flights = self.flights();
        let known: HashSet<&str> = flights.iter().map(|f| f.id.as_str()).collect();
        let positions: Vec<SurfacePosition> = self
            .surface_positions()
            .into_iter()
            .filter(|p| known.contains(p.flight_id.as_str()))
            .collect();

        let mut engine = lock(&self.safety_net);
        engine.check_all(&flights, &positions, &self.layout.runways, now);
        engine.take_new_alerts()
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        lock(&self.safety_net).active_alerts()
    }

    pub fn acknowledge_alert(&self, alert_id: &str, by: &str) -> Option<Alert> {
        let now = self.now();
        lock(&self.safety_net)
            .acknowledge(alert_id, by, now)
            .cloned()
    }

    pub fn resolve_alert(&self, alert_id: &str) -> Option<Alert> {
        let now = self.now();
        lock(&self.safety_net).resolve(alert_id, now)
    }

    /// Alerts resolved since the previous call.
    pub fn take_resolved_alerts(&self) -> Vec<Alert> {
        lock(&self.safety_net).take_resolved_alerts()
    }

    // === Simulation ===

    /// Advance the clock one tick and release due scenario flights.
    pub fn tick(&self) -> Vec<StatusChange> {
        let mut clock = lock(&self.clock);
        let mut traffic = write(&self.traffic);
        let changes = clock.tick(traffic.flights_mut());
        for change in changes.iter().filter(|c| leaves_surface(c.to)) {
            self.drop_surface_position(&change.flight_id);
        }

        let now = clock.sim_time();
        if let Some(player) = lock(&self.scenario).as_mut() {
            let released = player.release_due(now);
            if !released.is_empty() {
                tracing::info!(
                    "Released {} scenario flight(s), {} pending",
                    released.len(),
                    player.pending_count()
                );
                traffic.extend(released);
            }
        }
        changes
    }

    /// Load a scenario starting at the current simulated time.
    pub fn load_scenario(
        &self,
        scenario: &TrafficScenario,
    ) -> Result<ScenarioSummary, ScenarioError> {
        let now = self.now();
        let (player, immediate) = {
            let mut strips = lock(&self.strips);
            ScenarioPlayer::load(scenario, &mut strips, &self.performance, now)?
        };

        let summary = ScenarioSummary {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            immediate: immediate.len(),
            pending: player.pending_count(),
        };

        write(&self.traffic).extend(immediate);
        *lock(&self.scenario) = Some(player);
        Ok(summary)
    }
}
