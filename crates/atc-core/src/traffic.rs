//! The live traffic set and the sequence recompute entry point.
//!
//! [`TrafficSet`] is the single-writer store of flight records; callers that
//! share it across threads wrap it in one reader-writer lock and hand
//! snapshots to the sequencers and safety nets. [`Sequencer`] turns a
//! snapshot plus runway configuration into a [`SequenceSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::airport::RunwayConfiguration;
use crate::aman::{AmanConfig, ArrivalManager, ArrivalSequence};
use crate::dman::{DepartureManager, DepartureSequence, DmanConfig};
use crate::error::TransitionError;
use crate::fpl::{FlightPlanMessage, MessageKind};
use crate::models::{FlightRecord, FlightStatus};
use crate::strips::{StripGenerator, StripOptions};

/// What applying a message did to the traffic set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    Inserted {
        flight_id: String,
    },
    Updated {
        flight_id: String,
    },
    Cancelled {
        flight_id: String,
    },
    StatusChanged {
        flight_id: String,
        from: FlightStatus,
        to: FlightStatus,
    },
    /// CNL for a callsign that is not in the set.
    UnknownCallsign {
        callsign: String,
    },
}

impl MessageOutcome {
    pub fn flight_id(&self) -> Option<&str> {
        match self {
            MessageOutcome::Inserted { flight_id }
            | MessageOutcome::Updated { flight_id }
            | MessageOutcome::Cancelled { flight_id }
            | MessageOutcome::StatusChanged { flight_id, .. } => Some(flight_id),
            MessageOutcome::UnknownCallsign { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSet {
    flights: Vec<FlightRecord>,
}

impl TrafficSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    pub fn flights(&self) -> &[FlightRecord] {
        &self.flights
    }

    /// Mutable view for the simulation clock. Records cannot be added or
    /// removed through it.
    pub fn flights_mut(&mut self) -> &mut [FlightRecord] {
        &mut self.flights
    }

    /// Owned copy for passes that must not hold the lock.
    pub fn snapshot(&self) -> Vec<FlightRecord> {
        self.flights.clone()
    }

    pub fn get(&self, id: &str) -> Option<&FlightRecord> {
        self.flights.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut FlightRecord> {
        self.flights.iter_mut().find(|f| f.id == id)
    }

    pub fn find_by_callsign(&self, callsign: &str) -> Option<&FlightRecord> {
        self.flights
            .iter()
            .find(|f| f.callsign.eq_ignore_ascii_case(callsign))
    }

    fn position_of_callsign(&self, callsign: &str) -> Option<usize> {
        self.flights
            .iter()
            .position(|f| f.callsign.eq_ignore_ascii_case(callsign))
    }

    /// Add a record, replacing any record with the same id.
    pub fn insert(&mut self, record: FlightRecord) {
        match self.flights.iter_mut().find(|f| f.id == record.id) {
            Some(existing) => *existing = record,
            None => self.flights.push(record),
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = FlightRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<FlightRecord> {
        let idx = self.flights.iter().position(|f| f.id == id)?;
        Some(self.flights.remove(idx))
    }

    pub fn remove_by_callsign(&mut self, callsign: &str) -> Option<FlightRecord> {
        let idx = self.position_of_callsign(callsign)?;
        Some(self.flights.remove(idx))
    }

    /// Apply a decoded message.
    ///
    /// FPL and CHG for a known callsign update the plan fields in place and
    /// keep id, status, squawk, clearances and annotations. DEP and ARR move
    /// a known flight to `Departed` / `Landed`; an unknown one is inserted
    /// already in that status.
    pub fn apply_message(
        &mut self,
        plan: &FlightPlanMessage,
        generator: &mut StripGenerator,
        options: StripOptions,
        now: DateTime<Utc>,
    ) -> Result<MessageOutcome, TransitionError> {
        let known = self.position_of_callsign(&plan.callsign);

        match (plan.kind, known) {
            (MessageKind::Cnl, Some(idx)) => {
                let removed = self.flights.remove(idx);
                tracing::info!("Cancelled flight plan for {}", removed.callsign);
                Ok(MessageOutcome::Cancelled {
                    flight_id: removed.id,
                })
            }
            (MessageKind::Cnl, None) => {
                tracing::warn!("CNL for unknown callsign {}", plan.callsign);
                Ok(MessageOutcome::UnknownCallsign {
                    callsign: plan.callsign.clone(),
                })
            }
            (MessageKind::Fpl | MessageKind::Chg, Some(idx)) => {
                let fresh = generator.from_flight_plan(plan, options, now);
                let existing = &mut self.flights[idx];
                merge_plan(existing, fresh, now);
                tracing::info!("Updated flight plan for {}", existing.callsign);
                Ok(MessageOutcome::Updated {
                    flight_id: existing.id.clone(),
                })
            }
            (MessageKind::Dep | MessageKind::Arr, Some(idx)) => {
                let target = reported_status(plan.kind);
                let flight = &mut self.flights[idx];
                let from = flight.status();
                flight.transition_to(target, now)?;
                tracing::info!("{} {} -> {}", flight.callsign, from, target);
                Ok(MessageOutcome::StatusChanged {
                    flight_id: flight.id.clone(),
                    from,
                    to: target,
                })
            }
            (kind, None) => {
                let mut record = generator.from_flight_plan(plan, options, now);
                if kind == MessageKind::Arr {
                    record.transition_to(FlightStatus::Landed, now)?;
                }
                tracing::info!(
                    "New strip {} ({}) from {}",
                    record.callsign,
                    record.status(),
                    kind.as_str()
                );
                let flight_id = record.id.clone();
                self.flights.push(record);
                Ok(MessageOutcome::Inserted { flight_id })
            }
        }
    }
}

fn reported_status(kind: MessageKind) -> FlightStatus {
    match kind {
        MessageKind::Arr => FlightStatus::Landed,
        _ => FlightStatus::Departed,
    }
}

fn merge_plan(existing: &mut FlightRecord, fresh: FlightRecord, now: DateTime<Utc>) {
    existing.aircraft_type = fresh.aircraft_type;
    existing.wake_category = fresh.wake_category;
    existing.departure = fresh.departure;
    existing.destination = fresh.destination;
    existing.cruise_altitude_ft = fresh.cruise_altitude_ft;
    existing.route = fresh.route;
    existing.flight_rules = fresh.flight_rules;
    existing.flight_type = fresh.flight_type;
    existing.eobt = fresh.eobt.or(existing.eobt);
    existing.eta = fresh.eta.or(existing.eta);
    existing.runway = fresh.runway.or(existing.runway.take());
    existing.gate = fresh.gate.or(existing.gate.take());
    existing.sid = fresh.sid.or(existing.sid.take());
    existing.star = fresh.star.or(existing.star.take());
    existing.updated_at = now;
}

/// Result of one recompute pass over every active runway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSnapshot {
    pub calculated_at: DateTime<Utc>,
    pub arrivals: Vec<ArrivalSequence>,
    pub departures: Vec<DepartureSequence>,
}

impl SequenceSnapshot {
    pub fn arrival_runway(&self, runway: &str) -> Option<&ArrivalSequence> {
        self.arrivals
            .iter()
            .find(|s| s.runway.eq_ignore_ascii_case(runway))
    }

    pub fn departure_runway(&self, runway: &str) -> Option<&DepartureSequence> {
        self.departures
            .iter()
            .find(|s| s.runway.eq_ignore_ascii_case(runway))
    }

    /// Same sequences, ignoring when they were computed.
    pub fn same_order_as(&self, other: &SequenceSnapshot) -> bool {
        let strip = |s: &SequenceSnapshot| {
            let mut s = s.clone();
            s.calculated_at = DateTime::<Utc>::MIN_UTC;
            for a in &mut s.arrivals {
                a.calculated_at = DateTime::<Utc>::MIN_UTC;
            }
            for d in &mut s.departures {
                d.calculated_at = DateTime::<Utc>::MIN_UTC;
            }
            s
        };
        strip(self) == strip(other)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    aman: ArrivalManager,
    dman: DepartureManager,
}

impl Sequencer {
    pub fn new(aman: AmanConfig, dman: DmanConfig) -> Self {
        Self {
            aman: ArrivalManager::new(aman),
            dman: DepartureManager::new(dman),
        }
    }

    pub fn arrival_manager(&self) -> &ArrivalManager {
        &self.aman
    }

    pub fn departure_manager(&self) -> &DepartureManager {
        &self.dman
    }

    /// Recompute every active runway's sequence from scratch.
    ///
    /// A flight goes to its assigned runway when that runway is active in a
    /// matching mode, and to the first matching runway when it has none.
    /// Flights assigned to an inactive or non-matching runway are left out.
    pub fn recompute(
        &self,
        flights: &[FlightRecord],
        runways: &[RunwayConfiguration],
        now: DateTime<Utc>,
    ) -> SequenceSnapshot {
        let arrival_runways: Vec<&RunwayConfiguration> = runways
            .iter()
            .filter(|r| r.active && r.mode.handles_arrivals())
            .collect();
        let departure_runways: Vec<&RunwayConfiguration> = runways
            .iter()
            .filter(|r| r.active && r.mode.handles_departures())
            .collect();

        let arrivals = arrival_runways
            .iter()
            .map(|config| {
                let assigned = assigned_to(flights, config, &arrival_runways);
                self.aman.calculate_sequence(&assigned, config, now)
            })
            .collect();
        let departures = departure_runways
            .iter()
            .map(|config| {
                let assigned = assigned_to(flights, config, &departure_runways);
                self.dman.calculate_sequence(&assigned, config, now)
            })
            .collect();

        SequenceSnapshot {
            calculated_at: now,
            arrivals,
            departures,
        }
    }
}

fn assigned_to(
    flights: &[FlightRecord],
    config: &RunwayConfiguration,
    candidates: &[&RunwayConfiguration],
) -> Vec<FlightRecord> {
    let is_default = candidates
        .first()
        .is_some_and(|first| first.runway.eq_ignore_ascii_case(&config.runway));

    flights
        .iter()
        .filter(|f| match f.runway.as_deref() {
            Some(rwy) => rwy.eq_ignore_ascii_case(&config.runway),
            None => is_default,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airport::RunwayMode;
    use crate::fpl::parse;
    use chrono::{Duration, TimeZone};

    const FPL: &str = "(FPL-KAL123-IS-B738/M-SDE2E3FGHIJ1RWY/LB1-RKSI0900-N0450F350 DCT BOPTA-RJTT0200 RJAA-DOF/250101)";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    fn apply(set: &mut TrafficSet, gen: &mut StripGenerator, msg: &str) -> MessageOutcome {
        let plan = parse(msg).unwrap();
        set.apply_message(&plan, gen, StripOptions::default(), now())
            .unwrap()
    }

    #[test]
    fn message_lifecycle() {
        let mut set = TrafficSet::new();
        let mut gen = StripGenerator::new(1);

        let inserted = apply(&mut set, &mut gen, FPL);
        assert!(matches!(inserted, MessageOutcome::Inserted { .. }));
        let id = inserted.flight_id().unwrap().to_string();
        let squawk = set.get(&id).unwrap().squawk.clone();

        let updated = apply(
            &mut set,
            &mut gen,
            "(CHG-KAL123-IS-B77W/H-SDE2E3FGHIJ1RWY/LB1-RKSI0930-N0480F370 DCT-RJTT0200)",
        );
        assert_eq!(updated, MessageOutcome::Updated { flight_id: id.clone() });
        let record = set.get(&id).unwrap();
        assert_eq!(record.aircraft_type, "B77W");
        assert_eq!(record.cruise_altitude_ft, 37000);
        assert_eq!(record.squawk, squawk);
        assert_eq!(record.status(), FlightStatus::Filed);

        let departed = apply(&mut set, &mut gen, "(DEP-KAL123-RKSI0932-RJTT)");
        assert_eq!(
            departed,
            MessageOutcome::StatusChanged {
                flight_id: id.clone(),
                from: FlightStatus::Filed,
                to: FlightStatus::Departed
            }
        );

        let cancelled = apply(&mut set, &mut gen, "(CNL-KAL123-RKSI0900-RJTT)");
        assert_eq!(cancelled, MessageOutcome::Cancelled { flight_id: id });
        assert!(set.is_empty());

        let unknown = apply(&mut set, &mut gen, "(CNL-KAL123-RKSI0900-RJTT)");
        assert_eq!(
            unknown,
            MessageOutcome::UnknownCallsign {
                callsign: "KAL123".into()
            }
        );
    }

    #[test]
    fn unknown_reports_are_inserted_in_reported_status() {
        let mut set = TrafficSet::new();
        let mut gen = StripGenerator::new(1);
        apply(&mut set, &mut gen, "(DEP-JJA7-RKSI0912-RKPC)");
        apply(&mut set, &mut gen, "(ARR-AAR9-RJTT-RKSI1105)");
        assert_eq!(
            set.find_by_callsign("jja7").unwrap().status(),
            FlightStatus::Departed
        );
        assert_eq!(
            set.find_by_callsign("AAR9").unwrap().status(),
            FlightStatus::Landed
        );
    }

    #[test]
    fn backward_report_is_rejected() {
        let mut set = TrafficSet::new();
        let mut gen = StripGenerator::new(1);
        apply(&mut set, &mut gen, "(ARR-AAR9-RJTT-RKSI1105)");
        let plan = parse("(DEP-AAR9-RJTT0900-RKSI)").unwrap();
        let err = set
            .apply_message(&plan, &mut gen, StripOptions::default(), now())
            .unwrap_err();
        assert_eq!(err.from, FlightStatus::Landed);
        assert_eq!(err.to, FlightStatus::Departed);
    }

    fn departure(callsign: &str, runway: Option<&str>, tobt_min: i64) -> FlightRecord {
        let mut f = FlightRecord::new(callsign, "A320", FlightStatus::Filed, now());
        f.runway = runway.map(str::to_string);
        f.tobt = Some(now() + Duration::minutes(tobt_min));
        f
    }

    fn arrival(callsign: &str, runway: Option<&str>, eta_min: i64) -> FlightRecord {
        let mut f = FlightRecord::new(callsign, "A320", FlightStatus::InitialApproach, now());
        f.runway = runway.map(str::to_string);
        f.eta = Some(now() + Duration::minutes(eta_min));
        f
    }

    #[test]
    fn recompute_partitions_by_runway_and_mode() {
        let runways = [
            RunwayConfiguration::new("33L", RunwayMode::Arrival, 30),
            RunwayConfiguration::new("33R", RunwayMode::Departure, 30),
            RunwayConfiguration::new("34", RunwayMode::Mixed, 20),
        ];
        let flights = [
            arrival("AAR1", Some("33L"), 10),
            arrival("AAR2", None, 12),
            arrival("AAR3", Some("34"), 15),
            departure("KAL1", Some("33R"), 5),
            departure("KAL2", None, 6),
            departure("KAL3", Some("34"), 7),
            departure("KAL4", Some("15L"), 8),
        ];
        let snapshot = Sequencer::default().recompute(&flights, &runways, now());

        assert_eq!(snapshot.arrivals.len(), 2);
        assert_eq!(snapshot.departures.len(), 2);
        let l33: Vec<String> = snapshot
            .arrival_runway("33L")
            .unwrap()
            .flights
            .iter()
            .map(|f| f.callsign.clone())
            .collect();
        assert_eq!(l33, vec!["AAR1", "AAR2"]);

        let r34: Vec<String> = snapshot
            .arrival_runway("34")
            .unwrap()
            .flights
            .iter()
            .map(|f| f.callsign.clone())
            .collect();
        assert_eq!(r34, vec!["AAR3"]);

        let r33: Vec<String> = snapshot
            .departure_runway("33R")
            .unwrap()
            .flights
            .iter()
            .map(|f| f.callsign.clone())
            .collect();
        assert_eq!(r33, vec!["KAL1", "KAL2"]);

        let d34 = snapshot.departure_runway("34").unwrap();
        assert_eq!(d34.flights.len(), 1);
        assert_eq!(d34.flights[0].callsign, "KAL3");
    }

    #[test]
    fn recompute_is_deterministic() {
        let runways = [RunwayConfiguration::new("33L", RunwayMode::Mixed, 30)];
        let flights = [arrival("AAR1", None, 10), departure("KAL1", None, 5)];
        let sequencer = Sequencer::default();
        let first = sequencer.recompute(&flights, &runways, now());
        let second = sequencer.recompute(&flights, &runways, now());
        assert_eq!(first, second);

        let later = sequencer.recompute(&flights, &runways, now() + Duration::seconds(5));
        assert_ne!(first, later);
        assert!(first.same_order_as(&later));
    }

    #[test]
    fn inactive_runways_are_skipped() {
        let mut closed = RunwayConfiguration::new("33L", RunwayMode::Arrival, 30);
        closed.active = false;
        let snapshot =
            Sequencer::default().recompute(&[arrival("AAR1", None, 10)], &[closed], now());
        assert!(snapshot.arrivals.is_empty());
    }
}
