//! Periodic AMAN/DMAN recompute.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_sequence_loop(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(Duration::from_secs(state.config().sequence_interval_secs));
    tracing::info!("Sequence loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Sequence loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let (snapshot, changed) = state.recompute_sequences();
                if !changed {
                    continue;
                }
                let arrivals: usize = snapshot.arrivals.iter().map(|s| s.flights.len()).sum();
                let departures: usize = snapshot.departures.iter().map(|s| s.flights.len()).sum();
                let violations = snapshot
                    .departures
                    .iter()
                    .flat_map(|s| s.violations())
                    .count();
                tracing::debug!(
                    "Sequences updated: {} arrival(s), {} departure(s), {} slot violation(s)",
                    arrivals,
                    departures,
                    violations
                );
            }
        }
    }
}
