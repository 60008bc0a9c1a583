//! Simulation clock loop.
//!
//! Ticks the simulated clock at a fixed wall-clock interval. Ticks are
//! serialized through the clock lock in `AppState`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_simulation_loop(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let tick_ms = state.config().tick_ms;
    let mut ticker = interval(Duration::from_millis(tick_ms));
    tracing::info!(
        "Simulation loop started ({} ms/tick, speed {}x)",
        tick_ms,
        state.config().sim_speed
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Simulation loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let changes = state.tick();
                if !changes.is_empty() {
                    tracing::debug!("Tick advanced {} flight(s)", changes.len());
                }
            }
        }
    }
}
