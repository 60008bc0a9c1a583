//! Continuous safety-net evaluation.
//!
//! New alerts are logged by the engine and fanned out through
//! `AppState::subscribe_alerts`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_safety_net_loop(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(Duration::from_secs(state.config().safety_interval_secs));
    tracing::info!("Safety net loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Safety net loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let raised = state.check_safety_nets();
                if !raised.is_empty() {
                    tracing::debug!(
                        "{} new alert(s), {} active",
                        raised.len(),
                        state.active_alerts().len()
                    );
                }
            }
        }
    }
}
