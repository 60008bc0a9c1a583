//! ATC Server - airport traffic decision-support backend

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atc_core::TrafficScenario;
use atc_server::{api, config::Config, loops, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("atc_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting ATC Server...");

    let config = Config::from_env();
    let port = config.server_port;
    let scenario_path = config.scenario_path.clone();
    let state = Arc::new(AppState::new(config));
    tracing::info!(
        "Airport {} with {} runway configuration(s)",
        state.config().airport,
        state.runway_configurations().len()
    );

    if let Some(path) = scenario_path {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("reading scenario {path}"))?;
        let scenario = TrafficScenario::from_json(&json)
            .with_context(|| format!("parsing scenario {path}"))?;
        let summary = state.load_scenario(&scenario)?;
        tracing::info!(
            "Loaded scenario {}: {} active, {} pending",
            summary.name,
            summary.immediate,
            summary.pending
        );
    }

    // Start background loops
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let handles = vec![
        tokio::spawn(loops::simulation_loop::run_simulation_loop(
            state.clone(),
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(loops::sequence_loop::run_sequence_loop(
            state.clone(),
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(loops::safety_net_loop::run_safety_net_loop(
            state.clone(),
            shutdown_tx.subscribe(),
        )),
    ];

    // Build the app
    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(());
    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("ATC Server stopped");

    Ok(())
}
