//! End-to-end traffic flow tests.
//!
//! Each test binds the router on an ephemeral port and drives it over HTTP.

use std::sync::Arc;
use std::time::Duration;

use atc_server::{api, config::Config, loops, state::AlertEvent, state::AppState};
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::time::timeout;

fn test_config() -> Config {
    Config {
        sim_seed: Some(11),
        sim_speed: 60.0,
        tick_ms: 10,
        ..Config::default()
    }
}

async fn spawn_server(state: Arc<AppState>) -> String {
    let app = api::routes().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn new_state() -> Arc<AppState> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
    Arc::new(AppState::with_start(test_config(), start))
}

#[tokio::test]
async fn message_to_sequence_over_http() {
    let state = new_state();
    let base = spawn_server(state.clone()).await;
    let client = Client::new();

    for (message, runway) in [
        ("(FPL-KAL101-IS-B738/M-S/C-RKSI0830-N0450F350 DCT-RJTT0200)", "33R"),
        ("(FPL-KAL202-IS-A320/M-S/C-RKSI0835-N0440F330 DCT-RKPC0100)", "33R"),
    ] {
        let resp = client
            .post(format!("{base}/v1/messages"))
            .json(&json!({ "message": message, "runway": runway }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    }

    let flights: Value = client
        .get(format!("{base}/v1/flights"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(flights.as_array().unwrap().len(), 2);

    let snapshot: Value = client
        .post(format!("{base}/v1/sequences/recompute"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let sequence = &snapshot["departures"][0]["flights"];
    assert_eq!(sequence[0]["callsign"], "KAL101");
    assert_eq!(sequence[1]["callsign"], "KAL202");
    assert_eq!(sequence[1]["sequence_position"], 2);
}

#[tokio::test]
async fn scenario_flights_are_released_by_ticks() {
    let state = new_state();
    let base = spawn_server(state.clone()).await;
    let client = Client::new();

    let resp = client
        .post(format!("{base}/v1/scenario"))
        .json(&json!({
            "id": "release",
            "name": "Release",
            "airport": "RKSI",
            "duration_minutes": 10,
            "flights": [
                { "callsign": "AAR7", "type": "ARRIVAL", "aircraft_type": "A321",
                  "scheduled_time": "+2", "runway": "33L", "gate": "231" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    assert_eq!(state.flight_count(), 0);

    // 60 simulated seconds per tick
    for _ in 0..2 {
        client
            .post(format!("{base}/v1/simulation/tick"))
            .send()
            .await
            .unwrap();
    }
    assert_eq!(state.flight_count(), 1);
    assert!(state.flight_by_callsign("AAR7").is_some());
}

#[tokio::test]
async fn safety_net_loop_publishes_alerts_and_stops() {
    let state = new_state();
    let message = "(FPL-JJA303-IS-B738/M-S/C-RKSI0900-N0450F350 DCT-RKPC0100)";
    let options = atc_core::StripOptions {
        runway: Some("33R".into()),
        ..Default::default()
    };
    let ingested = state.ingest_message(message, options).unwrap();
    let flight = ingested.flight.unwrap();
    let threshold = state.layout().runway("33R").unwrap().threshold;
    state.upsert_surface_position(atc_core::SurfacePosition {
        flight_id: flight.id.clone(),
        callsign: flight.callsign.clone(),
        position: threshold,
        heading_deg: 330.0,
        ground_speed_kt: 0.0,
        taxiway: None,
        runway: Some("33R".into()),
        on_runway: true,
    });

    let mut events = state.subscribe_alerts();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(loops::safety_net_loop::run_safety_net_loop(
        state.clone(),
        shutdown_rx,
    ));

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("alert within timeout")
        .unwrap();
    match event {
        AlertEvent::Raised(alert) => {
            assert_eq!(alert.involved_callsigns, vec!["JJA303".to_string()]);
        }
        other => panic!("unexpected event {other:?}"),
    }

    shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop stops on shutdown")
        .unwrap();
    assert_eq!(state.active_alerts().len(), 1);
}
