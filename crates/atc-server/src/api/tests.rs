use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{api, config::Config, state::AppState};

const FPL: &str =
    "(FPL-KAL123-IS-B738/M-SDE2E3FGHIJ1RWY/LB1-RKSI0900-N0450F350 DCT BOPTA-RJTT0200 RJAA)";

fn setup_app() -> (axum::Router, Arc<AppState>) {
    let config = Config {
        sim_seed: Some(7),
        ..Config::default()
    };
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
    let state = Arc::new(AppState::with_start(config, start));
    let app = api::routes().with_state(state.clone());
    (app, state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn submit(app: &axum::Router, message: &str, runway: &str) -> Value {
    let res = app
        .clone()
        .oneshot(post(
            "/v1/messages",
            json!({ "message": message, "runway": runway }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    read_json(res).await
}

#[tokio::test]
async fn health_check() {
    let (app, _state) = setup_app();
    let res = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_and_fetch_flight() {
    let (app, state) = setup_app();
    let body = submit(&app, FPL, "33R").await;
    assert_eq!(body["outcome"]["outcome"], "inserted");
    assert_eq!(body["flight"]["status"], "FILED");
    assert_eq!(body["flight"]["runway"], "33R");
    let id = body["outcome"]["flight_id"].as_str().unwrap().to_string();
    assert_eq!(state.flight_count(), 1);

    let res = app.clone().oneshot(get(&format!("/v1/flights/{id}"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["callsign"], "KAL123");

    let res = app.clone().oneshot(get("/v1/flights/missing")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .clone()
        .oneshot(post("/v1/messages", json!({ "message": "(CNL-KAL123-RKSI0900-RJTT)" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["outcome"]["outcome"], "cancelled");

    let res = app.oneshot(get("/v1/flights")).await.unwrap();
    assert_eq!(read_json(res).await, json!([]));
}

#[tokio::test]
async fn malformed_message_is_unprocessable() {
    let (app, state) = setup_app();
    let res = app
        .oneshot(post("/v1/messages", json!({ "message": "(XYZ-KAL1)" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(read_json(res).await["error"].is_string());
    assert_eq!(state.flight_count(), 0);
}

#[tokio::test]
async fn validate_reports_defects() {
    let (app, state) = setup_app();
    let res = app
        .oneshot(post(
            "/v1/messages/validate",
            json!({ "message": "(FPL-KAL1-IS-B738/X-S/C-RKSI0900-N0450F350 DCT-RJTT0200)" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["defects"][0]["defect"], "invalid_wake_category");
    assert_eq!(state.flight_count(), 0);
}

#[tokio::test]
async fn clearance_and_readback() {
    let (app, _state) = setup_app();
    let body = submit(&app, FPL, "33R").await;
    let id = body["outcome"]["flight_id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(post(
            &format!("/v1/flights/{id}/clearances"),
            json!({ "type": "TAXI", "value": "A C RWY33R", "issued_by": "GND" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let clearance = read_json(res).await;
    assert_eq!(clearance["readback_received"], false);
    let clearance_id = clearance["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(post(
            &format!("/v1/flights/{id}/clearances/{clearance_id}/readback"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["readback_received"], true);

    let res = app
        .clone()
        .oneshot(post(
            &format!("/v1/flights/{id}/annotations"),
            json!({ "content": "VIP", "created_by": "DEL" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app.oneshot(get(&format!("/v1/flights/{id}"))).await.unwrap();
    let flight = read_json(res).await;
    assert_eq!(flight["clearances"].as_array().unwrap().len(), 1);
    assert_eq!(flight["annotations"][0]["content"], "VIP");
}

#[tokio::test]
async fn runway_occupancy_raises_one_cmac_alert() {
    let (app, state) = setup_app();
    submit(&app, FPL, "33R").await;
    let threshold = state.layout().runway("33R").unwrap().threshold;

    let res = app
        .clone()
        .oneshot(post(
            "/v1/surface",
            json!([
                { "callsign": "KAL123", "position": threshold, "runway": "33R" },
                { "callsign": "GHOST1", "position": threshold }
            ]),
        ))
        .await
        .unwrap();
    let body = read_json(res).await;
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["unknown"], json!(["GHOST1"]));

    let mut events = state.subscribe_alerts();
    let res = app.clone().oneshot(post("/v1/alerts/check", json!({}))).await.unwrap();
    let raised = read_json(res).await;
    assert_eq!(raised.as_array().unwrap().len(), 1);
    assert_eq!(raised[0]["type"], "CMAC");
    assert_eq!(raised[0]["severity"], "CRITICAL");
    assert_eq!(raised[0]["involved_callsigns"], json!(["KAL123"]));
    assert!(events.try_recv().is_ok());

    let res = app.clone().oneshot(post("/v1/alerts/check", json!({}))).await.unwrap();
    assert_eq!(read_json(res).await, json!([]));

    let alert_id = raised[0]["id"].as_str().unwrap().to_string();
    let res = app
        .clone()
        .oneshot(post(
            &format!("/v1/alerts/{alert_id}/acknowledge"),
            json!({ "by": "TWR" }),
        ))
        .await
        .unwrap();
    assert_eq!(read_json(res).await["acknowledged"]["by"], "TWR");

    let res = app
        .clone()
        .oneshot(post(&format!("/v1/alerts/{alert_id}/resolve"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["resolved"], true);

    let res = app
        .clone()
        .oneshot(post(&format!("/v1/alerts/{alert_id}/resolve"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app.oneshot(get("/v1/alerts")).await.unwrap();
    assert_eq!(read_json(res).await, json!([]));
}

#[tokio::test]
async fn sequences_are_computed_on_demand() {
    let (app, _state) = setup_app();
    submit(&app, FPL, "33R").await;

    let res = app.clone().oneshot(get("/v1/sequences")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let snapshot = read_json(res).await;
    let departures = snapshot["departures"].as_array().unwrap();
    assert_eq!(departures.len(), 1);
    assert_eq!(departures[0]["runway"], "33R");
    assert_eq!(departures[0]["flights"][0]["callsign"], "KAL123");
    assert_eq!(snapshot["arrivals"][0]["runway"], "33L");

    let res = app
        .oneshot(post("/v1/sequences/recompute", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tick_advances_simulated_time() {
    let (app, state) = setup_app();
    let before = state.now();
    let res = app.oneshot(post("/v1/simulation/tick", json!({}))).await.unwrap();
    let body = read_json(res).await;
    assert_eq!(body["changes"], json!([]));
    assert_eq!(state.now(), before + chrono::Duration::seconds(1));
}

#[tokio::test]
async fn scenario_load() {
    let (app, state) = setup_app();
    let scenario = json!({
        "id": "morning",
        "name": "Morning push",
        "airport": "RKSI",
        "duration_minutes": 30,
        "flights": [
            { "callsign": "KAL1", "type": "DEPARTURE", "aircraft_type": "B738",
              "scheduled_time": "+0", "runway": "33R", "gate": "101" },
            { "callsign": "AAR2", "type": "ARRIVAL", "aircraft_type": "A321",
              "scheduled_time": "+15", "runway": "33L", "gate": "231" }
        ]
    });
    let res = app.clone().oneshot(post("/v1/scenario", scenario)).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let summary = read_json(res).await;
    assert_eq!(summary["immediate"], 1);
    assert_eq!(summary["pending"], 1);
    assert_eq!(state.flight_count(), 1);

    let bad = json!({
        "id": "bad", "name": "Bad", "airport": "RKSI", "duration_minutes": 10,
        "flights": [
            { "callsign": "KAL1", "type": "DEPARTURE", "aircraft_type": "B738",
              "scheduled_time": "soon", "runway": "33R", "gate": "101" }
        ]
    });
    let res = app.oneshot(post("/v1/scenario", bad)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn clearance_expiry_out_of_range_is_rejected() {
    let (app, _state) = setup_app();
    let body = submit(&app, FPL, "33R").await;
    let id = body["outcome"]["flight_id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(post(
            &format!("/v1/flights/{id}/clearances"),
            json!({ "type": "TAXI", "value": "A", "issued_by": "GND",
                    "expires_in_secs": 9_223_372_036_854_775_i64 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(post(
            &format!("/v1/flights/{id}/clearances"),
            json!({ "type": "TAXI", "value": "A", "issued_by": "GND", "expires_in_secs": 300 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(read_json(res).await["expires_at"].is_string());
}

#[tokio::test]
async fn cancelled_flight_leaves_the_surface_picture() {
    let (app, state) = setup_app();
    submit(&app, "(FPL-KAL1-IS-B738/M-S/C-RKSI0900-N0450F350 DCT-RJTT0200)", "33L").await;
    submit(&app, "(FPL-AAR2-IS-A321/M-S/C-RKSI0905-N0440F330 DCT-RKPC0100)", "33L").await;
    let threshold = state.layout().runway("33L").unwrap().threshold;

    let res = app
        .clone()
        .oneshot(post(
            "/v1/surface",
            json!([
                { "callsign": "KAL1", "position": threshold, "runway": "33L" },
                { "callsign": "AAR2", "position": threshold, "runway": "33L" }
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(read_json(res).await["accepted"], 2);

    let res = app
        .clone()
        .oneshot(post("/v1/messages", json!({ "message": "(CNL-AAR2-RKSI0905-RKPC)" })))
        .await
        .unwrap();
    assert_eq!(read_json(res).await["outcome"]["outcome"], "cancelled");
    assert_eq!(state.flight_count(), 1);
    assert_eq!(state.surface_positions().len(), 1);

    let res = app.oneshot(post("/v1/alerts/check", json!({}))).await.unwrap();
    let raised = read_json(res).await;
    for alert in raised.as_array().unwrap() {
        assert_ne!(alert["type"], "RIMCAS");
        assert!(!alert["involved_callsigns"]
            .as_array()
            .unwrap()
            .contains(&json!("AAR2")));
    }
}

#[tokio::test]
async fn positions_without_a_flight_are_ignored() {
    let (_app, state) = setup_app();
    let threshold = state.layout().runway("33R").unwrap().threshold;
    for (id, callsign) in [("gone-1", "GONE1"), ("gone-2", "GONE2")] {
        state.upsert_surface_position(atc_core::SurfacePosition {
            flight_id: id.into(),
            callsign: callsign.into(),
            position: threshold,
            heading_deg: 330.0,
            ground_speed_kt: 0.0,
            taxiway: None,
            runway: Some("33R".into()),
            on_runway: true,
        });
    }
    assert!(state.check_safety_nets().is_empty());
}

#[tokio::test]
async fn departed_and_parked_flights_drop_their_position() {
    let config = Config {
        sim_seed: Some(7),
        sim_speed: 10_000.0,
        ..Config::default()
    };
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
    let state = AppState::with_start(config, start);
    let options = atc_core::StripOptions {
        runway: Some("33L".into()),
        ..Default::default()
    };

    let departure = state
        .ingest_message("(FPL-KAL1-IS-B738/M-S/C-RKSI0900-N0450F350 DCT-RJTT0200)", options.clone())
        .unwrap()
        .flight
        .unwrap();
    let arrival = state
        .ingest_message("(ARR-AAR9-RJTT-RKSI0805)", options)
        .unwrap()
        .flight
        .unwrap();
    let threshold = state.layout().runway("33L").unwrap().threshold;
    for flight in [&departure, &arrival] {
        state.upsert_surface_position(atc_core::SurfacePosition {
            flight_id: flight.id.clone(),
            callsign: flight.callsign.clone(),
            position: threshold,
            heading_deg: 330.0,
            ground_speed_kt: 0.0,
            taxiway: None,
            runway: Some("33L".into()),
            on_runway: true,
        });
    }

    state
        .ingest_message("(DEP-KAL1-RKSI0900-RJTT)", Default::default())
        .unwrap();
    assert_eq!(state.surface_positions().len(), 1);

    for _ in 0..10 {
        state.tick();
    }
    assert_eq!(
        state.flight(&arrival.id).unwrap().status(),
        atc_core::FlightStatus::AtGate
    );
    assert!(state.surface_positions().is_empty());
}

#[tokio::test]
async fn resolving_one_alert_keeps_other_resolutions_queued() {
    let (app, state) = setup_app();
    submit(&app, "(FPL-KAL1-IS-B738/M-S/C-RKSI0900-N0450F350 DCT-RJTT0200)", "33R").await;
    submit(&app, "(FPL-AAR2-IS-A321/M-S/C-RKSI0905-N0440F330 DCT-RKPC0100)", "33L").await;
    let r33r = state.layout().runway("33R").unwrap().threshold;
    let r33l = state.layout().runway("33L").unwrap().threshold;
    app.clone()
        .oneshot(post(
            "/v1/surface",
            json!([
                { "callsign": "KAL1", "position": r33r, "runway": "33R" },
                { "callsign": "AAR2", "position": r33l, "runway": "33L" }
            ]),
        ))
        .await
        .unwrap();

    let raised = state.check_safety_nets();
    assert_eq!(raised.len(), 2);

    let first = state.resolve_alert(&raised[0].id).unwrap();
    assert!(first.resolved);
    let second = state.resolve_alert(&raised[1].id).unwrap();
    assert_eq!(second.id, raised[1].id);

    let drained: Vec<String> = state.take_resolved_alerts().into_iter().map(|a| a.id).collect();
    assert_eq!(drained, vec![raised[0].id.clone(), raised[1].id.clone()]);
    assert!(state.take_resolved_alerts().is_empty());
}
