//! Integration tests for the REST API over a store filled by the demo
//! pipeline.

#![cfg(feature = "api")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use microgrid_sim::api::{AppState, router};
use microgrid_sim::config::MicrogridConfig;
use microgrid_sim::jobs;
use microgrid_sim::store::MemoryStore;

fn demo_state(ticks: u64) -> Arc<AppState> {
    let config = MicrogridConfig::small_battery();
    let store = MemoryStore::new();
    jobs::demo(&config, &store, ticks, common::noon()).unwrap();
    Arc::new(AppState {
        store: Arc::new(store),
        config,
    })
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn every_read_endpoint_answers_after_demo() {
    let state = demo_state(150);
    for uri in [
        "/latest-data",
        "/historical-data",
        "/alerts",
        "/efficiency-proof",
        "/ml-prediction",
        "/reports/latest",
    ] {
        let (status, _) = get(Arc::clone(&state), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn latest_data_matches_last_tick() {
    let (_, json) = get(demo_state(10), "/latest-data").await;
    assert_eq!(json["timestamp"], "2024-06-03T12:00:45");
}

#[tokio::test]
async fn report_is_missing_below_minimum_history() {
    let (status, json) = get(demo_state(20), "/reports/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn unknown_route_is_404() {
    let req = Request::builder()
        .uri("/nope")
        .body(Body::empty())
        .unwrap();
    let resp = router(demo_state(1)).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
