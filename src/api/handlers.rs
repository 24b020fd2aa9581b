//! Request handlers for the API endpoints.
//!
//! Store calls block, so every handler hops onto the blocking pool first.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use super::types::ApiError;
use crate::analytics::EfficiencyProof;
use crate::jobs;
use crate::rules::Alert;
use crate::store;
use crate::telemetry::{Reading, decode_readings};

/// Readings returned by `/historical-data`.
pub const HISTORY_LIMIT: usize = 100;
/// Alerts returned by `/alerts`.
pub const ALERT_LIMIT: usize = 50;

async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
}

/// `GET /latest-data` → newest reading, 404 when none.
pub async fn latest_data(State(state): State<Arc<AppState>>) -> Result<Json<Reading>, ApiError> {
    blocking(&state, |s| {
        let last = s
            .store
            .query_last(store::LIVE_DATA, store::TIMESTAMP_FIELD, 1)?;
        decode_readings(last.values())
            .readings
            .pop()
            .ok_or_else(|| ApiError::not_found("reading"))
    })
    .await
    .map(Json)
}

/// `GET /historical-data` → last 100 readings, oldest first.
pub async fn historical_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    blocking(&state, |s| {
        let last = s
            .store
            .query_last(store::LIVE_DATA, store::TIMESTAMP_FIELD, HISTORY_LIMIT)?;
        Ok(decode_readings(last.values()).readings)
    })
    .await
    .map(Json)
}

/// `GET /alerts` → last 50 alerts, newest first.
pub async fn alerts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Alert>>, ApiError> {
    blocking(&state, |s| {
        let last = s
            .store
            .query_last(store::ALERTS, store::TIMESTAMP_FIELD, ALERT_LIMIT)?;
        let mut alerts: Vec<Alert> = last
            .values()
            .filter_map(|v| Alert::deserialize(v).ok())
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(alerts)
    })
    .await
    .map(Json)
}

fn stored(state: &AppState, path: &'static str, what: &str) -> Result<Value, ApiError> {
    state
        .store
        .get(path)?
        .ok_or_else(|| ApiError::not_found(what))
}

/// `GET /efficiency-proof`
pub async fn efficiency_proof(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    blocking(&state, |s| stored(s, store::EFFICIENCY_PROOF, "efficiency proof"))
        .await
        .map(Json)
}

/// `GET /ml-prediction`
pub async fn ml_prediction(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    blocking(&state, |s| stored(s, store::PREDICTIONS, "prediction"))
        .await
        .map(Json)
}

/// `GET /reports/latest`
pub async fn latest_report(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    blocking(&state, |s| stored(s, store::LATEST_REPORT, "report"))
        .await
        .map(Json)
}

/// `POST /recalculate-efficiency` → reruns the efficiency job and returns
/// the fresh proof.
pub async fn recalculate_efficiency(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EfficiencyProof>, ApiError> {
    blocking(&state, |s| {
        jobs::run_efficiency(&s.config, s.store.as_ref(), jobs::now()).map_err(ApiError::from)
    })
    .await
    .map(Json)
}
