//! Read-only REST API over the store.
//!
//! - `GET /latest-data`, `/historical-data`, `/alerts`
//! - `GET /efficiency-proof`, `/ml-prediction`, `/reports/latest`
//! - `POST /recalculate-efficiency`

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::config::MicrogridConfig;
use crate::store::Store;

pub use types::{ApiError, ErrorResponse};

/// State shared across all request handlers.
pub struct AppState {
    /// Backend every endpoint reads from.
    pub store: Arc<dyn Store + Send + Sync>,
    /// Configuration used when a handler reruns a job.
    pub config: MicrogridConfig,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/latest-data", get(handlers::latest_data))
        .route("/historical-data", get(handlers::historical_data))
        .route("/alerts", get(handlers::alerts))
        .route("/efficiency-proof", get(handlers::efficiency_proof))
        .route("/ml-prediction", get(handlers::ml_prediction))
        .route("/reports/latest", get(handlers::latest_report))
        .route("/recalculate-efficiency", post(handlers::recalculate_efficiency))
        .with_state(state)
}

/// Binds to `addr` and serves the API until Ctrl+C.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
