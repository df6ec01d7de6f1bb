//! HTTP API exposing the reconciled snapshot.
//!
//! Response envelopes (`success`/`timestamp`/`count`/`data`) follow the
//! service's original wire contract so existing consumers keep working.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::models::Snapshot;
use crate::publisher::SupplyPublisher;
use crate::snapshot::{SnapshotError, SnapshotService};

#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<SnapshotService>,
    /// Absent when the publish loop is disabled by config.
    pub publisher: Option<Arc<SupplyPublisher>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/top100", get(top100))
        .route("/api/top100/refresh", post(refresh_top100))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let publisher = match &state.publisher {
        Some(publisher) => json!(publisher.status()),
        None => json!("disabled"),
    };

    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "cache": state.snapshots.cache_stats(),
        "publisher": publisher,
    }))
}

fn snapshot_envelope(snapshot: Snapshot) -> Json<Value> {
    Json(json!({
        "success": true,
        "timestamp": Utc::now().to_rfc3339(),
        "count": snapshot.len(),
        "data": snapshot,
    }))
}

fn snapshot_failure(err: SnapshotError) -> (StatusCode, Json<Value>) {
    error!(error = %err, "snapshot request failed");
    let status = match err {
        SnapshotError::AllSourcesUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(json!({
            "success": false,
            "error": err.to_string(),
        })),
    )
}

async fn top100(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let snapshot = state.snapshots.snapshot().await.map_err(snapshot_failure)?;
    Ok(snapshot_envelope(snapshot))
}

async fn refresh_top100(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let snapshot = state.snapshots.refresh().await.map_err(snapshot_failure)?;
    Ok(snapshot_envelope(snapshot))
}
