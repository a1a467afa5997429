//! Per-machine health endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{json_body, AppState};
use crate::dashboard::{fleet_health, FleetHealth};
use crate::health::{
    classify_health, compute_health_score, detect_anomaly, health_report, status::HealthReport,
    AnomalyVerdict, HealthStatus, IsolationForest, ScoreResult,
};
use crate::models::NewReading;
use crate::MonitorError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/machines/dashboard", get(dashboard))
        .route("/machines/{id}/health", get(health))
        .route("/machines/{id}/health-status", get(health_status))
        .route("/machines/{id}/health-score", get(health_score))
        .route("/machines/{id}/anomaly-check", post(anomaly_check))
}

async fn dashboard(State((store, _)): State<AppState>) -> Result<Json<FleetHealth>, MonitorError> {
    Ok(Json(fleet_health(&store, Utc::now()).await?))
}

async fn health(
    Path(id): Path<Uuid>,
    State((store, _)): State<AppState>,
) -> Result<Json<HealthReport>, MonitorError> {
    // ---
    Ok(Json(health_report(&store, id, Utc::now()).await?))
}

#[derive(Serialize)]
struct HealthStatusResponse {
    machine_id: Uuid,
    health_status: HealthStatus,
}

async fn health_status(
    Path(id): Path<Uuid>,
    State((store, _)): State<AppState>,
) -> Result<Json<HealthStatusResponse>, MonitorError> {
    // ---
    let health_status = classify_health(&store, id, Utc::now()).await?;
    Ok(Json(HealthStatusResponse {
        machine_id: id,
        health_status,
    }))
}

/// A fresh model is fitted per request, bounded by the configured budget.
async fn health_score(
    Path(id): Path<Uuid>,
    State((store, config)): State<AppState>,
) -> Result<Json<ScoreResult>, MonitorError> {
    // ---
    let result = compute_health_score(
        &store,
        IsolationForest::default(),
        id,
        Utc::now(),
        config.health_score_timeout,
    )
    .await?;
    Ok(Json(result))
}

/// Evaluate metrics against the machine's baseline without storing them.
async fn anomaly_check(
    Path(id): Path<Uuid>,
    State((store, _)): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AnomalyVerdict>, MonitorError> {
    // ---
    let metrics = NewReading::from_json(json_body(payload)?)?.metrics;
    Ok(Json(detect_anomaly(&store, id, &metrics, Utc::now()).await?))
}
