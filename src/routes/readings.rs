//! Reading ingestion endpoints.
//!
//! Every accepted reading passes through the anomaly detector before it is
//! stored, so the flag on a stored reading always reflects the history that
//! existed when it arrived.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{json_body, AppState, ErrorBody};
use crate::error::Result;
use crate::health::record_reading;
use crate::models::{NewReading, Reading};
use crate::store::EntityStore;
use crate::MonitorError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/readings", post(create))
        .route("/readings/log", post(log_by_code))
        .route("/readings/bulk", post(bulk))
}

/// `POST /readings`, machine referenced by id.
async fn create(
    State((store, _)): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>)> {
    // ---
    let payload = NewReading::from_json(json_body(payload)?)?;
    if payload.machine_id.is_none() {
        return Err(MonitorError::validation("machine_id", "is required"));
    }
    let reading = record_reading(&store, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// `POST /readings/log`, machine referenced by its code.
async fn log_by_code(
    State((store, _)): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>)> {
    // ---
    let payload = NewReading {
        machine_id: None,
        ..NewReading::from_json(json_body(payload)?)?
    };
    let reading = record_reading(&store, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// Items stay raw JSON so a malformed one fails alone.
#[derive(Debug, Deserialize)]
struct BulkRequest {
    readings: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct BulkError {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    machine_code: Option<String>,
    #[serde(flatten)]
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct BulkResponse {
    created: usize,
    failed: usize,
    readings: Vec<Reading>,
    errors: Vec<BulkError>,
}

/// Decode and record each item in order. Bad items are reported per index;
/// only a store failure aborts the batch.
async fn ingest_batch<S>(store: &S, items: Vec<Value>, now: DateTime<Utc>) -> Result<BulkResponse>
where
    S: EntityStore + ?Sized,
{
    // ---
    let mut readings = Vec::new();
    let mut errors = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        let machine_code = item
            .get("machine_code")
            .and_then(Value::as_str)
            .map(str::to_string);
        let outcome = match NewReading::from_json(item) {
            Ok(payload) => record_reading(store, payload, now).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(reading) => readings.push(reading),
            Err(err @ MonitorError::Store(_)) => return Err(err),
            Err(err) => errors.push(BulkError {
                index,
                machine_code,
                error: err.to_body(),
            }),
        }
    }

    Ok(BulkResponse {
        created: readings.len(),
        failed: errors.len(),
        readings,
        errors,
    })
}

/// `POST /readings/bulk`. 201 when anything was created, 400 otherwise.
async fn bulk(
    State((store, _)): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    // ---
    let request: BulkRequest = serde_json::from_value(json_body(payload)?)
        .map_err(|e| MonitorError::validation("readings", e.to_string()))?;
    let body = ingest_batch(&store, request.readings, Utc::now()).await?;

    info!(
        created = body.created,
        failed = body.failed,
        "bulk readings processed"
    );
    let status = if body.created == 0 {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(body)).into_response())
}
