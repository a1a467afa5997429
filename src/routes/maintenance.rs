//! Work-order transitions and spare-part stock endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{json_body, AppState};
use crate::maintenance::{complete_work_order, low_stock, restock_part, start_work_order};
use crate::models::{SparePart, WorkOrder};
use crate::MonitorError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/work-orders/{id}/start", post(start))
        .route("/work-orders/{id}/complete", post(complete))
        .route("/parts/low-stock", get(low_stock_parts))
        .route("/parts/{id}/restock", post(restock))
}

async fn start(
    Path(id): Path<Uuid>,
    State((store, _)): State<AppState>,
) -> Result<Json<WorkOrder>, MonitorError> {
    Ok(Json(start_work_order(&store, id, Utc::now()).await?))
}

#[derive(Debug, Default, Deserialize)]
struct CompleteRequest {
    completion_notes: Option<String>,
}

/// The body is optional; a missing body completes without notes.
async fn complete(
    Path(id): Path<Uuid>,
    State((store, _)): State<AppState>,
    body: Option<Json<CompleteRequest>>,
) -> Result<Json<WorkOrder>, MonitorError> {
    // ---
    let Json(request) = body.unwrap_or_default();
    let order = complete_work_order(&store, id, request.completion_notes, Utc::now()).await?;
    Ok(Json(order))
}

async fn low_stock_parts(
    State((store, _)): State<AppState>,
) -> Result<Json<Vec<SparePart>>, MonitorError> {
    Ok(Json(low_stock(&store).await?))
}

#[derive(Debug, Deserialize)]
struct RestockRequest {
    quantity: i32,
}

async fn restock(
    Path(id): Path<Uuid>,
    State((store, _)): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SparePart>, MonitorError> {
    // ---
    let request: RestockRequest = serde_json::from_value(json_body(payload)?)
        .map_err(|e| MonitorError::validation("quantity", e.to_string()))?;
    let part = restock_part(&store, id, request.quantity, Utc::now()).await?;
    Ok(Json(part))
}
