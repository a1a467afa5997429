use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

use super::AppState;
use crate::dashboard::{dashboard_overview, DashboardOverview};
use crate::notifications::{build_notifications, NotificationFeed};
use crate::MonitorError;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/analytics/dashboard", get(dashboard))
        .route("/analytics/notifications", get(notifications))
}

async fn dashboard(
    State((store, _)): State<AppState>,
) -> Result<Json<DashboardOverview>, MonitorError> {
    Ok(Json(dashboard_overview(&store, Utc::now()).await?))
}

async fn notifications(
    State((store, _)): State<AppState>,
) -> Result<Json<NotificationFeed>, MonitorError> {
    Ok(Json(build_notifications(&store, Utc::now()).await?))
}
