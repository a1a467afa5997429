//! Liveness endpoint for orchestrators and CI.
//!
//! Not to be confused with `/machines/{id}/health`, which reports machine
//! health. This route only proves the process answers HTTP; it never touches
//! the database.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Handle `GET /health`.
async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Subrouter with the `/health` route, generic over the gateway state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(liveness))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_liveness_body() {
        // ---
        let Json(body) = liveness().await;
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "codemetal-plantwatch");
    }
}
