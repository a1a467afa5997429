//! Route gateway.
//!
//! Each sibling module exports a subrouter; this module merges them, binds the
//! shared `(PgStore, Config)` state and maps [`MonitorError`] onto HTTP
//! responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::{Config, MonitorError, PgStore};

mod analytics;
mod health;
mod machines;
mod maintenance;
mod readings;

// ---

pub type AppState = (PgStore, Config);

pub fn router(store: PgStore, config: Config) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(machines::router())
        .merge(analytics::router())
        .merge(maintenance::router())
        .merge(health::router())
        .with_state((store, config))
}

/// JSON error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

/// Unwrap a JSON body, reporting an unreadable one as a validation error on
/// `body` instead of axum's plain-text rejection.
pub fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, MonitorError> {
    // ---
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| MonitorError::validation("body", rejection.body_text()))
}

impl MonitorError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Store(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        // ---
        let field = match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        };
        // Store and task details stay in the log.
        let error = match self {
            Self::Store(_) | Self::Task(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorBody { error, field }
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}
