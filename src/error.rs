//! Typed errors for the health pipeline and the entity store.
//!
//! Startup plumbing (`main`, `config`, `schema`) stays on `anyhow`; anything a
//! request can hit returns [`MonitorError`] so the route layer can map it to a
//! status code.

use uuid::Uuid;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0}")]
    InvalidTransition(String),

    #[error("health score computation exceeded {0:?}")]
    Timeout(std::time::Duration),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl MonitorError {
    pub fn machine_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "machine",
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
