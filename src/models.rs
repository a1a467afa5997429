//! Data models for machines, readings, spare parts and work orders.
//!
//! Health status and health score are not stored here: both are
//! recomputed from these records on every request (see `health`).

use std::{fmt, str::FromStr};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MonitorError, Result};

// ---

/// Raised when a status column holds a value no enum variant matches.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Operational status of a machine, as set by operators and work orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Operational,
    UnderMaintenance,
    Down,
    Decommissioned,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "OPERATIONAL",
            Self::UnderMaintenance => "UNDER_MAINTENANCE",
            Self::Down => "DOWN",
            Self::Decommissioned => "DECOMMISSIONED",
        }
    }
}

impl FromStr for MachineStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "OPERATIONAL" => Ok(Self::Operational),
            "UNDER_MAINTENANCE" => Ok(Self::UnderMaintenance),
            "DOWN" => Ok(Self::Down),
            "DECOMMISSIONED" => Ok(Self::Decommissioned),
            other => Err(UnknownVariant {
                kind: "machine status",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for WorkOrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(UnknownVariant {
                kind: "work order status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---

/// A tracked machine and its maintenance cadence.
#[derive(Debug, Clone, Serialize)]
pub struct Machine {
    // ---
    pub id: Uuid,
    pub machine_code: String,
    pub machine_name: String,
    pub machine_type: String,
    pub location: String,
    pub status: MachineStatus,
    pub maintenance_frequency_days: i32,
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
}

impl Machine {
    // ---
    /// Next due date for a maintenance performed on `last`.
    pub fn next_maintenance_after(&self, last: NaiveDate) -> NaiveDate {
        // ---
        let days = u64::try_from(self.maintenance_frequency_days).unwrap_or(0);
        last.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
    }

    /// Signed day distance from `today` to the next due date.
    pub fn days_until_maintenance(&self, today: NaiveDate) -> Option<i64> {
        self.next_maintenance_date
            .map(|next| (next - today).num_days())
    }
}

/// The three numeric channels a reading may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Metrics {
    // ---
    pub temperature: Option<f64>,
    pub vibration_level: Option<f64>,
    pub oil_pressure: Option<f64>,
}

/// A stored sensor reading. Append-only; the anomaly flag is set once at
/// creation and never revised.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub machine_id: Uuid,
    #[sqlx(rename = "recorded_at")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub metrics: Metrics,
    pub runtime_hours: Option<i32>,
    pub notes: String,
    pub is_anomaly: bool,
    pub anomaly_reason: String,
}

/// Everything the store needs to append a reading.
#[derive(Debug, Clone)]
pub struct ReadingRecord {
    // ---
    pub machine_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub metrics: Metrics,
    pub runtime_hours: Option<i32>,
    pub notes: String,
    pub is_anomaly: bool,
    pub anomaly_reason: String,
}

/// An anomalous reading joined with the machine it belongs to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnomalyRecord {
    // ---
    pub reading_id: Uuid,
    pub machine_code: String,
    pub anomaly_reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SparePart {
    // ---
    pub id: Uuid,
    pub part_code: String,
    pub part_name: String,
    pub quantity_in_stock: i32,
    pub minimum_stock_level: i32,
    pub updated_at: DateTime<Utc>,
}

impl SparePart {
    /// At or below the minimum counts as low, not only below it.
    pub fn is_low_stock(&self) -> bool {
        self.quantity_in_stock <= self.minimum_stock_level
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkOrder {
    // ---
    pub id: Uuid,
    pub work_order_code: String,
    pub machine_id: Uuid,
    /// Joined from the owning machine for display.
    pub machine_code: String,
    pub title: String,
    pub status: WorkOrderStatus,
    pub scheduled_date: NaiveDate,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: String,
}

impl WorkOrder {
    pub fn is_pending_and_due(&self, today: NaiveDate) -> bool {
        self.status == WorkOrderStatus::Pending && self.scheduled_date <= today
    }
}

// ---

/// Incoming reading payload. The machine may be referenced by id or by its
/// human-readable code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReading {
    // ---
    pub machine_id: Option<Uuid>,
    pub machine_code: Option<String>,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub runtime_hours: Option<i32>,
    pub notes: Option<String>,
}

/// Checks one JSON field against the type the payload expects for it.
fn field_type_error<T: serde::de::DeserializeOwned>(
    body: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Option<MonitorError> {
    // ---
    let value = body.get(field)?.clone();
    serde_json::from_value::<Option<T>>(value)
        .err()
        .map(|e| MonitorError::validation(field, e.to_string()))
}

impl NewReading {
    // ---
    /// Decode a JSON payload, naming the offending field when a value has the
    /// wrong type.
    pub fn from_json(body: serde_json::Value) -> Result<Self> {
        // ---
        let Some(fields) = body.as_object() else {
            return Err(MonitorError::validation("body", "expected a JSON object"));
        };
        let typed = field_type_error::<Uuid>(fields, "machine_id")
            .or_else(|| field_type_error::<String>(fields, "machine_code"))
            .or_else(|| field_type_error::<f64>(fields, "temperature"))
            .or_else(|| field_type_error::<f64>(fields, "vibration_level"))
            .or_else(|| field_type_error::<f64>(fields, "oil_pressure"))
            .or_else(|| field_type_error::<i32>(fields, "runtime_hours"))
            .or_else(|| field_type_error::<String>(fields, "notes"));
        if let Some(err) = typed {
            return Err(err);
        }
        serde_json::from_value(body).map_err(|e| MonitorError::validation("body", e.to_string()))
    }

    /// Check the payload before anything touches the store.
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.machine_id.is_none()
            && self.machine_code.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(MonitorError::validation(
                "machine_id",
                "either machine_id or machine_code is required",
            ));
        }

        let channels = [
            ("temperature", self.metrics.temperature),
            ("vibration_level", self.metrics.vibration_level),
            ("oil_pressure", self.metrics.oil_pressure),
        ];
        for (field, value) in channels {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(MonitorError::validation(field, "must be a finite number"));
            }
        }

        if self.runtime_hours.is_some_and(|h| h < 0) {
            return Err(MonitorError::validation(
                "runtime_hours",
                "must not be negative",
            ));
        }

        Ok(())
    }
}
