//! Builders for test records.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    Machine, MachineStatus, Metrics, Reading, SparePart, WorkOrder, WorkOrderStatus,
};

pub fn machine(code: &str, next_maintenance: Option<NaiveDate>) -> Machine {
    Machine {
        id: Uuid::new_v4(),
        machine_code: code.to_string(),
        machine_name: format!("{code} press"),
        machine_type: "Hydraulic press".to_string(),
        location: "Hall B".to_string(),
        status: MachineStatus::Operational,
        maintenance_frequency_days: 45,
        last_maintenance_date: None,
        next_maintenance_date: next_maintenance,
    }
}

pub fn temperature(value: f64) -> Metrics {
    Metrics {
        temperature: Some(value),
        ..Metrics::default()
    }
}

pub fn reading(machine_id: Uuid, at: DateTime<Utc>, metrics: Metrics) -> Reading {
    Reading {
        id: Uuid::new_v4(),
        machine_id,
        timestamp: at,
        metrics,
        runtime_hours: None,
        notes: String::new(),
        is_anomaly: false,
        anomaly_reason: String::new(),
    }
}

pub fn anomalous_reading(machine_id: Uuid, at: DateTime<Utc>, reason: &str) -> Reading {
    Reading {
        is_anomaly: true,
        anomaly_reason: reason.to_string(),
        ..reading(machine_id, at, temperature(120.0))
    }
}

pub fn part(code: &str, quantity: i32, minimum: i32, updated_at: DateTime<Utc>) -> SparePart {
    SparePart {
        id: Uuid::new_v4(),
        part_code: code.to_string(),
        part_name: format!("{code} filter"),
        quantity_in_stock: quantity,
        minimum_stock_level: minimum,
        updated_at,
    }
}

pub fn work_order(code: &str, machine: &Machine, scheduled: NaiveDate) -> WorkOrder {
    WorkOrder {
        id: Uuid::new_v4(),
        work_order_code: code.to_string(),
        machine_id: machine.id,
        machine_code: machine.machine_code.clone(),
        title: "Replace seals".to_string(),
        status: WorkOrderStatus::Pending,
        scheduled_date: scheduled,
        started_at: None,
        completed_at: None,
        completion_notes: String::new(),
    }
}

/// A fixed instant so day arithmetic in tests is stable.
pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}
