//! Entity store gateway.
//!
//! The health pipeline only talks to [`EntityStore`]. The service binary
//! wires in [`PgStore`]; unit tests use the in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AnomalyRecord, Machine, MachineStatus, Reading, ReadingRecord, SparePart, WorkOrder,
    WorkOrderStatus,
};

#[cfg(test)]
pub mod fixtures;
#[cfg(test)]
mod memory;
mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

/// Inclusive date bounds; an open side is unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from)
            && self.until.map_or(true, |until| date <= until)
    }
}

/// Filter for machine listings. A maintenance range excludes machines with
/// no scheduled maintenance.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachineFilter {
    pub status: Option<MachineStatus>,
    pub maintenance_due: Option<DateRange>,
}

impl MachineFilter {
    pub fn matches(&self, machine: &Machine) -> bool {
        // ---
        let status_ok = self.status.map_or(true, |s| machine.status == s);
        let due_ok = match self.maintenance_due {
            None => true,
            Some(range) => machine
                .next_maintenance_date
                .is_some_and(|next| range.contains(next)),
        };
        status_ok && due_ok
    }
}

/// Machine side of a work-order transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineChange {
    pub machine_id: Uuid,
    pub status: MachineStatus,
    /// `(last, next)` maintenance dates; `next` is always derived from `last`.
    pub maintenance: Option<(NaiveDate, NaiveDate)>,
}

/// Readings of one machine since a point in time, newest first.
#[derive(Debug, Clone, Copy)]
pub struct ReadingQuery {
    pub machine_id: Uuid,
    pub since: DateTime<Utc>,
    pub exclude_anomalous: bool,
    pub limit: Option<i64>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    // machines
    async fn find_machine(&self, id: Uuid) -> Result<Option<Machine>>;
    async fn find_machine_by_code(&self, code: &str) -> Result<Option<Machine>>;
    async fn machines_by_filter(&self, filter: &MachineFilter) -> Result<Vec<Machine>>;

    // readings
    async fn readings_by_machine(&self, query: &ReadingQuery) -> Result<Vec<Reading>>;
    async fn has_anomaly_since(&self, machine_id: Uuid, since: DateTime<Utc>) -> Result<bool>;
    async fn count_anomalies(&self, machine_id: Uuid) -> Result<i64>;
    /// Anomalous readings of every machine since `since`, newest first.
    async fn recent_anomalies(&self, since: DateTime<Utc>) -> Result<Vec<AnomalyRecord>>;
    async fn create_reading(&self, record: &ReadingRecord) -> Result<Reading>;

    // spare parts
    async fn low_stock_parts(&self) -> Result<Vec<SparePart>>;
    async fn find_part(&self, id: Uuid) -> Result<Option<SparePart>>;
    async fn restock_part(&self, id: Uuid, quantity: i32, at: DateTime<Utc>) -> Result<SparePart>;

    // work orders
    /// Work orders in `status`, optionally only those scheduled on or before a date.
    async fn work_orders_by_status_and_date(
        &self,
        status: WorkOrderStatus,
        scheduled_on_or_before: Option<NaiveDate>,
    ) -> Result<Vec<WorkOrder>>;
    async fn find_work_order(&self, id: Uuid) -> Result<Option<WorkOrder>>;
    /// Persist `order` and apply `machine` in one unit: either both are
    /// written or neither is.
    async fn transition_work_order(&self, order: &WorkOrder, machine: &MachineChange)
        -> Result<()>;
}
