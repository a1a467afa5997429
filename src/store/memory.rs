//! In-memory [`EntityStore`] used by unit tests.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::{EntityStore, MachineChange, MachineFilter, ReadingQuery};
use crate::error::{MonitorError, Result};
use crate::models::{
    AnomalyRecord, Machine, Reading, ReadingRecord, SparePart, WorkOrder, WorkOrderStatus,
};

#[derive(Debug, Default)]
struct Tables {
    machines: Vec<Machine>,
    readings: Vec<Reading>,
    parts: Vec<SparePart>,
    work_orders: Vec<WorkOrder>,
    fail_transitions: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }

    pub fn insert_machine(&self, machine: Machine) {
        self.lock().machines.push(machine);
    }

    pub fn insert_reading(&self, reading: Reading) {
        self.lock().readings.push(reading);
    }

    pub fn insert_part(&self, part: SparePart) {
        self.lock().parts.push(part);
    }

    pub fn insert_work_order(&self, order: WorkOrder) {
        self.lock().work_orders.push(order);
    }

    /// Make every work-order transition fail with a store error.
    pub fn set_fail_transitions(&self, fail: bool) {
        self.lock().fail_transitions = fail;
    }

    pub fn work_order(&self, id: Uuid) -> Option<WorkOrder> {
        self.lock().work_orders.iter().find(|o| o.id == id).cloned()
    }

    pub fn machine(&self, id: Uuid) -> Option<Machine> {
        self.lock().machines.iter().find(|m| m.id == id).cloned()
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.lock().readings.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_machine(&self, id: Uuid) -> Result<Option<Machine>> {
        Ok(self.machine(id))
    }

    async fn find_machine_by_code(&self, code: &str) -> Result<Option<Machine>> {
        let tables = self.lock();
        Ok(tables.machines.iter().find(|m| m.machine_code == code).cloned())
    }

    async fn machines_by_filter(&self, filter: &MachineFilter) -> Result<Vec<Machine>> {
        let tables = self.lock();
        let mut machines: Vec<Machine> = tables
            .machines
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        machines.sort_by(|a, b| a.machine_code.cmp(&b.machine_code));
        Ok(machines)
    }

    async fn readings_by_machine(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let tables = self.lock();
        let mut readings: Vec<Reading> = tables
            .readings
            .iter()
            .filter(|r| r.machine_id == query.machine_id && r.timestamp >= query.since)
            .filter(|r| !(query.exclude_anomalous && r.is_anomaly))
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = query.limit {
            readings.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(readings)
    }

    async fn has_anomaly_since(&self, machine_id: Uuid, since: DateTime<Utc>) -> Result<bool> {
        let tables = self.lock();
        Ok(tables
            .readings
            .iter()
            .any(|r| r.machine_id == machine_id && r.is_anomaly && r.timestamp >= since))
    }

    async fn count_anomalies(&self, machine_id: Uuid) -> Result<i64> {
        let tables = self.lock();
        let count = tables
            .readings
            .iter()
            .filter(|r| r.machine_id == machine_id && r.is_anomaly)
            .count();
        Ok(count as i64)
    }

    async fn recent_anomalies(&self, since: DateTime<Utc>) -> Result<Vec<AnomalyRecord>> {
        let tables = self.lock();
        let mut records: Vec<AnomalyRecord> = tables
            .readings
            .iter()
            .filter(|r| r.is_anomaly && r.timestamp >= since)
            .filter_map(|r| {
                let machine = tables.machines.iter().find(|m| m.id == r.machine_id)?;
                Some(AnomalyRecord {
                    reading_id: r.id,
                    machine_code: machine.machine_code.clone(),
                    anomaly_reason: r.anomaly_reason.clone(),
                    recorded_at: r.timestamp,
                })
            })
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }

    async fn create_reading(&self, record: &ReadingRecord) -> Result<Reading> {
        let reading = Reading {
            id: Uuid::new_v4(),
            machine_id: record.machine_id,
            timestamp: record.timestamp,
            metrics: record.metrics,
            runtime_hours: record.runtime_hours,
            notes: record.notes.clone(),
            is_anomaly: record.is_anomaly,
            anomaly_reason: record.anomaly_reason.clone(),
        };
        self.lock().readings.push(reading.clone());
        Ok(reading)
    }

    async fn low_stock_parts(&self) -> Result<Vec<SparePart>> {
        let tables = self.lock();
        let mut parts: Vec<SparePart> =
            tables.parts.iter().filter(|p| p.is_low_stock()).cloned().collect();
        parts.sort_by(|a, b| a.part_name.cmp(&b.part_name));
        Ok(parts)
    }

    async fn find_part(&self, id: Uuid) -> Result<Option<SparePart>> {
        let tables = self.lock();
        Ok(tables.parts.iter().find(|p| p.id == id).cloned())
    }

    async fn restock_part(&self, id: Uuid, quantity: i32, at: DateTime<Utc>) -> Result<SparePart> {
        let mut tables = self.lock();
        let part = tables
            .parts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| MonitorError::NotFound {
                entity: "spare part",
                id: id.to_string(),
            })?;
        part.quantity_in_stock += quantity;
        part.updated_at = at;
        Ok(part.clone())
    }

    async fn work_orders_by_status_and_date(
        &self,
        status: WorkOrderStatus,
        scheduled_on_or_before: Option<NaiveDate>,
    ) -> Result<Vec<WorkOrder>> {
        let tables = self.lock();
        let mut orders: Vec<WorkOrder> = tables
            .work_orders
            .iter()
            .filter(|o| o.status == status)
            .filter(|o| scheduled_on_or_before.map_or(true, |d| o.scheduled_date <= d))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            (a.scheduled_date, &a.work_order_code).cmp(&(b.scheduled_date, &b.work_order_code))
        });
        Ok(orders)
    }

    async fn find_work_order(&self, id: Uuid) -> Result<Option<WorkOrder>> {
        let tables = self.lock();
        Ok(tables.work_orders.iter().find(|o| o.id == id).cloned())
    }

    async fn transition_work_order(
        &self,
        order: &WorkOrder,
        machine: &MachineChange,
    ) -> Result<()> {
        // ---
        let mut tables = self.lock();
        if tables.fail_transitions {
            return Err(MonitorError::Store(sqlx::Error::PoolTimedOut));
        }
        let order_at = tables
            .work_orders
            .iter()
            .position(|o| o.id == order.id)
            .ok_or_else(|| MonitorError::NotFound {
                entity: "work order",
                id: order.id.to_string(),
            })?;
        let machine_at = tables
            .machines
            .iter()
            .position(|m| m.id == machine.machine_id)
            .ok_or_else(|| MonitorError::machine_not_found(machine.machine_id))?;

        tables.work_orders[order_at] = order.clone();
        let stored = &mut tables.machines[machine_at];
        stored.status = machine.status;
        if let Some((last, next)) = machine.maintenance {
            stored.last_maintenance_date = Some(last);
            stored.next_maintenance_date = Some(next);
        }
        Ok(())
    }
}
