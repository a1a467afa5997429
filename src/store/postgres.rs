//! PostgreSQL implementation of [`EntityStore`].
//!
//! Tables are created by `schema::create_schema`; queries here use the
//! runtime-checked `sqlx::query*` API like the rest of the service.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::{EntityStore, MachineChange, MachineFilter, ReadingQuery};
use crate::error::{MonitorError, Result};
use crate::models::{
    AnomalyRecord, Machine, Reading, ReadingRecord, SparePart, WorkOrder, WorkOrderStatus,
};

// ---

const MACHINE_COLUMNS: &str = r#"
    id, machine_code, machine_name, machine_type, location, status,
    maintenance_frequency_days, last_maintenance_date, next_maintenance_date
"#;

const READING_COLUMNS: &str = r#"
    id, machine_id, recorded_at, temperature, vibration_level, oil_pressure,
    runtime_hours, notes, is_anomaly, anomaly_reason
"#;

const PART_COLUMNS: &str = r#"
    id, part_code, part_name, quantity_in_stock, minimum_stock_level, updated_at
"#;

const WORK_ORDER_SELECT: &str = r#"
    SELECT wo.id, wo.work_order_code, wo.machine_id, m.machine_code, wo.title,
           wo.status, wo.scheduled_date, wo.started_at, wo.completed_at,
           wo.completion_notes
      FROM work_orders wo
      JOIN machines m ON m.id = wo.machine_id
"#;

/// Store handle shared by every request; cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Decode a status column, surfacing unknown text as a column decode error.
fn status_column<T>(row: &PgRow, column: &str) -> std::result::Result<T, sqlx::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    // ---
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: T::Err| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for Machine {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        // ---
        Ok(Machine {
            id: row.try_get("id")?,
            machine_code: row.try_get("machine_code")?,
            machine_name: row.try_get("machine_name")?,
            machine_type: row.try_get("machine_type")?,
            location: row.try_get("location")?,
            status: status_column(row, "status")?,
            maintenance_frequency_days: row.try_get("maintenance_frequency_days")?,
            last_maintenance_date: row.try_get("last_maintenance_date")?,
            next_maintenance_date: row.try_get("next_maintenance_date")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for WorkOrder {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        // ---
        Ok(WorkOrder {
            id: row.try_get("id")?,
            work_order_code: row.try_get("work_order_code")?,
            machine_id: row.try_get("machine_id")?,
            machine_code: row.try_get("machine_code")?,
            title: row.try_get("title")?,
            status: status_column(row, "status")?,
            scheduled_date: row.try_get("scheduled_date")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            completion_notes: row.try_get("completion_notes")?,
        })
    }
}

#[async_trait]
impl EntityStore for PgStore {
    // ---
    async fn find_machine(&self, id: Uuid) -> Result<Option<Machine>> {
        // ---
        let sql = format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE id = $1");
        let machine = sqlx::query_as::<_, Machine>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(machine)
    }

    async fn find_machine_by_code(&self, code: &str) -> Result<Option<Machine>> {
        // ---
        let sql = format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE machine_code = $1");
        let machine = sqlx::query_as::<_, Machine>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(machine)
    }

    async fn machines_by_filter(&self, filter: &MachineFilter) -> Result<Vec<Machine>> {
        // ---
        let range = filter.maintenance_due.unwrap_or_default();
        let sql = format!(
            r#"
            SELECT {MACHINE_COLUMNS} FROM machines
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2 = FALSE OR next_maintenance_date IS NOT NULL)
               AND ($3::DATE IS NULL OR next_maintenance_date >= $3)
               AND ($4::DATE IS NULL OR next_maintenance_date <= $4)
             ORDER BY machine_code
            "#
        );
        let machines = sqlx::query_as::<_, Machine>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.maintenance_due.is_some())
            .bind(range.from)
            .bind(range.until)
            .fetch_all(&self.pool)
            .await?;

        debug!(?filter, count = machines.len(), "machines_by_filter");
        Ok(machines)
    }

    async fn readings_by_machine(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        // ---
        // LIMIT NULL is LIMIT ALL in Postgres.
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS} FROM machine_readings
             WHERE machine_id = $1
               AND recorded_at >= $2
               AND ($3 = FALSE OR is_anomaly = FALSE)
             ORDER BY recorded_at DESC
             LIMIT $4
            "#
        );
        let readings = sqlx::query_as::<_, Reading>(&sql)
            .bind(query.machine_id)
            .bind(query.since)
            .bind(query.exclude_anomalous)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(readings)
    }

    async fn has_anomaly_since(&self, machine_id: Uuid, since: DateTime<Utc>) -> Result<bool> {
        // ---
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM machine_readings
                 WHERE machine_id = $1 AND is_anomaly AND recorded_at >= $2
            )
            "#,
        )
        .bind(machine_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count_anomalies(&self, machine_id: Uuid) -> Result<i64> {
        // ---
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM machine_readings WHERE machine_id = $1 AND is_anomaly",
        )
        .bind(machine_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn recent_anomalies(&self, since: DateTime<Utc>) -> Result<Vec<AnomalyRecord>> {
        // ---
        let records = sqlx::query_as::<_, AnomalyRecord>(
            r#"
            SELECT r.id AS reading_id, m.machine_code, r.anomaly_reason, r.recorded_at
              FROM machine_readings r
              JOIN machines m ON m.id = r.machine_id
             WHERE r.is_anomaly AND r.recorded_at >= $1
             ORDER BY r.recorded_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn create_reading(&self, record: &ReadingRecord) -> Result<Reading> {
        // ---
        let sql = format!(
            r#"
            INSERT INTO machine_readings (
                id, machine_id, recorded_at, temperature, vibration_level,
                oil_pressure, runtime_hours, notes, is_anomaly, anomaly_reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {READING_COLUMNS}
            "#
        );
        let reading = sqlx::query_as::<_, Reading>(&sql)
            .bind(Uuid::new_v4())
            .bind(record.machine_id)
            .bind(record.timestamp)
            .bind(record.metrics.temperature)
            .bind(record.metrics.vibration_level)
            .bind(record.metrics.oil_pressure)
            .bind(record.runtime_hours)
            .bind(&record.notes)
            .bind(record.is_anomaly)
            .bind(&record.anomaly_reason)
            .fetch_one(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn low_stock_parts(&self) -> Result<Vec<SparePart>> {
        // ---
        let sql = format!(
            r#"
            SELECT {PART_COLUMNS} FROM spare_parts
             WHERE quantity_in_stock <= minimum_stock_level
             ORDER BY part_name
            "#
        );
        let parts = sqlx::query_as::<_, SparePart>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(parts)
    }

    async fn find_part(&self, id: Uuid) -> Result<Option<SparePart>> {
        // ---
        let sql = format!("SELECT {PART_COLUMNS} FROM spare_parts WHERE id = $1");
        let part = sqlx::query_as::<_, SparePart>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(part)
    }

    async fn restock_part(&self, id: Uuid, quantity: i32, at: DateTime<Utc>) -> Result<SparePart> {
        // ---
        let sql = format!(
            r#"
            UPDATE spare_parts
               SET quantity_in_stock = quantity_in_stock + $2,
                   updated_at = $3
             WHERE id = $1
            RETURNING {PART_COLUMNS}
            "#
        );
        sqlx::query_as::<_, SparePart>(&sql)
            .bind(id)
            .bind(quantity)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| MonitorError::NotFound {
                entity: "spare part",
                id: id.to_string(),
            })
    }

    async fn work_orders_by_status_and_date(
        &self,
        status: WorkOrderStatus,
        scheduled_on_or_before: Option<NaiveDate>,
    ) -> Result<Vec<WorkOrder>> {
        // ---
        let sql = format!(
            r#"
            {WORK_ORDER_SELECT}
             WHERE wo.status = $1
               AND ($2::DATE IS NULL OR wo.scheduled_date <= $2)
             ORDER BY wo.scheduled_date, wo.work_order_code
            "#
        );
        let orders = sqlx::query_as::<_, WorkOrder>(&sql)
            .bind(status.as_str())
            .bind(scheduled_on_or_before)
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    async fn find_work_order(&self, id: Uuid) -> Result<Option<WorkOrder>> {
        // ---
        let sql = format!("{WORK_ORDER_SELECT} WHERE wo.id = $1");
        let order = sqlx::query_as::<_, WorkOrder>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn transition_work_order(
        &self,
        order: &WorkOrder,
        machine: &MachineChange,
    ) -> Result<()> {
        // ---
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE work_orders
               SET status = $2,
                   started_at = $3,
                   completed_at = $4,
                   completion_notes = $5
             WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.started_at)
        .bind(order.completed_at)
        .bind(&order.completion_notes)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MonitorError::NotFound {
                entity: "work order",
                id: order.id.to_string(),
            });
        }

        // NULL dates keep the current schedule.
        let (last, next) = machine.maintenance.unzip();
        let result = sqlx::query(
            r#"
            UPDATE machines
               SET status = $2,
                   last_maintenance_date = COALESCE($3, last_maintenance_date),
                   next_maintenance_date = COALESCE($4, next_maintenance_date)
             WHERE id = $1
            "#,
        )
        .bind(machine.machine_id)
        .bind(machine.status.as_str())
        .bind(last)
        .bind(next)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MonitorError::machine_not_found(machine.machine_id));
        }

        tx.commit().await?;
        debug!(
            work_order = %order.work_order_code,
            status = %order.status,
            machine_status = machine.status.as_str(),
            "work order transition committed"
        );
        Ok(())
    }
}
