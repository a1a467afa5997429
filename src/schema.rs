//! Database schema management for `codemetal-plantwatch`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS machines (
        id                         UUID PRIMARY KEY,
        machine_code               TEXT NOT NULL UNIQUE,
        machine_name               TEXT NOT NULL,
        machine_type               TEXT NOT NULL DEFAULT '',
        location                   TEXT NOT NULL DEFAULT '',
        status                     TEXT NOT NULL DEFAULT 'OPERATIONAL',
        maintenance_frequency_days INTEGER NOT NULL DEFAULT 30,
        last_maintenance_date      DATE,
        next_maintenance_date      DATE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS machine_readings (
        id              UUID PRIMARY KEY,
        machine_id      UUID NOT NULL REFERENCES machines (id) ON DELETE CASCADE,
        recorded_at     TIMESTAMPTZ NOT NULL,
        temperature     DOUBLE PRECISION,
        vibration_level DOUBLE PRECISION,
        oil_pressure    DOUBLE PRECISION,
        runtime_hours   INTEGER,
        notes           TEXT NOT NULL DEFAULT '',
        is_anomaly      BOOLEAN NOT NULL DEFAULT FALSE,
        anomaly_reason  TEXT NOT NULL DEFAULT ''
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS spare_parts (
        id                  UUID PRIMARY KEY,
        part_code           TEXT NOT NULL UNIQUE,
        part_name           TEXT NOT NULL,
        quantity_in_stock   INTEGER NOT NULL DEFAULT 0,
        minimum_stock_level INTEGER NOT NULL DEFAULT 5,
        updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS work_orders (
        id               UUID PRIMARY KEY,
        work_order_code  TEXT NOT NULL UNIQUE,
        machine_id       UUID NOT NULL REFERENCES machines (id) ON DELETE CASCADE,
        title            TEXT NOT NULL,
        status           TEXT NOT NULL DEFAULT 'PENDING',
        scheduled_date   DATE NOT NULL,
        started_at       TIMESTAMPTZ,
        completed_at     TIMESTAMPTZ,
        completion_notes TEXT NOT NULL DEFAULT ''
    );
    "#,
    // Baseline and score windows read one machine's readings by time.
    r#"
    CREATE INDEX IF NOT EXISTS idx_machine_readings_machine_time
        ON machine_readings (machine_id, recorded_at DESC);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_machine_readings_anomalies
        ON machine_readings (recorded_at DESC) WHERE is_anomaly;
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_machines_next_maintenance
        ON machines (next_maintenance_date);
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_work_orders_status_date
        ON work_orders (status, scheduled_date);
    "#,
];

/// Create the database schema if missing.
///
/// Safe to call on every startup; every statement is a no-op once the objects
/// exist. Runs in one transaction so a failed startup leaves nothing behind.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    for statement in STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::info!(statements = STATEMENTS.len(), "database schema ready");
    Ok(())
}
