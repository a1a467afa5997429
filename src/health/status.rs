//! Coarse health classification from schedule position and anomaly recency.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{MonitorError, Result};
use crate::models::{Machine, MachineStatus, Reading};
use crate::store::{EntityStore, ReadingQuery};

// ---

const ANOMALY_LOOKBACK_DAYS: i64 = 7;
const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Unknown,
    Green,
    Yellow,
    Red,
    Critical,
}

/// Pure classification. A recent anomaly outranks any schedule position, but
/// an unscheduled machine is always `Unknown`.
pub fn classify(
    next_maintenance: Option<NaiveDate>,
    recent_anomaly: bool,
    today: NaiveDate,
) -> HealthStatus {
    // ---
    let Some(next) = next_maintenance else {
        return HealthStatus::Unknown;
    };
    if recent_anomaly {
        return HealthStatus::Critical;
    }
    match (next - today).num_days() {
        d if d < 0 => HealthStatus::Red,
        d if d <= DUE_SOON_DAYS => HealthStatus::Yellow,
        _ => HealthStatus::Green,
    }
}

/// Classify a loaded machine, querying anomaly history only when the
/// schedule makes it relevant.
pub async fn classify_machine<S>(
    store: &S,
    machine: &Machine,
    now: DateTime<Utc>,
) -> Result<HealthStatus>
where
    S: EntityStore + ?Sized,
{
    // ---
    if machine.next_maintenance_date.is_none() {
        return Ok(HealthStatus::Unknown);
    }
    let since = now - Duration::days(ANOMALY_LOOKBACK_DAYS);
    let recent_anomaly = store.has_anomaly_since(machine.id, since).await?;
    Ok(classify(
        machine.next_maintenance_date,
        recent_anomaly,
        now.date_naive(),
    ))
}

pub async fn classify_health<S>(
    store: &S,
    machine_id: Uuid,
    now: DateTime<Utc>,
) -> Result<HealthStatus>
where
    S: EntityStore + ?Sized,
{
    // ---
    let machine = store
        .find_machine(machine_id)
        .await?
        .ok_or_else(|| MonitorError::machine_not_found(machine_id))?;
    classify_machine(store, &machine, now).await
}

/// Snapshot served by the machine health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub machine_id: Uuid,
    pub machine_code: String,
    pub machine_name: String,
    pub status: MachineStatus,
    pub health_status: HealthStatus,
    pub days_until_maintenance: Option<i64>,
    pub next_maintenance_date: Option<NaiveDate>,
    pub latest_reading: Option<Reading>,
    pub recent_anomalies: i64,
}

pub async fn health_report<S>(
    store: &S,
    machine_id: Uuid,
    now: DateTime<Utc>,
) -> Result<HealthReport>
where
    S: EntityStore + ?Sized,
{
    // ---
    let machine = store
        .find_machine(machine_id)
        .await?
        .ok_or_else(|| MonitorError::machine_not_found(machine_id))?;

    let health_status = classify_machine(store, &machine, now).await?;
    let latest_reading = store
        .readings_by_machine(&ReadingQuery {
            machine_id,
            since: DateTime::<Utc>::UNIX_EPOCH,
            exclude_anomalous: false,
            limit: Some(1),
        })
        .await?
        .into_iter()
        .next();
    let recent_anomalies = store.count_anomalies(machine_id).await?;

    Ok(HealthReport {
        machine_id,
        days_until_maintenance: machine.days_until_maintenance(now.date_naive()),
        next_maintenance_date: machine.next_maintenance_date,
        machine_code: machine.machine_code,
        machine_name: machine.machine_name,
        status: machine.status,
        health_status,
        latest_reading,
        recent_anomalies,
    })
}
