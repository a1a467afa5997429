//! Fleet-wide overview counters and the per-machine health listing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::health::{classify_machine, HealthStatus};
use crate::models::{Machine, MachineStatus, WorkOrderStatus};
use crate::store::{EntityStore, MachineFilter};

// ---

/// Machines per health status. `UNKNOWN` machines are counted in the total
/// only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
    pub critical: usize,
}

/// Machines per operational status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub total_machines: usize,
    pub operational: usize,
    pub under_maintenance: usize,
    pub down: usize,
}

impl FleetSummary {
    fn of(machines: &[Machine]) -> Self {
        // ---
        let with_status =
            |status: MachineStatus| machines.iter().filter(|m| m.status == status).count();
        Self {
            total_machines: machines.len(),
            operational: with_status(MachineStatus::Operational),
            under_maintenance: with_status(MachineStatus::UnderMaintenance),
            down: with_status(MachineStatus::Down),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardOverview {
    #[serde(flatten)]
    pub fleet: FleetSummary,
    pub health_status: HealthCounts,
    pub pending_work_orders: usize,
    pub in_progress_work_orders: usize,
    pub completed_work_orders: usize,
    pub low_stock_parts: usize,
}

pub async fn dashboard_overview<S>(store: &S, now: DateTime<Utc>) -> Result<DashboardOverview>
where
    S: EntityStore + ?Sized,
{
    // ---
    let machines = store.machines_by_filter(&MachineFilter::default()).await?;

    let mut health = HealthCounts::default();
    for machine in &machines {
        match classify_machine(store, machine, now).await? {
            HealthStatus::Green => health.green += 1,
            HealthStatus::Yellow => health.yellow += 1,
            HealthStatus::Red => health.red += 1,
            HealthStatus::Critical => health.critical += 1,
            HealthStatus::Unknown => {}
        }
    }

    let mut order_counts = [0usize; 3];
    let tracked = [
        WorkOrderStatus::Pending,
        WorkOrderStatus::InProgress,
        WorkOrderStatus::Completed,
    ];
    for (count, status) in order_counts.iter_mut().zip(tracked) {
        *count = store.work_orders_by_status_and_date(status, None).await?.len();
    }
    let [pending, in_progress, completed] = order_counts;

    let overview = DashboardOverview {
        fleet: FleetSummary::of(&machines),
        health_status: health,
        pending_work_orders: pending,
        in_progress_work_orders: in_progress,
        completed_work_orders: completed,
        low_stock_parts: store.low_stock_parts().await?.len(),
    };
    tracing::debug!(?overview, "dashboard overview computed");
    Ok(overview)
}

/// One line of the fleet health listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineHealthRow {
    pub id: Uuid,
    pub machine_code: String,
    pub machine_name: String,
    pub machine_type: String,
    pub location: String,
    pub status: MachineStatus,
    pub health_status: HealthStatus,
    pub next_maintenance_date: Option<NaiveDate>,
    /// Negative once the machine is overdue.
    pub days_until_maintenance: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetHealth {
    pub machines: Vec<MachineHealthRow>,
    pub summary: FleetSummary,
}

/// Every machine with its current health classification, in store order.
pub async fn fleet_health<S>(store: &S, now: DateTime<Utc>) -> Result<FleetHealth>
where
    S: EntityStore + ?Sized,
{
    // ---
    let machines = store.machines_by_filter(&MachineFilter::default()).await?;
    let today = now.date_naive();

    let mut rows = Vec::with_capacity(machines.len());
    for machine in &machines {
        let health_status = classify_machine(store, machine, now).await?;
        rows.push(MachineHealthRow {
            id: machine.id,
            machine_code: machine.machine_code.clone(),
            machine_name: machine.machine_name.clone(),
            machine_type: machine.machine_type.clone(),
            location: machine.location.clone(),
            status: machine.status,
            health_status,
            next_maintenance_date: machine.next_maintenance_date,
            days_until_maintenance: machine.days_until_maintenance(today),
        });
    }

    let summary = FleetSummary::of(&machines);
    tracing::debug!(machines = rows.len(), "fleet health listed");
    Ok(FleetHealth {
        machines: rows,
        summary,
    })
}
