//! Work-order lifecycle and spare-part stock operations.
//!
//! Starting and completing a work order also moves the owning machine
//! between `OPERATIONAL` and `UNDER_MAINTENANCE`; completion resets the
//! maintenance schedule from the completion date. The order and its machine
//! are always written together.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{MonitorError, Result};
use crate::models::{MachineStatus, SparePart, WorkOrder, WorkOrderStatus};
use crate::store::{EntityStore, MachineChange};

// ---

async fn load_work_order<S>(store: &S, id: Uuid) -> Result<WorkOrder>
where
    S: EntityStore + ?Sized,
{
    store
        .find_work_order(id)
        .await?
        .ok_or_else(|| MonitorError::NotFound {
            entity: "work order",
            id: id.to_string(),
        })
}

/// Move a pending work order to `IN_PROGRESS` and take its machine out of
/// service.
pub async fn start_work_order<S>(store: &S, id: Uuid, now: DateTime<Utc>) -> Result<WorkOrder>
where
    S: EntityStore + ?Sized,
{
    // ---
    let mut order = load_work_order(store, id).await?;
    if order.status != WorkOrderStatus::Pending {
        return Err(MonitorError::InvalidTransition(format!(
            "work order {} is {} and can only be started from PENDING",
            order.work_order_code, order.status
        )));
    }

    order.status = WorkOrderStatus::InProgress;
    order.started_at = Some(now);
    let change = MachineChange {
        machine_id: order.machine_id,
        status: MachineStatus::UnderMaintenance,
        maintenance: None,
    };
    store.transition_work_order(&order, &change).await?;

    tracing::info!(
        work_order = %order.work_order_code,
        machine = %order.machine_code,
        "work order started"
    );
    Ok(order)
}

/// Complete a work order, return its machine to service and reschedule the
/// next maintenance from today.
pub async fn complete_work_order<S>(
    store: &S,
    id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<WorkOrder>
where
    S: EntityStore + ?Sized,
{
    // ---
    let mut order = load_work_order(store, id).await?;
    if order.status == WorkOrderStatus::Completed {
        return Err(MonitorError::InvalidTransition(format!(
            "work order {} is already completed",
            order.work_order_code
        )));
    }

    let machine = store
        .find_machine(order.machine_id)
        .await?
        .ok_or_else(|| MonitorError::machine_not_found(order.machine_id))?;

    let today = now.date_naive();
    let next = machine.next_maintenance_after(today);
    order.status = WorkOrderStatus::Completed;
    order.completed_at = Some(now);
    order.completion_notes = notes.unwrap_or_default();
    let change = MachineChange {
        machine_id: machine.id,
        status: MachineStatus::Operational,
        maintenance: Some((today, next)),
    };
    store.transition_work_order(&order, &change).await?;

    tracing::info!(
        work_order = %order.work_order_code,
        machine = %machine.machine_code,
        next_maintenance = %next,
        "work order completed"
    );
    Ok(order)
}

pub async fn low_stock<S>(store: &S) -> Result<Vec<SparePart>>
where
    S: EntityStore + ?Sized,
{
    store.low_stock_parts().await
}

/// Add `quantity` units to a part's stock. The quantity must be positive.
pub async fn restock_part<S>(
    store: &S,
    id: Uuid,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<SparePart>
where
    S: EntityStore + ?Sized,
{
    // ---
    if quantity <= 0 {
        return Err(MonitorError::validation("quantity", "must be greater than zero"));
    }
    if store.find_part(id).await?.is_none() {
        return Err(MonitorError::NotFound {
            entity: "spare part",
            id: id.to_string(),
        });
    }

    let part = store.restock_part(id, quantity, now).await?;
    tracing::info!(
        part = %part.part_code,
        added = quantity,
        in_stock = part.quantity_in_stock,
        "part restocked"
    );
    Ok(part)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::{fixtures, MemoryStore};
    use chrono::{Days, Duration};

    fn store_with_order(status: WorkOrderStatus) -> (MemoryStore, WorkOrder) {
        // ---
        let today = fixtures::now().date_naive();
        let store = MemoryStore::new();
        let machine = fixtures::machine("PMP-1", Some(today - Days::new(2)));
        let mut order = fixtures::work_order("WO-100", &machine, today);
        order.status = status;
        store.insert_machine(machine);
        store.insert_work_order(order.clone());
        (store, order)
    }

    #[tokio::test]
    async fn test_start_moves_machine_under_maintenance() {
        // ---
        let (store, order) = store_with_order(WorkOrderStatus::Pending);
        let started = start_work_order(&store, order.id, fixtures::now())
            .await
            .unwrap();

        assert_eq!(started.status, WorkOrderStatus::InProgress);
        assert_eq!(started.started_at, Some(fixtures::now()));
        let machine = store.machine(order.machine_id).unwrap();
        assert_eq!(machine.status, MachineStatus::UnderMaintenance);
    }

    #[tokio::test]
    async fn test_start_rejects_non_pending() {
        // ---
        let (store, order) = store_with_order(WorkOrderStatus::InProgress);
        let err = start_work_order(&store, order.id, fixtures::now())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidTransition(_)));

        let machine = store.machine(order.machine_id).unwrap();
        assert_eq!(machine.status, MachineStatus::Operational);
    }

    #[tokio::test]
    async fn test_complete_reschedules_from_today() {
        // ---
        let (store, order) = store_with_order(WorkOrderStatus::InProgress);
        let now = fixtures::now();
        let done = complete_work_order(&store, order.id, Some("Seals replaced".into()), now)
            .await
            .unwrap();

        assert_eq!(done.status, WorkOrderStatus::Completed);
        assert_eq!(done.completion_notes, "Seals replaced");

        let machine = store.machine(order.machine_id).unwrap();
        let today = now.date_naive();
        assert_eq!(machine.status, MachineStatus::Operational);
        assert_eq!(machine.last_maintenance_date, Some(today));
        assert_eq!(machine.next_maintenance_date, Some(today + Days::new(45)));
    }

    #[tokio::test]
    async fn test_complete_twice_is_rejected() {
        // ---
        let (store, order) = store_with_order(WorkOrderStatus::Completed);
        let err = complete_work_order(&store, order.id, None, fixtures::now())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_failed_completion_can_be_retried() {
        // ---
        let (store, order) = store_with_order(WorkOrderStatus::InProgress);
        let now = fixtures::now();
        let stale_next = store.machine(order.machine_id).unwrap().next_maintenance_date;

        store.set_fail_transitions(true);
        let err = complete_work_order(&store, order.id, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Store(_)));

        // Neither side was written.
        let unchanged = store.work_order(order.id).unwrap();
        assert_eq!(unchanged.status, WorkOrderStatus::InProgress);
        assert!(unchanged.completed_at.is_none());
        let machine = store.machine(order.machine_id).unwrap();
        assert_eq!(machine.next_maintenance_date, stale_next);
        assert!(machine.last_maintenance_date.is_none());

        store.set_fail_transitions(false);
        let done = complete_work_order(&store, order.id, None, now)
            .await
            .unwrap();
        assert_eq!(done.status, WorkOrderStatus::Completed);
        let machine = store.machine(order.machine_id).unwrap();
        assert_eq!(machine.last_maintenance_date, Some(now.date_naive()));
    }

    #[tokio::test]
    async fn test_failed_start_leaves_order_pending() {
        // ---
        let (store, order) = store_with_order(WorkOrderStatus::Pending);
        store.set_fail_transitions(true);
        assert!(start_work_order(&store, order.id, fixtures::now()).await.is_err());

        assert_eq!(
            store.work_order(order.id).unwrap().status,
            WorkOrderStatus::Pending
        );
        assert_eq!(
            store.machine(order.machine_id).unwrap().status,
            MachineStatus::Operational
        );
    }

    #[test]
    fn test_unknown_work_order_is_not_found() {
        // ---
        let store = MemoryStore::new();
        let err = tokio_test::block_on(start_work_order(&store, Uuid::new_v4(), fixtures::now()))
            .unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { entity: "work order", .. }));
    }

    #[tokio::test]
    async fn test_restock_adds_quantity() {
        // ---
        let now = fixtures::now();
        let store = MemoryStore::new();
        let part = fixtures::part("BRG-2", 1, 5, now - Duration::days(3));
        store.insert_part(part.clone());

        assert_eq!(low_stock(&store).await.unwrap().len(), 1);

        let restocked = restock_part(&store, part.id, 10, now).await.unwrap();
        assert_eq!(restocked.quantity_in_stock, 11);
        assert_eq!(restocked.updated_at, now);
        assert!(low_stock(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restock_rejects_non_positive_quantity() {
        // ---
        let now = fixtures::now();
        let store = MemoryStore::new();
        let part = fixtures::part("BRG-3", 1, 5, now);
        store.insert_part(part.clone());

        for quantity in [0, -4] {
            let err = restock_part(&store, part.id, quantity, now).await.unwrap_err();
            assert!(matches!(err, MonitorError::Validation { field: "quantity", .. }));
        }
    }

    #[tokio::test]
    async fn test_restock_unknown_part_is_not_found() {
        // ---
        let store = MemoryStore::new();
        let err = restock_part(&store, Uuid::new_v4(), 3, fixtures::now())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { entity: "spare part", .. }));
    }
}
