//! Notification feed assembled from five independent alert sources.
//!
//! Each source produces typed [`Alert`]s; they are normalized into
//! [`Notification`]s and ranked once, at the end. The feed is rebuilt on
//! every request and never stored.

use std::cmp::Reverse;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::WorkOrderStatus;
use crate::store::{DateRange, EntityStore, MachineFilter};

// ---

const UPCOMING_WINDOW_DAYS: u64 = 3;
const ANOMALY_WINDOW_HOURS: i64 = 24;

/// Alert severity. Variant order is rank order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    OverdueMaintenance,
    UpcomingMaintenance,
    AnomalyDetected,
    LowStock,
    PendingWorkOrder,
}

/// One alert per source record, carrying only what that source knows.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    OverdueMaintenance {
        machine_code: String,
        machine_name: String,
        due: NaiveDate,
        days_overdue: i64,
    },
    UpcomingMaintenance {
        machine_code: String,
        machine_name: String,
        due: NaiveDate,
        days_until: i64,
    },
    AnomalyDetected {
        machine_code: String,
        reason: String,
        recorded_at: DateTime<Utc>,
    },
    LowStock {
        part_code: String,
        part_name: String,
        quantity: i32,
        minimum: i32,
        updated_at: DateTime<Utc>,
    },
    PendingWorkOrder {
        work_order_code: String,
        machine_code: String,
        title: String,
        scheduled: NaiveDate,
    },
}

/// Common display shape of every alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub reference_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationFeed {
    pub total: usize,
    #[serde(flatten)]
    pub counts: SeverityCounts,
    pub notifications: Vec<Notification>,
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl Alert {
    // ---
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::OverdueMaintenance { .. } => NotificationKind::OverdueMaintenance,
            Self::UpcomingMaintenance { .. } => NotificationKind::UpcomingMaintenance,
            Self::AnomalyDetected { .. } => NotificationKind::AnomalyDetected,
            Self::LowStock { .. } => NotificationKind::LowStock,
            Self::PendingWorkOrder { .. } => NotificationKind::PendingWorkOrder,
        }
    }

    /// Fixed per source.
    pub fn severity(&self) -> Severity {
        match self {
            Self::AnomalyDetected { .. } => Severity::Critical,
            Self::OverdueMaintenance { .. } => Severity::High,
            Self::UpcomingMaintenance { .. }
            | Self::LowStock { .. }
            | Self::PendingWorkOrder { .. } => Severity::Medium,
        }
    }

    /// Alerts derived from dates are stamped at the start of that date so the
    /// feed is stable across calls on the same day.
    pub fn into_notification(self) -> Notification {
        // ---
        let kind = self.kind();
        let severity = self.severity();
        let (title, message, reference_id, timestamp) = match self {
            Self::OverdueMaintenance {
                machine_code,
                machine_name,
                due,
                days_overdue,
            } => (
                format!("Maintenance Overdue: {machine_code}"),
                format!("{machine_name} is {days_overdue} days overdue for maintenance"),
                machine_code,
                start_of(due),
            ),
            Self::UpcomingMaintenance {
                machine_code,
                machine_name,
                due,
                days_until,
            } => (
                format!("Maintenance Due Soon: {machine_code}"),
                format!("{machine_name} maintenance due in {days_until} days"),
                machine_code,
                start_of(due),
            ),
            Self::AnomalyDetected {
                machine_code,
                reason,
                recorded_at,
            } => (
                format!("Anomaly Detected: {machine_code}"),
                reason,
                machine_code,
                recorded_at,
            ),
            Self::LowStock {
                part_code,
                part_name,
                quantity,
                minimum,
                updated_at,
            } => (
                format!("Low Stock: {part_name}"),
                format!("Stock level: {quantity} (Min: {minimum})"),
                part_code,
                updated_at,
            ),
            Self::PendingWorkOrder {
                work_order_code,
                machine_code,
                title,
                scheduled,
            } => (
                format!("Pending Work Order: {work_order_code}"),
                format!("{title} for {machine_code} scheduled on {scheduled}"),
                work_order_code,
                start_of(scheduled),
            ),
        };

        Notification {
            kind,
            severity,
            title,
            message,
            reference_id,
            timestamp,
        }
    }
}

/// Normalize and rank: highest severity first, newest first within a
/// severity, then kind and reference for a total order.
pub fn rank(alerts: Vec<Alert>) -> NotificationFeed {
    // ---
    let mut notifications: Vec<Notification> =
        alerts.into_iter().map(Alert::into_notification).collect();
    notifications.sort_by(|a, b| {
        (Reverse(a.severity), Reverse(a.timestamp), a.kind, &a.reference_id).cmp(&(
            Reverse(b.severity),
            Reverse(b.timestamp),
            b.kind,
            &b.reference_id,
        ))
    });

    let mut counts = SeverityCounts::default();
    for n in &notifications {
        match n.severity {
            Severity::Critical => counts.critical += 1,
            Severity::High => counts.high += 1,
            Severity::Medium => counts.medium += 1,
            Severity::Low => counts.low += 1,
        }
    }

    NotificationFeed {
        total: notifications.len(),
        counts,
        notifications,
    }
}

/// Query every source and assemble the ranked feed.
pub async fn build_notifications<S>(store: &S, now: DateTime<Utc>) -> Result<NotificationFeed>
where
    S: EntityStore + ?Sized,
{
    // ---
    let today = now.date_naive();
    let mut alerts = Vec::new();

    let overdue = store
        .machines_by_filter(&MachineFilter {
            status: None,
            maintenance_due: Some(DateRange {
                from: None,
                until: today.checked_sub_days(Days::new(1)),
            }),
        })
        .await?;
    alerts.extend(overdue.into_iter().filter_map(|m| {
        let due = m.next_maintenance_date?;
        Some(Alert::OverdueMaintenance {
            days_overdue: (today - due).num_days(),
            machine_code: m.machine_code,
            machine_name: m.machine_name,
            due,
        })
    }));

    let upcoming = store
        .machines_by_filter(&MachineFilter {
            status: None,
            maintenance_due: Some(DateRange {
                from: Some(today),
                until: today.checked_add_days(Days::new(UPCOMING_WINDOW_DAYS)),
            }),
        })
        .await?;
    alerts.extend(upcoming.into_iter().filter_map(|m| {
        let due = m.next_maintenance_date?;
        Some(Alert::UpcomingMaintenance {
            days_until: (due - today).num_days(),
            machine_code: m.machine_code,
            machine_name: m.machine_name,
            due,
        })
    }));

    let anomalies = store
        .recent_anomalies(now - Duration::hours(ANOMALY_WINDOW_HOURS))
        .await?;
    alerts.extend(anomalies.into_iter().map(|a| {
        debug!(reading = %a.reading_id, machine = %a.machine_code, "recent anomaly");
        Alert::AnomalyDetected {
            machine_code: a.machine_code,
            reason: a.anomaly_reason,
            recorded_at: a.recorded_at,
        }
    }));

    let parts = store.low_stock_parts().await?;
    alerts.extend(parts.into_iter().map(|p| Alert::LowStock {
        part_code: p.part_code,
        part_name: p.part_name,
        quantity: p.quantity_in_stock,
        minimum: p.minimum_stock_level,
        updated_at: p.updated_at,
    }));

    let orders = store
        .work_orders_by_status_and_date(WorkOrderStatus::Pending, Some(today))
        .await?;
    let due = orders.into_iter().filter(|o| o.is_pending_and_due(today));
    alerts.extend(due.map(|o| Alert::PendingWorkOrder {
        work_order_code: o.work_order_code,
        machine_code: o.machine_code,
        title: o.title,
        scheduled: o.scheduled_date,
    }));

    let feed = rank(alerts);
    debug!(
        total = feed.total,
        critical = feed.counts.critical,
        high = feed.counts.high,
        medium = feed.counts.medium,
        "notification feed built"
    );
    Ok(feed)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::{fixtures, MemoryStore};

    fn today() -> NaiveDate {
        fixtures::now().date_naive()
    }

    fn seeded_store() -> MemoryStore {
        // ---
        let now = fixtures::now();
        let store = MemoryStore::new();

        let overdue = fixtures::machine("OV-1", Some(today() - Days::new(4)));
        let healthy = fixtures::machine("OK-1", Some(today() + Days::new(40)));
        store.insert_machine(overdue.clone());
        store.insert_machine(healthy.clone());

        store.insert_part(fixtures::part("FLT-9", 2, 5, now - Duration::days(1)));
        store.insert_part(fixtures::part("FLT-1", 50, 5, now - Duration::days(1)));

        store.insert_reading(fixtures::anomalous_reading(
            healthy.id,
            now - Duration::hours(3),
            "Temperature anomaly: 120°C (normal: 70.2±0.4)",
        ));
        // Older than a day: not in the feed.
        store.insert_reading(fixtures::anomalous_reading(
            healthy.id,
            now - Duration::hours(30),
            "Vibration anomaly: 9 (normal: 2.0±0.1)",
        ));
        store
    }

    #[tokio::test]
    async fn test_feed_counts_each_source() {
        // ---
        let store = seeded_store();
        let feed = build_notifications(&store, fixtures::now()).await.unwrap();

        assert_eq!(feed.total, 3);
        assert_eq!(feed.counts.critical, 1);
        assert_eq!(feed.counts.high, 1);
        assert_eq!(feed.counts.medium, 1);
        assert_eq!(feed.counts.low, 0);
    }

    #[tokio::test]
    async fn test_feed_is_ranked_critical_first() {
        // ---
        let store = seeded_store();
        let feed = build_notifications(&store, fixtures::now()).await.unwrap();

        let kinds: Vec<NotificationKind> = feed.notifications.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::AnomalyDetected,
                NotificationKind::OverdueMaintenance,
                NotificationKind::LowStock,
            ]
        );
        assert_eq!(
            feed.notifications[0].message,
            "Temperature anomaly: 120°C (normal: 70.2±0.4)"
        );
        assert_eq!(feed.notifications[0].title, "Anomaly Detected: OK-1");
        let overdue = &feed.notifications[1];
        assert_eq!(overdue.title, "Maintenance Overdue: OV-1");
        assert_eq!(overdue.message, "OV-1 press is 4 days overdue for maintenance");
        assert_eq!(overdue.reference_id, "OV-1");
    }

    #[test]
    fn test_feed_is_idempotent() {
        // ---
        let store = seeded_store();
        let first = tokio_test::block_on(build_notifications(&store, fixtures::now())).unwrap();
        let second = tokio_test::block_on(build_notifications(&store, fixtures::now())).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_upcoming_window_and_pending_orders() {
        // ---
        let now = fixtures::now();
        let store = MemoryStore::new();
        let due_today = fixtures::machine("UP-0", Some(today()));
        let due_in_three = fixtures::machine("UP-3", Some(today() + Days::new(3)));
        let due_in_four = fixtures::machine("UP-4", Some(today() + Days::new(4)));
        store.insert_machine(due_today.clone());
        store.insert_machine(due_in_three.clone());
        store.insert_machine(due_in_four.clone());

        store.insert_work_order(fixtures::work_order("WO-1", &due_today, today()));
        store.insert_work_order(fixtures::work_order("WO-2", &due_today, today() + Days::new(1)));
        let mut started = fixtures::work_order("WO-3", &due_today, today() - Days::new(2));
        started.status = WorkOrderStatus::InProgress;
        store.insert_work_order(started);

        let feed = build_notifications(&store, now).await.unwrap();
        let refs: Vec<&str> = feed
            .notifications
            .iter()
            .map(|n| n.reference_id.as_str())
            .collect();

        // All medium; newest timestamp first.
        assert_eq!(refs, vec!["UP-3", "UP-0", "WO-1"]);
        assert_eq!(feed.counts.medium, 3);
        assert_eq!(
            feed.notifications[2].message,
            format!("Replace seals for UP-0 scheduled on {}", today())
        );
        assert_eq!(
            feed.notifications[0].message,
            "UP-3 press maintenance due in 3 days"
        );
    }

    #[test]
    fn test_rank_orders_by_severity_then_recency() {
        // ---
        let now = fixtures::now();
        let alerts = vec![
            Alert::LowStock {
                part_code: "P-OLD".to_string(),
                part_name: "Belt".to_string(),
                quantity: 1,
                minimum: 3,
                updated_at: now - Duration::days(2),
            },
            Alert::AnomalyDetected {
                machine_code: "M-1".to_string(),
                reason: "Oil pressure anomaly: 12 (normal: 40.0±1.0)".to_string(),
                recorded_at: now - Duration::hours(5),
            },
            Alert::LowStock {
                part_code: "P-NEW".to_string(),
                part_name: "Gasket".to_string(),
                quantity: 0,
                minimum: 3,
                updated_at: now - Duration::hours(1),
            },
            Alert::AnomalyDetected {
                machine_code: "M-2".to_string(),
                reason: "Temperature anomaly: 99°C (normal: 70.0±1.0)".to_string(),
                recorded_at: now - Duration::hours(1),
            },
        ];

        let feed = rank(alerts);
        let refs: Vec<&str> = feed
            .notifications
            .iter()
            .map(|n| n.reference_id.as_str())
            .collect();
        assert_eq!(refs, vec!["M-2", "M-1", "P-NEW", "P-OLD"]);
        assert_eq!(feed.notifications[0].severity, Severity::Critical);
        assert_eq!(feed.counts.critical, 2);
        assert_eq!(feed.counts.medium, 2);
    }

    #[test]
    fn test_severity_total_order() {
        // ---
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_feed_serializes_flat_counts_and_type_tag() {
        // ---
        let feed = rank(vec![Alert::PendingWorkOrder {
            work_order_code: "WO-7".to_string(),
            machine_code: "M-7".to_string(),
            title: "Align rollers".to_string(),
            scheduled: today(),
        }]);
        let json = serde_json::to_value(&feed).unwrap();

        assert_eq!(json["total"], 1);
        assert_eq!(json["medium"], 1);
        assert_eq!(json["critical"], 0);
        assert_eq!(json["notifications"][0]["type"], "PENDING_WORK_ORDER");
        assert_eq!(json["notifications"][0]["severity"], "MEDIUM");
    }
}
