//! Two-sigma anomaly detection for incoming readings.
//!
//! Each new reading is compared, metric by metric, against the machine's
//! recent non-anomalous history. The verdict is stored on the reading when it
//! is created and never revisited.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MonitorError, Result};
use crate::models::{Machine, Metrics, NewReading, Reading, ReadingRecord};
use crate::store::{EntityStore, ReadingQuery};

// ---

const BASELINE_WINDOW_DAYS: i64 = 30;
const BASELINE_LIMIT: i64 = 50;
const MIN_BASELINE_READINGS: usize = 3;
const SIGMA_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Vibration,
    OilPressure,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Vibration, Metric::OilPressure];

    fn label(&self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Vibration => "Vibration",
            Self::OilPressure => "Oil pressure",
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Vibration | Self::OilPressure => "",
        }
    }

    pub fn value(&self, metrics: &Metrics) -> Option<f64> {
        match self {
            Self::Temperature => metrics.temperature,
            Self::Vibration => metrics.vibration_level,
            Self::OilPressure => metrics.oil_pressure,
        }
    }
}

/// Outcome of a detection run; `reason` is empty when nothing flagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub reason: String,
}

/// Mean and population standard deviation of one metric's baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
}

impl Baseline {
    // ---
    pub fn from_values(values: &[f64]) -> Option<Self> {
        // ---
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    /// With a zero deviation the band collapses, so any differing value flags.
    pub fn deviates(&self, value: f64) -> bool {
        (value - self.mean).abs() > SIGMA_FACTOR * self.std_dev
    }
}

/// Compare `candidate` against `baseline`, which must already exclude
/// anomalous readings.
pub fn evaluate(baseline: &[Metrics], candidate: &Metrics) -> AnomalyVerdict {
    // ---
    if baseline.len() < MIN_BASELINE_READINGS {
        debug!(
            baseline = baseline.len(),
            "insufficient baseline, skipping anomaly test"
        );
        return AnomalyVerdict::default();
    }

    let findings: Vec<String> = Metric::ALL
        .iter()
        .filter_map(|metric| {
            let value = metric.value(candidate)?;
            let history: Vec<f64> = baseline.iter().filter_map(|m| metric.value(m)).collect();
            let stats = Baseline::from_values(&history)?;
            stats.deviates(value).then(|| {
                format!(
                    "{} anomaly: {}{} (normal: {:.1}±{:.1})",
                    metric.label(),
                    value,
                    metric.unit(),
                    stats.mean,
                    stats.std_dev
                )
            })
        })
        .collect();

    AnomalyVerdict {
        is_anomaly: !findings.is_empty(),
        reason: findings.join("; "),
    }
}

async fn baseline_for<S>(
    store: &S,
    machine_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Metrics>>
where
    S: EntityStore + ?Sized,
{
    // ---
    let query = ReadingQuery {
        machine_id,
        since: now - Duration::days(BASELINE_WINDOW_DAYS),
        exclude_anomalous: true,
        limit: Some(BASELINE_LIMIT),
    };
    let readings = store.readings_by_machine(&query).await?;
    Ok(readings.into_iter().map(|r| r.metrics).collect())
}

/// Run the detector for a machine without persisting anything.
pub async fn detect_anomaly<S>(
    store: &S,
    machine_id: Uuid,
    metrics: &Metrics,
    now: DateTime<Utc>,
) -> Result<AnomalyVerdict>
where
    S: EntityStore + ?Sized,
{
    // ---
    if store.find_machine(machine_id).await?.is_none() {
        return Err(MonitorError::machine_not_found(machine_id));
    }
    let baseline = baseline_for(store, machine_id, now).await?;
    Ok(evaluate(&baseline, metrics))
}

async fn resolve_machine<S>(store: &S, payload: &NewReading) -> Result<Machine>
where
    S: EntityStore + ?Sized,
{
    // ---
    if let Some(id) = payload.machine_id {
        return store
            .find_machine(id)
            .await?
            .ok_or_else(|| MonitorError::machine_not_found(id));
    }
    let code = payload.machine_code.as_deref().unwrap_or_default();
    store
        .find_machine_by_code(code)
        .await?
        .ok_or_else(|| MonitorError::NotFound {
            entity: "machine",
            id: code.to_string(),
        })
}

/// Validate, test and append a reading. The anomaly flag is decided here,
/// once, against history that predates the reading.
pub async fn record_reading<S>(
    store: &S,
    payload: NewReading,
    now: DateTime<Utc>,
) -> Result<Reading>
where
    S: EntityStore + ?Sized,
{
    // ---
    payload.validate()?;
    let machine = resolve_machine(store, &payload).await?;

    let baseline = baseline_for(store, machine.id, now).await?;
    let verdict = evaluate(&baseline, &payload.metrics);
    if verdict.is_anomaly {
        warn!(
            machine = %machine.machine_code,
            reason = %verdict.reason,
            "anomalous reading"
        );
    }

    let record = ReadingRecord {
        machine_id: machine.id,
        timestamp: now,
        metrics: payload.metrics,
        runtime_hours: payload.runtime_hours,
        notes: payload.notes.unwrap_or_default(),
        is_anomaly: verdict.is_anomaly,
        anomaly_reason: verdict.reason,
    };
    let reading = store.create_reading(&record).await?;

    info!(
        machine = %machine.machine_code,
        reading = %reading.id,
        is_anomaly = reading.is_anomaly,
        "reading recorded"
    );
    Ok(reading)
}
