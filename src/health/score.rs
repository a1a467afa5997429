//! On-demand health score from an outlier model fitted over the recent window.
//!
//! Every call refits the model against current readings; nothing is cached.
//! The fit runs on the blocking pool under a time budget.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::forest::{OutlierScorer, Sample};
use crate::error::{MonitorError, Result};
use crate::models::{Machine, Reading};
use crate::store::{EntityStore, ReadingQuery};

// ---

const WINDOW_DAYS: i64 = 30;
const MIN_READINGS: usize = 10;
const CRITICAL_BELOW: u8 = 60;
const WARNING_BELOW: u8 = 80;
const UNSCHEDULED_FREQUENCY_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreStatus {
    InsufficientData,
    Critical,
    Warning,
    Healthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    Declining,
}

/// Returned when the window is too thin to fit a model. Not an error.
#[derive(Debug, Clone, Serialize)]
pub struct InsufficientData {
    pub machine_id: Uuid,
    pub machine_code: String,
    pub health_score: Option<u8>,
    pub status: ScoreStatus,
    pub message: &'static str,
    pub readings_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthScore {
    pub machine_id: Uuid,
    pub machine_code: String,
    pub machine_name: String,
    pub health_score: u8,
    pub status: ScoreStatus,
    pub message: &'static str,
    pub trend: Trend,
    pub scheduled_maintenance: Option<NaiveDate>,
    pub predicted_maintenance: NaiveDate,
    pub days_until_predicted: i64,
    pub readings_analyzed: usize,
    pub anomalies_detected: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScoreResult {
    InsufficientData(InsufficientData),
    Scored(HealthScore),
}

fn features(reading: &Reading) -> Sample {
    let m = &reading.metrics;
    [
        m.temperature.unwrap_or(0.0),
        m.vibration_level.unwrap_or(0.0),
        m.oil_pressure.unwrap_or(0.0),
    ]
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Min-max position of the last score within the window, as 0..=100.
fn normalize_latest(decision: &[f64]) -> u8 {
    // ---
    let Some(&latest) = decision.last() else {
        return 100;
    };
    let (min, max) = decision
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    if max == min {
        return 100;
    }
    (((latest - min) / (max - min)) * 100.0) as u8
}

/// Later half scoring above the earlier half reads as improvement.
fn trend(decision: &[f64]) -> Trend {
    // ---
    let mid = decision.len() / 2;
    let (earlier, later) = decision.split_at(mid);
    if !earlier.is_empty() && mean(later) > mean(earlier) {
        Trend::Improving
    } else {
        Trend::Declining
    }
}

/// Score a machine over `window`, which must be ordered oldest first.
pub fn analyze<M>(
    machine: &Machine,
    window: &[Reading],
    scorer: &M,
    today: NaiveDate,
) -> ScoreResult
where
    M: OutlierScorer + ?Sized,
{
    // ---
    if window.len() < MIN_READINGS {
        return ScoreResult::InsufficientData(InsufficientData {
            machine_id: machine.id,
            machine_code: machine.machine_code.clone(),
            health_score: None,
            status: ScoreStatus::InsufficientData,
            message: "Need at least 10 readings for analysis",
            readings_count: window.len(),
        });
    }

    let samples: Vec<Sample> = window.iter().map(features).collect();
    let scores = scorer.fit_score(&samples);
    let health_score = normalize_latest(&scores.decision);

    let (status, message, predicted_days) = if health_score < CRITICAL_BELOW {
        (ScoreStatus::Critical, "Immediate maintenance recommended", 3)
    } else if health_score < WARNING_BELOW {
        (ScoreStatus::Warning, "Schedule maintenance soon", 7)
    } else {
        let days = if machine.next_maintenance_date.is_some() {
            i64::from(machine.maintenance_frequency_days)
        } else {
            UNSCHEDULED_FREQUENCY_DAYS
        };
        (ScoreStatus::Healthy, "Machine operating normally", days)
    };

    let predicted_maintenance = today
        .checked_add_signed(Duration::days(predicted_days))
        .unwrap_or(NaiveDate::MAX);

    ScoreResult::Scored(HealthScore {
        machine_id: machine.id,
        machine_code: machine.machine_code.clone(),
        machine_name: machine.machine_name.clone(),
        health_score,
        status,
        message,
        trend: trend(&scores.decision),
        scheduled_maintenance: machine.next_maintenance_date,
        predicted_maintenance,
        days_until_predicted: predicted_days,
        readings_analyzed: window.len(),
        anomalies_detected: scores.outlier_count(),
    })
}

/// Load the window and score it, bounding the model fit by `budget`.
pub async fn compute_health_score<S, M>(
    store: &S,
    scorer: M,
    machine_id: Uuid,
    now: DateTime<Utc>,
    budget: StdDuration,
) -> Result<ScoreResult>
where
    S: EntityStore + ?Sized,
    M: OutlierScorer + Send + 'static,
{
    // ---
    let machine = store
        .find_machine(machine_id)
        .await?
        .ok_or_else(|| MonitorError::machine_not_found(machine_id))?;

    let mut window = store
        .readings_by_machine(&ReadingQuery {
            machine_id,
            since: now - Duration::days(WINDOW_DAYS),
            exclude_anomalous: false,
            limit: None,
        })
        .await?;
    window.reverse();
    debug!(
        machine = %machine.machine_code,
        readings = window.len(),
        "health score window"
    );

    let today = now.date_naive();
    if window.len() < MIN_READINGS {
        return Ok(analyze(&machine, &window, &scorer, today));
    }

    let fit = tokio::task::spawn_blocking(move || analyze(&machine, &window, &scorer, today));
    let result = tokio::time::timeout(budget, fit)
        .await
        .map_err(|_| MonitorError::Timeout(budget))?
        .map_err(|e| MonitorError::Task(e.to_string()))?;

    if let ScoreResult::Scored(score) = &result {
        info!(
            machine = %score.machine_code,
            score = score.health_score,
            status = ?score.status,
            trend = ?score.trend,
            "health score computed"
        );
    }
    Ok(result)
}
