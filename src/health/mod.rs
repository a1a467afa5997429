//! Health-monitoring pipeline: per-reading anomaly detection, coarse status
//! classification and the on-demand health score.
//!
//! Nothing in here is cached; every call reads current store state.

pub mod anomaly;
pub mod forest;
pub mod score;
pub mod status;

pub use anomaly::{detect_anomaly, record_reading, AnomalyVerdict};
pub use forest::IsolationForest;
pub use score::{compute_health_score, ScoreResult};
pub use status::{classify_health, classify_machine, health_report, HealthStatus};
