use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness probe values reported to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub now: DateTime<Utc>,
    pub random: f64,
}
