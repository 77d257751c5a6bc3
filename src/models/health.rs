use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{response::FanoutSummary, status::FanoutReport};

/// Ordered by severity, so the overall status is the maximum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn worst(statuses: impl IntoIterator<Item = HealthStatus>) -> Self {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub status: HealthStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatabaseHealth {
    pub fn reachable(latency_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn unreachable(error: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some(error),
        }
    }
}

/// Transport health as seen through the last fan-out. Degraded when that run
/// looks like an outage.
#[derive(Debug, Clone, Serialize)]
pub struct TransportHealth {
    pub status: HealthStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<FanoutSummary>,
}

impl TransportHealth {
    pub fn from_last_report(report: Option<&FanoutReport>) -> Self {
        let last_run = report.map(FanoutSummary::from);
        let status = match &last_run {
            Some(run) if run.suspected_outage => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        };

        Self { status, last_run }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub database: DatabaseHealth,
    pub transport: TransportHealth,
}

impl HealthReport {
    pub fn new(database: DatabaseHealth, transport: TransportHealth) -> Self {
        Self {
            status: HealthStatus::worst([database.status, transport.status]),
            checked_at: Utc::now(),
            database,
            transport,
        }
    }
}
