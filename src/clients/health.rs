use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    clients::database::DatabaseClient,
    models::health::{DatabaseHealth, HealthReport, TransportHealth},
    reporting::LatestReport,
};

/// Checks the pool the engine reads from, so a dropped database shows up
/// here the same way it shows up in fan-out calls.
pub struct HealthChecker {
    database: Arc<DatabaseClient>,
    latest_report: LatestReport,
}

impl HealthChecker {
    pub fn new(database: Arc<DatabaseClient>, latest_report: LatestReport) -> Self {
        Self {
            database,
            latest_report,
        }
    }

    pub async fn check_all(&self) -> HealthReport {
        let database = self.check_database().await;
        let transport = transport_health(&self.latest_report);

        HealthReport::new(database, transport)
    }

    async fn check_database(&self) -> DatabaseHealth {
        match self.database.health_check().await {
            Ok(latency_ms) => {
                debug!(latency_ms, "Database health check passed");
                DatabaseHealth::reachable(latency_ms)
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                DatabaseHealth::unreachable(e.to_string())
            }
        }
    }
}

pub fn transport_health(latest_report: &LatestReport) -> TransportHealth {
    let report = latest_report.get();
    let health = TransportHealth::from_last_report(report.as_ref());

    if let Some(run) = health.last_run.as_ref().filter(|run| run.suspected_outage) {
        warn!(
            run_id = %run.run_id,
            failed = run.result.failed_count,
            "Last fan-out failed for every endpoint"
        );
    }

    health
}
