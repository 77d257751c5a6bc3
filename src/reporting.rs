use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::models::status::{DeliveryStatus, FanoutReport};

/// Observer of completed fan-outs. Implementations cannot influence the
/// engine: they get a shared reference and return nothing.
pub trait FanoutReporter: Send + Sync {
    fn report(&self, report: &FanoutReport);
}

pub struct NoopReporter;

impl FanoutReporter for NoopReporter {
    fn report(&self, _report: &FanoutReport) {}
}

/// Emits one structured event per endpoint outcome plus a summary.
pub struct TracingReporter;

impl FanoutReporter for TracingReporter {
    fn report(&self, report: &FanoutReport) {
        for outcome in &report.outcomes {
            match &outcome.status {
                DeliveryStatus::Delivered => info!(
                    run_id = %report.run_id,
                    endpoint_id = outcome.endpoint_id,
                    endpoint = outcome.detail.as_deref().unwrap_or_default(),
                    status = outcome.status.as_str(),
                    "Endpoint outcome"
                ),
                status => warn!(
                    run_id = %report.run_id,
                    endpoint_id = outcome.endpoint_id,
                    endpoint = outcome.detail.as_deref().unwrap_or_default(),
                    status = status.as_str(),
                    reason = status.reason().unwrap_or_default(),
                    deactivated = outcome.deactivated,
                    "Endpoint outcome"
                ),
            }
        }

        let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();

        info!(
            run_id = %report.run_id,
            notification_id = report.notification_id,
            broadcast = report.broadcast,
            sent = report.result.sent_count,
            failed = report.result.failed_count,
            deactivated = report.result.deactivated_count,
            elapsed_ms,
            "Fan-out report"
        );

        if report.suspected_outage() {
            warn!(
                run_id = %report.run_id,
                failed = report.result.failed_count,
                "Every delivery failed without a permanent rejection; check the transport"
            );
        }
    }
}

/// Keeps the most recent report for the operator API.
#[derive(Clone, Default)]
pub struct LatestReport {
    inner: Arc<RwLock<Option<FanoutReport>>>,
}

impl LatestReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<FanoutReport> {
        self.inner.read().clone()
    }
}

impl FanoutReporter for LatestReport {
    fn report(&self, report: &FanoutReport) {
        *self.inner.write() = Some(report.clone());
    }
}

/// Forwards every report to each inner reporter, in order.
#[derive(Default)]
pub struct Reporters {
    reporters: Vec<Arc<dyn FanoutReporter>>,
}

impl Reporters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Arc<dyn FanoutReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl FanoutReporter for Reporters {
    fn report(&self, report: &FanoutReport) {
        for reporter in &self.reporters {
            reporter.report(report);
        }
    }
}
