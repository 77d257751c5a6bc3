use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    fanout::FanoutError,
    models::status::{FanoutReport, FanoutResult},
};

/// One fan-out run without its per-endpoint outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanoutSummary {
    pub run_id: Uuid,
    pub notification_id: i64,
    pub broadcast: bool,

    #[serde(flatten)]
    pub result: FanoutResult,

    pub suspected_outage: bool,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl From<&FanoutReport> for FanoutSummary {
    fn from(report: &FanoutReport) -> Self {
        Self {
            run_id: report.run_id,
            notification_id: report.notification_id,
            broadcast: report.broadcast,
            result: report.result,
            suspected_outage: report.suspected_outage(),
            finished_at: report.finished_at,
            duration_ms: (report.finished_at - report.started_at)
                .num_milliseconds()
                .max(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code.
    pub error: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

impl From<&FanoutError> for ErrorResponse {
    fn from(error: &FanoutError) -> Self {
        let code = match error {
            FanoutError::InvalidNotification(_) => "invalid_notification",
            FanoutError::NotificationNotFound(_) => "notification_not_found",
            FanoutError::Source(_) => "source_unavailable",
        };

        Self::new(code, error.to_string())
    }
}
