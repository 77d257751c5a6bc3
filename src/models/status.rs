use std::fmt::{Display, Formatter, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the delivery transport reports for a single send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    RetryableFailure(String),
    PermanentFailure(String),
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryStatus::PermanentFailure(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::RetryableFailure(_) => "retryable_failure",
            DeliveryStatus::PermanentFailure(_) => "permanent_failure",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DeliveryStatus::Delivered => None,
            DeliveryStatus::RetryableFailure(reason) | DeliveryStatus::PermanentFailure(reason) => {
                Some(reason)
            }
        }
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.as_str(), reason),
            None => write!(f, "{}", self.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub endpoint_id: i64,
    pub status: DeliveryStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    pub deactivated: bool,
}

impl DeliveryOutcome {
    pub fn new(endpoint_id: i64, status: DeliveryStatus) -> Self {
        Self {
            endpoint_id,
            status,
            detail: None,
            deactivated: false,
        }
    }

    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutResult {
    pub sent_count: usize,
    pub failed_count: usize,
    pub deactivated_count: usize,
}

impl FanoutResult {
    pub fn attempted(&self) -> usize {
        self.sent_count + self.failed_count
    }

    pub fn record(mut self, outcome: &DeliveryOutcome) -> Self {
        if outcome.status.is_delivered() {
            self.sent_count += 1;
        } else {
            self.failed_count += 1;
        }
        if outcome.deactivated {
            self.deactivated_count += 1;
        }
        self
    }

    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), Self::record)
    }
}

/// Everything a reporter sees about one completed fan-out call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutReport {
    pub run_id: Uuid,
    pub notification_id: i64,
    pub broadcast: bool,
    pub outcomes: Vec<DeliveryOutcome>,
    pub result: FanoutResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FanoutReport {
    /// Every attempt failed and none permanently: the transport is more
    /// likely down than the endpoints dead.
    pub fn suspected_outage(&self) -> bool {
        self.result.attempted() > 0
            && self.result.sent_count == 0
            && !self.outcomes.iter().any(|o| o.status.is_permanent())
    }
}
