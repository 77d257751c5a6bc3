use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use anyhow::Error;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{FutureExt, StreamExt, stream};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        endpoint::{EndpointRecord, OwnerRef},
        notification::Notification,
        payload::{Payload, PayloadBuilder},
        status::{DeliveryOutcome, DeliveryStatus, FanoutReport, FanoutResult},
        validation::validate_notification,
    },
    reporting::{FanoutReporter, NoopReporter},
};

/// Performs one push send. Wire-protocol details (encryption, HTTP
/// semantics, provider headers) live entirely behind this trait.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, endpoint: &EndpointRecord, payload: &Payload)
    -> Result<DeliveryStatus, Error>;
}

#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Active endpoints, restricted to `owner` when one is given.
    async fn active_endpoints(&self, owner: Option<&OwnerRef>)
    -> Result<Vec<EndpointRecord>, Error>;

    async fn deactivate(&self, endpoint_id: i64) -> Result<(), Error>;

    async fn reactivate(&self, endpoint_id: i64) -> Result<(), Error>;
}

#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn notification(&self, id: i64) -> Result<Option<Notification>, Error>;
}

/// Call-level failures. Nothing here is ever raised for a single endpoint.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("invalid notification: {0}")]
    InvalidNotification(String),

    #[error("notification {0} not found")]
    NotificationNotFound(i64),

    #[error("source unavailable: {0:#}")]
    Source(Error),
}

#[derive(Debug, Clone)]
pub struct FanoutOptions {
    pub concurrency: usize,
    pub send_timeout: Duration,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            concurrency: 16,
            send_timeout: Duration::from_secs(10),
        }
    }
}

pub struct FanoutEngine {
    endpoints: Arc<dyn EndpointSource>,
    notifications: Arc<dyn NotificationSource>,
    transport: Arc<dyn DeliveryTransport>,
    reporter: Arc<dyn FanoutReporter>,
    payload_builder: PayloadBuilder,
    options: FanoutOptions,
}

impl FanoutEngine {
    pub fn new(
        endpoints: Arc<dyn EndpointSource>,
        notifications: Arc<dyn NotificationSource>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        Self {
            endpoints,
            notifications,
            transport,
            reporter: Arc::new(NoopReporter),
            payload_builder: PayloadBuilder::default(),
            options: FanoutOptions::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FanoutReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_payload_builder(mut self, payload_builder: PayloadBuilder) -> Self {
        self.payload_builder = payload_builder;
        self
    }

    pub fn with_options(mut self, options: FanoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn payload_builder(&self) -> &PayloadBuilder {
        &self.payload_builder
    }

    /// Loads the notification, builds its payload and fans it out.
    pub async fn fan_out_by_id(&self, notification_id: i64) -> Result<FanoutResult, FanoutError> {
        self.fan_out_report_by_id(notification_id)
            .await
            .map(|report| report.result)
    }

    pub async fn fan_out_report_by_id(
        &self,
        notification_id: i64,
    ) -> Result<FanoutReport, FanoutError> {
        let notification = self
            .notifications
            .notification(notification_id)
            .await
            .map_err(FanoutError::Source)?
            .ok_or(FanoutError::NotificationNotFound(notification_id))?;

        let payload = self.payload_builder.build(&notification);

        self.fan_out_report(&notification, &payload).await
    }

    /// Fans out `notification` with a payload from the engine's builder.
    pub async fn fan_out_notification(
        &self,
        notification: &Notification,
    ) -> Result<FanoutResult, FanoutError> {
        let payload = self.payload_builder.build(notification);

        self.fan_out(notification, &payload).await
    }

    pub async fn fan_out(
        &self,
        notification: &Notification,
        payload: &Payload,
    ) -> Result<FanoutResult, FanoutError> {
        self.fan_out_report(notification, payload)
            .await
            .map(|report| report.result)
    }

    /// Same as [`fan_out`](Self::fan_out), returning the full report that
    /// was handed to the reporter.
    pub async fn fan_out_report(
        &self,
        notification: &Notification,
        payload: &Payload,
    ) -> Result<FanoutReport, FanoutError> {
        validate_notification(notification)
            .map_err(|e| FanoutError::InvalidNotification(e.to_string()))?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let targets = self.select_targets(notification).await?;

        info!(
            run_id = %run_id,
            notification_id = notification.id,
            broadcast = notification.is_broadcast,
            targets = targets.len(),
            "Starting fan-out"
        );

        let mut outcomes: Vec<DeliveryOutcome> = stream::iter(targets)
            .map(|endpoint| async move { self.deliver(endpoint, payload).await })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        outcomes.sort_by_key(|outcome| outcome.endpoint_id);

        let result = FanoutResult::from_outcomes(&outcomes);

        info!(
            run_id = %run_id,
            notification_id = notification.id,
            sent = result.sent_count,
            failed = result.failed_count,
            deactivated = result.deactivated_count,
            "Fan-out finished"
        );

        let report = FanoutReport {
            run_id,
            notification_id: notification.id,
            broadcast: notification.is_broadcast,
            outcomes,
            result,
            started_at,
            finished_at: Utc::now(),
        };
        self.reporter.report(&report);

        Ok(report)
    }

    /// Broadcast targets every active endpoint; otherwise only the active
    /// endpoints of the notification's owner. Ordered by endpoint id.
    pub async fn select_targets(
        &self,
        notification: &Notification,
    ) -> Result<Vec<EndpointRecord>, FanoutError> {
        let owner = if notification.is_broadcast {
            None
        } else {
            let owner = notification.owner_ref.as_ref().ok_or_else(|| {
                FanoutError::InvalidNotification(format!(
                    "Targeted notification {} has no recipient",
                    notification.id
                ))
            })?;
            Some(owner)
        };

        let mut targets = self
            .endpoints
            .active_endpoints(owner)
            .await
            .map_err(FanoutError::Source)?;

        targets.retain(|endpoint| {
            endpoint.active && owner.is_none_or(|owner| &endpoint.owner_ref == owner)
        });
        targets.sort_by_key(|endpoint| endpoint.id);
        targets.dedup_by_key(|endpoint| endpoint.id);

        debug!(
            notification_id = notification.id,
            owner = ?owner.map(OwnerRef::as_str),
            count = targets.len(),
            "Targets selected"
        );

        Ok(targets)
    }

    async fn deliver(&self, endpoint: EndpointRecord, payload: &Payload) -> DeliveryOutcome {
        let attempt = AssertUnwindSafe(self.transport.send(&endpoint, payload)).catch_unwind();

        let status = match timeout(self.options.send_timeout, attempt).await {
            Ok(Ok(Ok(status))) => status,
            Ok(Ok(Err(e))) => DeliveryStatus::RetryableFailure(format!("Transport error: {}", e)),
            Ok(Err(_)) => DeliveryStatus::RetryableFailure("Transport panicked".to_string()),
            Err(_) => DeliveryStatus::RetryableFailure(format!(
                "Timed out after {} ms",
                self.options.send_timeout.as_millis()
            )),
        };

        let short_uri = endpoint.short_uri();
        let mut deactivated = false;
        let mut detail = short_uri.clone();

        match &status {
            DeliveryStatus::Delivered => {
                debug!(endpoint_id = endpoint.id, endpoint = %short_uri, "Delivered");
            }
            DeliveryStatus::RetryableFailure(reason) => {
                warn!(
                    endpoint_id = endpoint.id,
                    endpoint = %short_uri,
                    reason = %reason,
                    "Delivery failed, endpoint kept active"
                );
            }
            DeliveryStatus::PermanentFailure(reason) => {
                warn!(
                    endpoint_id = endpoint.id,
                    endpoint = %short_uri,
                    reason = %reason,
                    "Endpoint rejected permanently"
                );

                match self.endpoints.deactivate(endpoint.id).await {
                    Ok(()) => {
                        info!(endpoint_id = endpoint.id, "Endpoint deactivated");
                        deactivated = true;
                    }
                    Err(e) => {
                        warn!(
                            endpoint_id = endpoint.id,
                            error = %e,
                            "Failed to deactivate endpoint"
                        );
                        detail = format!("{} (deactivation failed: {})", short_uri, e);
                    }
                }
            }
        }

        let mut outcome = DeliveryOutcome::new(endpoint.id, status).with_detail(detail);
        outcome.deactivated = deactivated;
        outcome
    }
}
