use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use push_fanout::{
    clients::health::transport_health,
    models::{
        health::{DatabaseHealth, HealthReport, HealthStatus, TransportHealth},
        response::FanoutSummary,
        status::{DeliveryOutcome, DeliveryStatus, FanoutReport, FanoutResult},
    },
    reporting::{FanoutReporter, LatestReport, NoopReporter, Reporters, TracingReporter},
};
use uuid::Uuid;

fn report(outcomes: Vec<DeliveryOutcome>) -> FanoutReport {
    let result = FanoutResult::from_outcomes(&outcomes);
    FanoutReport {
        run_id: Uuid::new_v4(),
        notification_id: 7,
        broadcast: true,
        outcomes,
        result,
        started_at: Utc::now(),
        finished_at: Utc::now(),
    }
}

fn permanent(id: i64) -> DeliveryOutcome {
    let mut outcome =
        DeliveryOutcome::new(id, DeliveryStatus::PermanentFailure("expired".to_string()));
    outcome.deactivated = true;
    outcome
}

/// Test: Aggregation counts one outcome per endpoint
#[test]
fn test_result_from_outcomes() {
    let outcomes = vec![
        DeliveryOutcome::new(1, DeliveryStatus::Delivered),
        DeliveryOutcome::new(2, DeliveryStatus::RetryableFailure("busy".to_string())),
        permanent(3),
        DeliveryOutcome::new(4, DeliveryStatus::Delivered),
    ];

    let result = FanoutResult::from_outcomes(&outcomes);

    assert_eq!(result.sent_count, 2);
    assert_eq!(result.failed_count, 2);
    assert_eq!(result.deactivated_count, 1);
    assert_eq!(result.attempted(), 4);
}

/// Test: Outage detection needs total failure without permanent rejections
#[test]
fn test_suspected_outage() {
    let outage = report(vec![
        DeliveryOutcome::new(1, DeliveryStatus::RetryableFailure("timeout".to_string())),
        DeliveryOutcome::new(2, DeliveryStatus::RetryableFailure("timeout".to_string())),
    ]);
    assert!(outage.suspected_outage());

    let pruned = report(vec![
        DeliveryOutcome::new(1, DeliveryStatus::RetryableFailure("timeout".to_string())),
        permanent(2),
    ]);
    assert!(!pruned.suspected_outage());

    let partial = report(vec![
        DeliveryOutcome::new(1, DeliveryStatus::RetryableFailure("timeout".to_string())),
        DeliveryOutcome::new(2, DeliveryStatus::Delivered),
    ]);
    assert!(!partial.suspected_outage());

    assert!(!report(Vec::new()).suspected_outage());
}

/// Test: The composite reporter forwards to every reporter
#[test]
fn test_reporters_forward_reports() -> Result<()> {
    let first = LatestReport::new();
    let second = LatestReport::new();
    let reporters = Reporters::new()
        .with(Arc::new(NoopReporter))
        .with(Arc::new(TracingReporter))
        .with(Arc::new(first.clone()))
        .with(Arc::new(second.clone()));

    let fanout = report(vec![DeliveryOutcome::new(1, DeliveryStatus::Delivered)]);
    reporters.report(&fanout);

    assert_eq!(first.get().map(|r| r.run_id), Some(fanout.run_id));
    assert_eq!(second.get().map(|r| r.result), Some(fanout.result));

    Ok(())
}

/// Test: Transport health degrades after a suspected outage
#[test]
fn test_transport_health_follows_latest_report() {
    let latest = LatestReport::new();
    assert_eq!(transport_health(&latest).status, HealthStatus::Healthy);

    latest.report(&report(vec![DeliveryOutcome::new(
        1,
        DeliveryStatus::RetryableFailure("connection refused".to_string()),
    )]));
    assert_eq!(transport_health(&latest).status, HealthStatus::Degraded);

    latest.report(&report(vec![permanent(1)]));
    assert_eq!(transport_health(&latest).status, HealthStatus::Healthy);
}

/// Test: Overall status is the worst component status
#[test]
fn test_overall_status() {
    assert_eq!(HealthStatus::worst(Vec::<HealthStatus>::new()), HealthStatus::Healthy);

    let idle = TransportHealth::from_last_report(None);
    let health = HealthReport::new(DatabaseHealth::reachable(3), idle);
    assert_eq!(health.status, HealthStatus::Healthy);

    let outage = report(vec![DeliveryOutcome::new(
        1,
        DeliveryStatus::RetryableFailure("timeout".to_string()),
    )]);
    let degraded = TransportHealth::from_last_report(Some(&outage));
    let health = HealthReport::new(DatabaseHealth::reachable(3), degraded.clone());
    assert_eq!(health.status, HealthStatus::Degraded);

    let health = HealthReport::new(DatabaseHealth::unreachable("refused".to_string()), degraded);
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert_eq!(health.database.error.as_deref(), Some("refused"));
}

/// Test: A summary carries the run's counts without its outcomes
#[test]
fn test_summary_from_report() -> Result<()> {
    let mut fanout = report(vec![
        DeliveryOutcome::new(1, DeliveryStatus::Delivered),
        permanent(2),
    ]);
    fanout.finished_at = fanout.started_at + Duration::milliseconds(250);

    let summary = FanoutSummary::from(&fanout);
    assert_eq!(summary.run_id, fanout.run_id);
    assert_eq!(summary.result, fanout.result);
    assert_eq!(summary.duration_ms, 250);
    assert!(!summary.suspected_outage);

    let json = serde_json::to_value(&summary)?;
    assert_eq!(json["sent_count"], 1);
    assert_eq!(json["deactivated_count"], 1);
    assert!(json.get("outcomes").is_none());

    let health = TransportHealth::from_last_report(Some(&fanout));
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.last_run, Some(summary));

    Ok(())
}
