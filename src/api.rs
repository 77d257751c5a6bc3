use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    clients::health::HealthChecker,
    fanout::{FanoutEngine, FanoutError},
    models::{
        health::HealthStatus,
        response::{ErrorResponse, FanoutSummary},
    },
    reporting::LatestReport,
};

pub struct AppState {
    pub health_checker: HealthChecker,
    pub engine: Arc<FanoutEngine>,
    pub latest_report: LatestReport,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/reports/latest", get(latest_report))
        .route("/notifications/{id}/fan-out", post(trigger_fan_out))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(port: u16, state: Arc<AppState>) -> Result<(), Error> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Operator API started");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn latest_report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest_report.get() {
        Some(report) => (StatusCode::OK, Json(report)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("no_report", "No fan-out has run yet")),
        )
            .into_response(),
    }
}

async fn trigger_fan_out(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.engine.fan_out_report_by_id(id).await {
        Ok(report) => (StatusCode::OK, Json(FanoutSummary::from(&report))).into_response(),
        Err(e) => {
            warn!(notification_id = id, error = %e, "Fan-out request failed");

            let status_code = match &e {
                FanoutError::NotificationNotFound(_) => StatusCode::NOT_FOUND,
                FanoutError::InvalidNotification(_) => StatusCode::UNPROCESSABLE_ENTITY,
                FanoutError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
            };

            (status_code, Json(ErrorResponse::from(&e))).into_response()
        }
    }
}
