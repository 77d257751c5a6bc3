use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use push_fanout::{
    api::{AppState, run_api_server},
    clients::{
        database::DatabaseClient,
        fcm::{FcmClient, GcpTokenSource},
        health::HealthChecker,
        router::TransportRouter,
        web_push::WebPushClient,
    },
    config::Config,
    fanout::FanoutEngine,
    models::payload::PayloadBuilder,
    reporting::{LatestReport, Reporters, TracingReporter},
    utils::init_tracing,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(&config.log_format);

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let database = Arc::new(
        DatabaseClient::connect(
            &config.database_url,
            config.database_max_connections,
            config.database_acquire_timeout(),
        )
        .await?,
    );
    database.migrate().await?;

    let mut transport = TransportRouter::new();

    if let Some(vapid) = config.vapid_keys()? {
        let web_push = WebPushClient::new(vapid, config.push_ttl_seconds, config.send_timeout())?;
        transport = transport.with_web_push(Arc::new(web_push));
    }

    if config.fcm_project_id.is_some() {
        let tokens = Arc::new(GcpTokenSource::new().await?);
        transport = transport.with_fcm(Arc::new(FcmClient::new(&config, tokens)?));
    }

    if transport.is_empty() {
        return Err(anyhow!(
            "No push transport configured: set VAPID_PUBLIC_KEY and VAPID_PRIVATE_KEY, or FCM_PROJECT_ID"
        ));
    }

    let latest_report = LatestReport::new();
    let reporters = Reporters::new()
        .with(Arc::new(TracingReporter))
        .with(Arc::new(latest_report.clone()));

    let engine = FanoutEngine::new(database.clone(), database.clone(), Arc::new(transport))
        .with_reporter(Arc::new(reporters))
        .with_payload_builder(PayloadBuilder::new(config.payload_options()?))
        .with_options(config.fanout_options());

    info!(
        concurrency = config.fanout_concurrency,
        send_timeout_ms = config.send_timeout_ms,
        web_push = config.vapid_public_key.is_some(),
        fcm = config.fcm_project_id.is_some(),
        "Fan-out engine ready"
    );

    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(database, latest_report.clone()),
        engine: Arc::new(engine),
        latest_report,
    });

    run_api_server(config.server_port, state).await
}
