use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::{
    config::Config,
    fanout::DeliveryTransport,
    models::{
        endpoint::EndpointRecord,
        fcm::{FcmError, FcmErrorResponse, FcmRequest},
        payload::Payload,
        status::DeliveryStatus,
        validation::validate_fcm_token,
    },
};

const FCM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];

/// Supplies OAuth bearer tokens for the FCM HTTP v1 API.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, Error>;
}

/// Tokens from Google application default credentials.
pub struct GcpTokenSource {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl GcpTokenSource {
    pub async fn new() -> Result<Self, Error> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| anyhow!("Failed to load Google credentials: {}", e))?;

        Ok(Self { provider })
    }
}

#[async_trait]
impl AccessTokenSource for GcpTokenSource {
    async fn access_token(&self) -> Result<String, Error> {
        let token = self.provider.token(FCM_SCOPES).await?;
        Ok(token.as_str().to_string())
    }
}

pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, Error> {
        Ok(self.0.clone())
    }
}

/// Delivery transport over Firebase Cloud Messaging. The endpoint URI of
/// each record is its FCM registration token.
pub struct FcmClient {
    http_client: Client,
    send_url: String,
    ttl_seconds: u64,
    public_base_url: Option<String>,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FcmClient {
    pub fn new(config: &Config, tokens: Arc<dyn AccessTokenSource>) -> Result<Self, Error> {
        let project_id = config
            .fcm_project_id
            .as_deref()
            .ok_or_else(|| anyhow!("FCM_PROJECT_ID is required for the FCM transport"))?;

        Ok(Self::with_base_url(
            &config.fcm_base_url,
            project_id,
            config.push_ttl_seconds,
            config.send_timeout(),
            tokens,
        )?
        .with_public_base_url(config.public_base_url.clone()))
    }

    pub fn with_base_url(
        base_url: &str,
        project_id: &str,
        ttl_seconds: u64,
        request_timeout: Duration,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(project_id, "FCM client initialized");

        Ok(Self {
            http_client,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
            ttl_seconds,
            public_base_url: None,
            tokens,
        })
    }

    pub fn with_public_base_url(mut self, public_base_url: Option<String>) -> Self {
        self.public_base_url = public_base_url;
        self
    }
}

#[async_trait]
impl DeliveryTransport for FcmClient {
    async fn send(
        &self,
        endpoint: &EndpointRecord,
        payload: &Payload,
    ) -> Result<DeliveryStatus, Error> {
        // A record this transport cannot address says nothing about whether
        // the subscription is alive.
        if let Err(e) = validate_fcm_token(&endpoint.endpoint_uri) {
            return Ok(DeliveryStatus::RetryableFailure(format!(
                "Not deliverable over FCM: {}",
                e
            )));
        }

        debug!(endpoint_id = endpoint.id, tag = %payload.tag, "Sending FCM push notification");

        let bearer = self.tokens.access_token().await?;
        let request = FcmRequest::for_payload(
            &endpoint.endpoint_uri,
            payload,
            self.ttl_seconds,
            self.public_base_url.as_deref(),
        );

        let response = self
            .http_client
            .post(&self.send_url)
            .bearer_auth(bearer)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint_id = endpoint.id, "FCM accepted push notification");
            return Ok(DeliveryStatus::Delivered);
        }

        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<FcmErrorResponse>(&body)
            .ok()
            .map(|r| r.error);

        Ok(classify_error(status.as_u16(), error.as_ref()))
    }
}

pub fn classify_error(status: u16, error: Option<&FcmError>) -> DeliveryStatus {
    classify_response(
        status,
        error.and_then(FcmError::error_code),
        error.is_some_and(FcmError::rejects_token),
    )
}

/// Maps an FCM error response onto a delivery status. Only answers about the
/// registration token itself are permanent. A malformed message, a wrong
/// project, auth, quota and server problems say nothing about the endpoint.
pub fn classify_response(
    status: u16,
    error_code: Option<&str>,
    token_rejected: bool,
) -> DeliveryStatus {
    let reason = match error_code {
        Some(code) => format!("FCM returned {} {}", status, code),
        None => format!("FCM returned {}", status),
    };

    match error_code {
        Some("UNREGISTERED" | "SENDER_ID_MISMATCH") => DeliveryStatus::PermanentFailure(reason),
        Some("INVALID_ARGUMENT") if token_rejected => {
            DeliveryStatus::PermanentFailure(format!("{} (message.token)", reason))
        }
        _ => DeliveryStatus::RetryableFailure(reason),
    }
}
