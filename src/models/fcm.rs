use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    models::payload::{Payload, PayloadAction},
    utils::absolute_link,
};

#[derive(Debug, Clone, Serialize)]
pub struct FcmRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    pub token: String,
    pub notification: FcmNotification,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpush: Option<FcmWebpushConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmWebpushConfig {
    pub headers: HashMap<String, String>,
    pub notification: FcmWebNotification,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_options: Option<FcmWebpushOptions>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmWebNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<PayloadAction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmWebpushOptions {
    pub link: String,
}

impl FcmRequest {
    /// `fcm_options.link` must be absolute https; it is omitted otherwise.
    pub fn for_payload(
        token: &str,
        payload: &Payload,
        ttl_seconds: u64,
        public_base_url: Option<&str>,
    ) -> Self {
        let mut data = HashMap::new();
        data.insert("type".to_string(), payload.data.kind.clone());
        data.insert("id".to_string(), payload.data.id.to_string());
        data.insert("category".to_string(), payload.data.category.to_string());
        data.insert(
            "isBroadcast".to_string(),
            payload.data.is_broadcast.to_string(),
        );
        data.insert("timestamp".to_string(), payload.data.timestamp.clone());
        data.insert("url".to_string(), payload.data.url.clone());

        let mut headers = HashMap::new();
        headers.insert("TTL".to_string(), ttl_seconds.to_string());

        Self {
            message: FcmMessage {
                token: token.to_string(),
                notification: FcmNotification {
                    title: payload.title.clone(),
                    body: payload.body.clone(),
                },
                data: Some(data),
                webpush: Some(FcmWebpushConfig {
                    headers,
                    notification: FcmWebNotification {
                        title: payload.title.clone(),
                        body: payload.body.clone(),
                        icon: payload.icon.clone(),
                        badge: payload.badge.clone(),
                        tag: payload.tag.clone(),
                        require_interaction: payload.require_interaction,
                        actions: payload.actions.clone(),
                    },
                    fcm_options: absolute_link(&payload.data.url, public_base_url)
                        .map(|link| FcmWebpushOptions { link }),
                }),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmErrorResponse {
    pub error: FcmError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmError {
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmErrorDetail {
    #[serde(default)]
    pub error_code: Option<String>,

    #[serde(default)]
    pub field_violations: Vec<FcmFieldViolation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmFieldViolation {
    pub field: String,

    #[serde(default)]
    pub description: String,
}

impl FcmError {
    /// The FCM-specific error code (`UNREGISTERED`, `QUOTA_EXCEEDED`, ...),
    /// falling back to the generic RPC status.
    pub fn error_code(&self) -> Option<&str> {
        self.details
            .iter()
            .find_map(|d| d.error_code.as_deref())
            .or(self.status.as_deref())
    }

    /// True when the request was rejected because of `message.token`, as
    /// opposed to some other field of the message.
    pub fn rejects_token(&self) -> bool {
        self.details
            .iter()
            .flat_map(|d| d.field_violations.iter())
            .any(|v| v.field == "message.token")
    }
}
