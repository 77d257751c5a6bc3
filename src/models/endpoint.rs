use std::fmt::{Display, Formatter, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque reference to the recipient that owns an endpoint or authored a
/// notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerRef(pub String);

impl OwnerRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.0)
    }
}

/// Which push protocol an endpoint URI belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A push-service URL from the browser Push API, paired with `p256dh`
    /// and `auth` keys.
    WebPush,
    /// A bare FCM registration token.
    FcmToken,
}

impl EndpointKind {
    pub fn as_str(&self) -> &str {
        match self {
            EndpointKind::WebPush => "web_push",
            EndpointKind::FcmToken => "fcm_token",
        }
    }
}

impl Display for EndpointKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered push delivery target for one recipient device or session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub id: i64,
    pub owner_ref: OwnerRef,
    pub endpoint_uri: String,
    pub p256dh: String,
    pub auth_secret: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl EndpointRecord {
    pub fn new(id: i64, owner_ref: OwnerRef, endpoint_uri: impl Into<String>) -> Self {
        Self {
            id,
            owner_ref,
            endpoint_uri: endpoint_uri.into(),
            p256dh: String::new(),
            auth_secret: String::new(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_keys(mut self, p256dh: impl Into<String>, auth_secret: impl Into<String>) -> Self {
        self.p256dh = p256dh.into();
        self.auth_secret = auth_secret.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn kind(&self) -> EndpointKind {
        if self.endpoint_uri.starts_with("https://") || self.endpoint_uri.starts_with("http://") {
            EndpointKind::WebPush
        } else {
            EndpointKind::FcmToken
        }
    }

    /// Endpoint URI shortened for log lines: first 50 characters, then `...`.
    pub fn short_uri(&self) -> String {
        let mut chars = self.endpoint_uri.chars();
        let head: String = chars.by_ref().take(50).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}
