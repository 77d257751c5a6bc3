use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::{
    models::notification::{Category, Notification},
    utils::truncate_chars,
};

pub const MAX_TITLE_CHARS: usize = 80;
pub const MAX_BODY_CHARS: usize = 120;

pub const DEFAULT_ICON: &str = "/static/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/static/icons/badge-72x72.png";
pub const DEFAULT_DEEP_LINK_BASE: &str = "/notifications";

/// Transport-agnostic message handed to every endpoint of a fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: PayloadData,
    pub actions: Vec<PayloadAction>,
    pub require_interaction: bool,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadData {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    pub category: Category,
    pub is_broadcast: bool,
    pub timestamp: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadAction {
    pub action: String,
    pub title: String,
}

impl PayloadAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadOptions {
    pub icon: String,
    pub badge: String,
    pub deep_link_base: String,
    pub actions: Vec<PayloadAction>,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_BADGE.to_string(),
            deep_link_base: DEFAULT_DEEP_LINK_BASE.to_string(),
            actions: vec![
                PayloadAction::new("view", "View"),
                PayloadAction::new("dismiss", "Dismiss"),
            ],
        }
    }
}

impl PayloadOptions {
    pub fn with_actions(mut self, actions: Vec<PayloadAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_deep_link_base(mut self, base: impl Into<String>) -> Self {
        self.deep_link_base = base.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    options: PayloadOptions,
}

impl PayloadBuilder {
    pub fn new(options: PayloadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PayloadOptions {
        &self.options
    }

    /// Builds the payload for `notification`. Title and body are cut by
    /// character count, never on word boundaries.
    pub fn build(&self, notification: &Notification) -> Payload {
        let base = self.options.deep_link_base.trim_end_matches('/');

        Payload {
            title: truncate_chars(&notification.title, MAX_TITLE_CHARS),
            body: truncate_chars(&notification.body, MAX_BODY_CHARS),
            icon: self.options.icon.clone(),
            badge: self.options.badge.clone(),
            data: PayloadData {
                kind: "notification".to_string(),
                id: notification.id,
                category: notification.category,
                is_broadcast: notification.is_broadcast,
                timestamp: notification
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Micros, false),
                url: format!("{}/{}", base, notification.id),
            },
            actions: self.options.actions.clone(),
            require_interaction: true,
            tag: format!("notification-{}", notification.id),
        }
    }
}
