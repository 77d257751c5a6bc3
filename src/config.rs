use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{
    clients::web_push::VapidKeys,
    fanout::FanoutOptions,
    models::payload::{DEFAULT_DEEP_LINK_BASE, PayloadOptions},
    utils::parse_actions,
};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_database_acquire_timeout_ms")]
    pub database_acquire_timeout_ms: u64,

    #[serde(default)]
    pub vapid_public_key: Option<String>,
    #[serde(default)]
    pub vapid_private_key: Option<String>,
    #[serde(default = "default_vapid_subject")]
    pub vapid_subject: String,

    #[serde(default)]
    pub fcm_project_id: Option<String>,
    #[serde(default = "default_fcm_base_url")]
    pub fcm_base_url: String,
    #[serde(default = "default_push_ttl_seconds")]
    pub push_ttl_seconds: u64,

    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    #[serde(default)]
    pub payload_actions: Option<String>,
    #[serde(default = "default_deep_link_base")]
    pub deep_link_base: String,
    #[serde(default)]
    pub public_base_url: Option<String>,

    #[serde(default = "default_log_format")]
    pub log_format: String,

    pub server_port: u16,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_database_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_vapid_subject() -> String {
    "mailto:admin@localhost".to_string()
}

fn default_fcm_base_url() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_push_ttl_seconds() -> u64 {
    3600
}

fn default_fanout_concurrency() -> usize {
    16
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_deep_link_base() -> String {
    DEFAULT_DEEP_LINK_BASE.to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;

        if config.fanout_concurrency == 0 {
            return Err(anyhow!("FANOUT_CONCURRENCY must be at least 1"));
        }

        if let Some(base) = config.public_base_url.as_deref()
            && !base.starts_with("https://")
        {
            return Err(anyhow!("PUBLIC_BASE_URL must be an https:// URL"));
        }

        Ok(config)
    }

    pub fn fanout_options(&self) -> FanoutOptions {
        FanoutOptions {
            concurrency: self.fanout_concurrency,
            send_timeout: self.send_timeout(),
        }
    }

    pub fn database_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.database_acquire_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// VAPID keys for the Web Push transport, if both halves are set.
    pub fn vapid_keys(&self) -> Result<Option<VapidKeys>, Error> {
        match (
            self.vapid_public_key.as_deref(),
            self.vapid_private_key.as_deref(),
        ) {
            (None, None) => Ok(None),
            (Some(public), Some(private)) => {
                VapidKeys::new(public, private, &self.vapid_subject).map(Some)
            }
            _ => Err(anyhow!(
                "Both VAPID_PUBLIC_KEY and VAPID_PRIVATE_KEY must be set"
            )),
        }
    }

    pub fn payload_options(&self) -> Result<PayloadOptions, Error> {
        let mut options = PayloadOptions::default().with_deep_link_base(&self.deep_link_base);

        if let Some(raw) = self.payload_actions.as_deref() {
            let actions = parse_actions(raw)?;
            if !actions.is_empty() {
                options = options.with_actions(actions);
            }
        }

        Ok(options)
    }
}
