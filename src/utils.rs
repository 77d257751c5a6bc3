use anyhow::{Error, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::models::payload::PayloadAction;

/// First `max_chars` characters of `input`, counted as chars rather than bytes.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

/// Resolves a deep link against `public_base_url`. Returns `None` unless the
/// result is an absolute https URL.
pub fn absolute_link(link: &str, public_base_url: Option<&str>) -> Option<String> {
    if link.starts_with("https://") {
        return Some(link.to_string());
    }

    let base = public_base_url?.trim_end_matches('/');
    if !base.starts_with("https://") {
        return None;
    }

    Some(format!("{}/{}", base, link.trim_start_matches('/')))
}

/// Parses `code=Label;code=Label` into an ordered action list.
pub fn parse_actions(raw: &str) -> Result<Vec<PayloadAction>, Error> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (code, label) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("Action '{}' is not in code=Label form", entry))?;

            let code = code.trim();
            let label = label.trim();
            if code.is_empty() || label.is_empty() {
                return Err(anyhow!("Action '{}' has an empty code or label", entry));
            }

            Ok(PayloadAction::new(code, label))
        })
        .collect()
}

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(false);

    let result = match log_format {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {}", e);
    }
}
