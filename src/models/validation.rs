use anyhow::{Result, anyhow};

use crate::models::notification::Notification;

/// Call-level preconditions checked before any delivery attempt.
pub fn validate_notification(notification: &Notification) -> Result<()> {
    if notification.title.trim().is_empty() {
        return Err(anyhow!("Notification {} has an empty title", notification.id));
    }

    if notification.body.trim().is_empty() {
        return Err(anyhow!("Notification {} has an empty body", notification.id));
    }

    if !notification.is_broadcast && notification.owner_ref.is_none() {
        return Err(anyhow!(
            "Targeted notification {} has no recipient",
            notification.id
        ));
    }

    Ok(())
}

pub fn validate_fcm_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(anyhow!("Registration token cannot be empty"));
    }

    if token.len() < 20 {
        return Err(anyhow!("Registration token too short (minimum 20 characters)"));
    }

    if token.len() > 4096 {
        return Err(anyhow!("Registration token too long (maximum 4096 characters)"));
    }

    let valid_chars = token
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'));

    if !valid_chars {
        return Err(anyhow!("Registration token contains invalid characters"));
    }

    Ok(())
}
