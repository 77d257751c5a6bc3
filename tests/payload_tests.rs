use anyhow::Result;
use chrono::{TimeZone, Utc};
use push_fanout::{
    models::{
        notification::{Category, Notification},
        payload::{PayloadAction, PayloadBuilder, PayloadOptions},
    },
    utils::{absolute_link, parse_actions, truncate_chars},
};

fn sample() -> Result<Notification> {
    let created_at = Utc
        .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid date"))?;

    Ok(
        Notification::broadcast(42, "Pool maintenance", "The pool is closed on Monday.")
            .with_category(Category::Alert)
            .with_created_at(created_at),
    )
}

/// Test: A 200 character title is cut to exactly 80 characters
#[test]
fn test_long_title_truncated_to_80() -> Result<()> {
    let mut notification = sample()?;
    notification.title = "t".repeat(200);
    notification.body = "b".repeat(300);

    let payload = PayloadBuilder::default().build(&notification);

    assert_eq!(payload.title.chars().count(), 80);
    assert_eq!(payload.body.chars().count(), 120);
    assert_eq!(payload.title, "t".repeat(80));

    Ok(())
}

/// Test: Truncation counts characters, not bytes, and ignores word boundaries
#[test]
fn test_truncation_counts_characters() -> Result<()> {
    let mut notification = sample()?;
    notification.title = format!("🔍 {}", "é".repeat(100));
    notification.body = "word ".repeat(40);

    let payload = PayloadBuilder::default().build(&notification);

    assert_eq!(payload.title.chars().count(), 80);
    assert!(payload.title.starts_with("🔍 é"));
    assert_eq!(payload.body.chars().count(), 120);
    assert!(payload.body.ends_with("word "));

    let short = truncate_chars("short", 80);
    assert_eq!(short, "short");

    Ok(())
}

/// Test: Payload carries the notification metadata and deep link
#[test]
fn test_payload_fields() -> Result<()> {
    let payload = PayloadBuilder::default().build(&sample()?);

    assert_eq!(payload.title, "Pool maintenance");
    assert_eq!(payload.icon, "/static/icons/icon-192x192.png");
    assert_eq!(payload.badge, "/static/icons/badge-72x72.png");
    assert_eq!(payload.tag, "notification-42");
    assert!(payload.require_interaction);

    assert_eq!(payload.data.kind, "notification");
    assert_eq!(payload.data.id, 42);
    assert_eq!(payload.data.category, Category::Alert);
    assert!(payload.data.is_broadcast);
    assert_eq!(payload.data.url, "/notifications/42");
    assert_eq!(payload.data.timestamp, "2024-05-01T12:30:00.000000+00:00");

    assert_eq!(
        payload.actions,
        vec![
            PayloadAction::new("view", "View"),
            PayloadAction::new("dismiss", "Dismiss"),
        ]
    );

    Ok(())
}

/// Test: Building twice yields byte-identical JSON
#[test]
fn test_payload_is_deterministic() -> Result<()> {
    let notification = sample()?;
    let builder = PayloadBuilder::default();

    let first = serde_json::to_vec(&builder.build(&notification))?;
    let second = serde_json::to_vec(&builder.build(&notification))?;

    assert_eq!(first, second);

    Ok(())
}

/// Test: Payload JSON uses the service worker field names
#[test]
fn test_payload_wire_shape() -> Result<()> {
    let value = serde_json::to_value(PayloadBuilder::default().build(&sample()?))?;

    assert_eq!(value["requireInteraction"], true);
    assert_eq!(value["tag"], "notification-42");
    assert_eq!(value["data"]["type"], "notification");
    assert_eq!(value["data"]["category"], "alert");
    assert_eq!(value["data"]["isBroadcast"], true);
    assert_eq!(value["actions"][0]["action"], "view");
    assert_eq!(value["actions"][1]["title"], "Dismiss");

    Ok(())
}

/// Test: Configured actions and deep link base replace the defaults
#[test]
fn test_custom_options() -> Result<()> {
    let options = PayloadOptions::default()
        .with_actions(parse_actions("open=Ver Comunicado; close=Cerrar")?)
        .with_deep_link_base("/comunicados/");

    let payload = PayloadBuilder::new(options).build(&sample()?);

    assert_eq!(
        payload.actions,
        vec![
            PayloadAction::new("open", "Ver Comunicado"),
            PayloadAction::new("close", "Cerrar"),
        ]
    );
    assert_eq!(payload.data.url, "/comunicados/42");

    Ok(())
}

/// Test: Malformed action lists are rejected
#[test]
fn test_parse_actions_rejects_malformed_entries() {
    assert!(parse_actions("view").is_err());
    assert!(parse_actions("view=").is_err());
    assert!(parse_actions("=View").is_err());
    assert!(parse_actions("").is_ok_and(|actions| actions.is_empty()));
}

/// Test: Categories parse from stored names and reject unknown ones
#[test]
fn test_category_from_str() -> Result<()> {
    assert_eq!("alert".parse::<Category>()?, Category::Alert);
    assert_eq!("general".parse::<Category>()?, Category::General);
    assert!("urgent".parse::<Category>().is_err());
    assert!("".parse::<Category>().is_err());

    Ok(())
}

/// Test: Deep links become absolute only against an https base
#[test]
fn test_absolute_link() {
    let base = Some("https://condo.example.com/");

    assert_eq!(
        absolute_link("/notifications/3", base).as_deref(),
        Some("https://condo.example.com/notifications/3")
    );
    assert_eq!(
        absolute_link("https://other.example.com/x", None).as_deref(),
        Some("https://other.example.com/x")
    );
    assert_eq!(absolute_link("/notifications/3", None), None);
    assert_eq!(absolute_link("/notifications/3", Some("http://condo.example.com")), None);
}
