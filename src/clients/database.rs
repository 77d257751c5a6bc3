use std::time::{Duration, Instant};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use tracing::{debug, error, info};

use crate::{
    fanout::{EndpointSource, NotificationSource},
    models::{
        endpoint::{EndpointRecord, OwnerRef},
        notification::{Category, Notification},
    },
};

const ENDPOINT_COLUMNS: &str = "id, owner_ref, endpoint, p256dh, auth, active, created_at";

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self { pool })
    }

    /// Builds the pool without opening a connection. Connections are made,
    /// and remade after a drop, on first use.
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(|e| anyhow!("Invalid database URL: {}", e))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| anyhow!("Migration failed: {}", e))?;

        debug!("Database schema is up to date");
        Ok(())
    }

    pub async fn insert_endpoint(&self, endpoint: &EndpointRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (
                id, owner_ref, endpoint, p256dh, auth, active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(endpoint.id)
        .bind(endpoint.owner_ref.as_str())
        .bind(&endpoint.endpoint_uri)
        .bind(&endpoint.p256dh)
        .bind(&endpoint.auth_secret)
        .bind(endpoint.active)
        .bind(endpoint.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to insert endpoint {}: {}", endpoint.id, e))?;

        Ok(())
    }

    pub async fn insert_notification(&self, notification: &Notification) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, title, body, category, owner_ref, is_broadcast, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.category.as_str())
        .bind(notification.owner_ref.as_ref().map(OwnerRef::as_str))
        .bind(notification.is_broadcast)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to insert notification {}: {}", notification.id, e))?;

        Ok(())
    }

    /// Round-trips `SELECT 1` through the pool the engine reads from and
    /// returns the latency in milliseconds.
    pub async fn health_check(&self) -> Result<u64, Error> {
        let start = Instant::now();

        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(start.elapsed().as_millis() as u64)
    }

    async fn set_active(&self, endpoint_id: i64, active: bool) -> Result<(), Error> {
        let updated = sqlx::query("UPDATE push_subscriptions SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(endpoint_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(endpoint_id, error = %e, "Failed to update endpoint state");
                anyhow!("Failed to update endpoint {}: {}", endpoint_id, e)
            })?
            .rows_affected();

        if updated == 0 {
            return Err(anyhow!("Endpoint {} not found", endpoint_id));
        }

        debug!(endpoint_id, active, "Endpoint state updated");
        Ok(())
    }
}

fn endpoint_from_row(row: &PgRow) -> Result<EndpointRecord, Error> {
    Ok(EndpointRecord {
        id: row.try_get("id")?,
        owner_ref: OwnerRef::new(row.try_get::<String, _>("owner_ref")?),
        endpoint_uri: row.try_get("endpoint")?,
        p256dh: row.try_get("p256dh")?,
        auth_secret: row.try_get("auth")?,
        active: row.try_get("active")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> Result<Notification, Error> {
    let id: i64 = row.try_get("id")?;
    let category = row
        .try_get::<String, _>("category")?
        .parse::<Category>()
        .map_err(|e| anyhow!("Notification {} is unreadable: {}", id, e))?;

    Ok(Notification {
        id,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        category,
        owner_ref: row
            .try_get::<Option<String>, _>("owner_ref")?
            .map(OwnerRef::new),
        is_broadcast: row.try_get("is_broadcast")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl EndpointSource for DatabaseClient {
    async fn active_endpoints(
        &self,
        owner: Option<&OwnerRef>,
    ) -> Result<Vec<EndpointRecord>, Error> {
        let rows = match owner {
            Some(owner) => {
                let query = format!(
                    "SELECT {} FROM push_subscriptions WHERE active AND owner_ref = $1 ORDER BY id",
                    ENDPOINT_COLUMNS
                );
                sqlx::query(&query)
                    .bind(owner.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {} FROM push_subscriptions WHERE active ORDER BY id",
                    ENDPOINT_COLUMNS
                );
                sqlx::query(&query).fetch_all(&self.pool).await
            }
        }
        .map_err(|e| anyhow!("Failed to load endpoints: {}", e))?;

        rows.iter().map(endpoint_from_row).collect()
    }

    async fn deactivate(&self, endpoint_id: i64) -> Result<(), Error> {
        self.set_active(endpoint_id, false).await
    }

    async fn reactivate(&self, endpoint_id: i64) -> Result<(), Error> {
        self.set_active(endpoint_id, true).await
    }
}

#[async_trait]
impl NotificationSource for DatabaseClient {
    async fn notification(&self, id: i64) -> Result<Option<Notification>, Error> {
        let row = sqlx::query(
            r#"
            SELECT id, title, body, category, owner_ref, is_broadcast, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to load notification {}: {}", id, e))?;

        row.as_ref().map(notification_from_row).transpose()
    }
}
