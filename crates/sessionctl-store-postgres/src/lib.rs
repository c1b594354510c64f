//! Concrete `SessionStore` and `QuotaRequestIntake` on `sqlx::PgPool`.
//!
//! Runtime `sqlx::query`/`query_as` (no compile-time `query!` macro, since
//! no live database is available to check against), `tracing::instrument`
//! on every method, and one error-mapping idiom throughout. The schema is
//! a hybrid rather than a fully generic JSONB blob: `count_active` and
//! `count_today` need efficient server-side counts, so the frequently
//! filtered columns (`status`, `owner_account_id`, `created_at`) are real
//! typed columns; the request payload's nested shape (env, setup, files,
//! resources, ports) is still stored as JSONB, since nothing queries into
//! it.

mod row;
mod schema;

pub use schema::SCHEMA_SQL;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use row::SessionRow;
use sessionctl_types::{
    QuotaIncreaseRequest, Session, SessionCtlError, SessionCtlResult, SessionFilter, SessionStatus, SessionStore,
    SessionUpdate, QuotaRequestIntake,
};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_err(context: &str, err: sqlx::Error) -> SessionCtlError {
    error!(context, error = %err, "postgres session store error");
    SessionCtlError::internal(format!("{context}: {err}"))
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip(self, session), fields(id = %session.id))]
    async fn create(&self, session: &Session) -> SessionCtlResult<()> {
        debug!("inserting session");
        let row = SessionRow::from_domain(session)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, backend_id, owner_principal_id, owner_account_id,
                base_image, command, env, setup, files, resources, network, requested_ports, ports,
                resolved_image, setup_hash, status, exit_code,
                created_at, started_at, ended_at,
                duration_ms, cpu_millis_used, memory_peak_mb, cost_estimate_cents
            ) VALUES (
                $1, $2, $3, $4,
                $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17,
                $18, $19, $20,
                $21, $22, $23, $24
            )
            "#,
        )
        .bind(&row.id)
        .bind(&row.backend_id)
        .bind(&row.owner_principal_id)
        .bind(&row.owner_account_id)
        .bind(&row.base_image)
        .bind(&row.command)
        .bind(&row.env)
        .bind(&row.setup)
        .bind(&row.files)
        .bind(&row.resources)
        .bind(&row.network)
        .bind(&row.requested_ports)
        .bind(&row.ports)
        .bind(&row.resolved_image)
        .bind(&row.setup_hash)
        .bind(&row.status)
        .bind(row.exit_code)
        .bind(row.created_at)
        .bind(row.started_at)
        .bind(row.ended_at)
        .bind(row.duration_ms)
        .bind(row.cpu_millis_used)
        .bind(row.memory_peak_mb)
        .bind(row.cost_estimate_cents)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("create session", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get(&self, id: &str) -> SessionCtlResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("get session", e))?;

        row.map(|r| r.into_domain()).transpose()
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn list(&self, account_id: &str, filter: SessionFilter) -> SessionCtlResult<Vec<Session>> {
        let rows: Vec<SessionRow> = match filter {
            SessionFilter::Any => {
                sqlx::query_as("SELECT * FROM sessions WHERE owner_account_id = $1 ORDER BY created_at DESC")
                    .bind(account_id)
                    .fetch_all(&self.pool)
                    .await
            }
            SessionFilter::Status(status) => sqlx::query_as(
                "SELECT * FROM sessions WHERE owner_account_id = $1 AND status = $2 ORDER BY created_at DESC",
            )
            .bind(account_id)
            .bind(row::status_to_db(status))
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| storage_err("list sessions", e))?;

        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    #[instrument(skip(self, delta), fields(id = %id))]
    async fn update(&self, id: &str, delta: &SessionUpdate) -> SessionCtlResult<()> {
        debug!(?delta, "applying partial session update");

        sqlx::query(
            r#"
            UPDATE sessions SET
                backend_id = COALESCE($2, backend_id),
                resolved_image = COALESCE($3, resolved_image),
                setup_hash = COALESCE($4, setup_hash),
                status = COALESCE($5, status),
                started_at = COALESCE($6, started_at),
                ended_at = COALESCE($7, ended_at),
                exit_code = COALESCE($8, exit_code),
                duration_ms = COALESCE($9, duration_ms),
                cpu_millis_used = COALESCE($10, cpu_millis_used),
                memory_peak_mb = COALESCE($11, memory_peak_mb),
                cost_estimate_cents = COALESCE($12, cost_estimate_cents),
                ports = COALESCE($13, ports)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&delta.backend_id)
        .bind(&delta.resolved_image)
        .bind(&delta.setup_hash)
        .bind(delta.status.map(row::status_to_db))
        .bind(delta.started_at)
        .bind(delta.ended_at)
        .bind(delta.exit_code)
        .bind(delta.duration_ms)
        .bind(delta.cpu_millis_used)
        .bind(delta.memory_peak_mb)
        .bind(delta.cost_estimate_cents)
        .bind(delta.ports.as_ref().map(|p| serde_json::to_value(p)).transpose().map_err(|e| {
            SessionCtlError::internal(format!("serialize ports: {e}"))
        })?)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("update session", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn count_active(&self, account_id: &str) -> SessionCtlResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sessions WHERE owner_account_id = $1 AND status IN ('pending', 'running')",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("count active sessions", e))?;

        Ok(count)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn count_today(&self, account_id: &str) -> SessionCtlResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sessions WHERE owner_account_id = $1 AND created_at >= date_trunc('day', now() AT TIME ZONE 'utc')",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("count sessions today", e))?;

        Ok(count)
    }
}

/// Postgres-backed image cache.
pub struct PgImageCache {
    pool: PgPool,
}

impl PgImageCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl sessionctl_images::ImageCache for PgImageCache {
    #[instrument(skip(self), fields(hash = %hash))]
    async fn get(&self, hash: &str) -> SessionCtlResult<Option<sessionctl_types::ImageCacheEntry>> {
        let row: Option<(String, String, String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT hash, base_image, registry_tag, created_at, last_used_at FROM image_cache WHERE hash = $1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("get image cache entry", e))?;

        Ok(row.map(|(hash, base_image, registry_tag, created_at, last_used_at)| {
            sessionctl_types::ImageCacheEntry { hash, base_image, registry_tag, created_at, last_used_at }
        }))
    }

    #[instrument(skip(self), fields(hash = %hash))]
    async fn touch(&self, hash: &str) -> SessionCtlResult<()> {
        sqlx::query("UPDATE image_cache SET last_used_at = $2 WHERE hash = $1")
            .bind(hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("touch image cache entry", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(hash = %hash))]
    async fn put(&self, hash: &str, base_image: &str, registry_tag: &str) -> SessionCtlResult<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO image_cache (hash, base_image, registry_tag, created_at, last_used_at) VALUES ($1, $2, $3, $4, $4) ON CONFLICT (hash) DO NOTHING",
        )
        .bind(hash)
        .bind(base_image)
        .bind(registry_tag)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("write image cache entry", e))?;
        Ok(())
    }
}

/// Out-of-band record of tenants asking for larger limits.
pub struct PgQuotaRequestIntake {
    pool: PgPool,
}

impl PgQuotaRequestIntake {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaRequestIntake for PgQuotaRequestIntake {
    #[instrument(skip(self, reason), fields(account_id = %account_id, requested_tier = %requested_tier))]
    async fn record(&self, account_id: &str, requested_tier: &str, reason: &str) -> SessionCtlResult<()> {
        sqlx::query(
            "INSERT INTO quota_increase_requests (account_id, requested_tier, reason, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(account_id)
        .bind(requested_tier)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("record quota increase request", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn list_for_account(&self, account_id: &str) -> SessionCtlResult<Vec<QuotaIncreaseRequest>> {
        let rows: Vec<(i64, String, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, account_id, requested_tier, reason, created_at FROM quota_increase_requests WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("list quota increase requests", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, account_id, requested_tier, reason, created_at)| QuotaIncreaseRequest {
                id,
                account_id,
                requested_tier,
                reason,
                created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_db_representation() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::Running,
            SessionStatus::Stopping,
            SessionStatus::Stopped,
            SessionStatus::Killed,
            SessionStatus::Failed,
        ] {
            let db = row::status_to_db(status);
            assert_eq!(row::status_from_db(db).unwrap(), status);
        }
    }

    #[test]
    fn unknown_db_status_is_rejected() {
        assert!(row::status_from_db("quux").is_err());
    }
}
