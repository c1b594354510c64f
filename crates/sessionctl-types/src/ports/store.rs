//! The `SessionStore` port and the quota-increase-request intake.

use crate::errors::SessionCtlResult;
use crate::model::{QuotaIncreaseRequest, Session, SessionStatus, SessionUpdate};
use async_trait::async_trait;

/// Optional status filter for `SessionStore::list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    Any,
    Status(SessionStatus),
}

/// Persists the `Session` entity with atomic partial updates.
///
/// The store is assumed to provide snapshot reads and atomic single-row
/// updates; no multi-row transaction is required by the core.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session with `status = Pending`.
    async fn create(&self, session: &Session) -> SessionCtlResult<()>;

    /// Read a session by id. Ownership is not checked here, callers
    /// (the orchestrator) check ownership themselves.
    async fn get(&self, id: &str) -> SessionCtlResult<Option<Session>>;

    /// All sessions owned by `account_id`, newest first.
    async fn list(&self, account_id: &str, filter: SessionFilter) -> SessionCtlResult<Vec<Session>>;

    /// Apply a partial update as a single write. The common terminal
    /// transition sets `status`, `ended_at`, `exit_code` and the metric
    /// fields together in one call.
    async fn update(&self, id: &str, delta: &SessionUpdate) -> SessionCtlResult<()>;

    /// Sessions for `account_id` currently in `{Pending, Running}`.
    async fn count_active(&self, account_id: &str) -> SessionCtlResult<i64>;

    /// Sessions for `account_id` created since the most recent UTC
    /// midnight.
    async fn count_today(&self, account_id: &str) -> SessionCtlResult<i64>;
}

/// Out-of-band record of tenants asking for larger limits.
#[async_trait]
pub trait QuotaRequestIntake: Send + Sync {
    async fn record(&self, account_id: &str, requested_tier: &str, reason: &str) -> SessionCtlResult<()>;

    async fn list_for_account(&self, account_id: &str) -> SessionCtlResult<Vec<QuotaIncreaseRequest>>;
}
