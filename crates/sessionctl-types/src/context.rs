//! Per-operation request context, threaded through every core call.
//!
//! The authenticated principal and its tier ride on this value, passed as
//! the first argument to every backend, store, and orchestrator call. It is
//! deliberately not thread-local: tests construct it directly, and a single
//! task may hold several contexts (e.g. the attach hub holds one per
//! connection).

use std::net::IpAddr;

/// The authenticated caller plus the bits of it every core call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// The principal's own id (always set; identical to `account_id` for a
    /// primary key, distinct for a secondary key pointing at a primary).
    pub principal_id: String,
    /// The account this principal's usage is billed/quota-tracked against.
    pub account_id: String,
    /// The principal's tier name, used to look up `TierLimits`.
    pub tier: String,
    /// The caller's remote address, used for unauthenticated rate limiting
    /// and audit logging. `None` for contexts synthesized outside an HTTP
    /// request (e.g. tests, background reconciliation).
    pub remote_addr: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(principal_id: impl Into<String>, account_id: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            account_id: account_id.into(),
            tier: tier.into(),
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}
