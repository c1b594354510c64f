//! Shared application state, cloned per request: every field sits behind
//! an `Arc`, so `Clone` is cheap.

use crate::auth::AuthConfig;
use sessionctl_attach::AttachHub;
use sessionctl_orchestrator::Orchestrator;
use sessionctl_ratelimit::RateLimiter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub attach: Arc<AttachHub>,
    pub auth: AuthConfig,
    pub remote_addr_limiter: Arc<RateLimiter>,
    pub principal_limiter: Arc<RateLimiter>,
    pub unauthenticated_rate_per_sec: f64,
}
