//! The two rate-limit checkpoints: a fixed per-remote-address rate
//! applied before authentication, and a per-principal rate (from the
//! principal's own budget) applied after. Each is wired as a
//! `from_fn_with_state` layer around the router.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sessionctl_types::{Principal, SessionCtlError};
use std::net::SocketAddr;
use tracing::warn;

use crate::state::AppState;

pub async fn remote_addr_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let key = remote_addr.ip().to_string();
    if !state.remote_addr_limiter.allow(&key, state.unauthenticated_rate_per_sec) {
        warn!(remote_addr = %key, "pre-authentication rate limit refused the request");
        return SessionCtlError::quota_exceeded("too many requests from this address").into_response();
    }
    next.run(request).await
}

pub async fn principal_rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(principal) = request.extensions().get::<Principal>().cloned() else {
        // auth_middleware runs first in the chain; absence here means
        // misconfigured routing, not an unauthenticated caller.
        return SessionCtlError::internal("rate limit middleware ran without a resolved principal").into_response();
    };

    if !state.principal_limiter.allow(&principal.id, principal.rate_limit_per_sec) {
        warn!(principal = %principal.id, "per-principal rate limit refused the request");
        return SessionCtlError::quota_exceeded("rate limit exceeded for this principal").into_response();
    }

    next.run(request).await
}
