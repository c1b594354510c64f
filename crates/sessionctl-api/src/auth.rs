//! Upstream authentication filter: populates the request context with a
//! principal id and tier before any core crate sees the request.
//!
//! An `X-API-Key` header (or `Authorization: Bearer`) is resolved against
//! a keyed set of principals, and a `RequestContext` is attached to the
//! request for handlers to extract. The core crates never see this
//! header or the lookup, they only ever receive the resulting
//! `RequestContext`.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sessionctl_types::{Principal, RequestContext};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::state::AppState;

/// The keyed set of principals this edge will authenticate. A real
/// deployment would back this with an account service; this in-memory map
/// is illustrative wiring kept out of the core crates.
#[derive(Clone)]
pub struct AuthConfig {
    principals_by_key: Arc<RwLock<HashMap<String, Principal>>>,
}

impl AuthConfig {
    pub fn new(principals_by_key: HashMap<String, Principal>) -> Self {
        Self { principals_by_key: Arc::new(RwLock::new(principals_by_key)) }
    }

    pub async fn resolve(&self, api_key: &str) -> Option<Principal> {
        self.principals_by_key.read().await.get(api_key).cloned()
    }
}

fn extract_api_key(request: &Request) -> Option<String> {
    if let Some(key) = request.headers().get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return Some(key.to_string());
    }

    if let Some(auth) = request.headers().get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    None
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({
            "error": { "type": "unauthorized", "message": message, "status": 401 }
        })),
    )
        .into_response()
}

/// Resolves the caller's `RequestContext` and attaches it as a request
/// extension. Runs after the pre-auth remote-address rate limit and before
/// the per-principal one.
pub async fn auth_middleware(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();

    let Some(api_key) = extract_api_key(&request) else {
        warn!(path = %path, "missing API key");
        return unauthorized("missing API key");
    };

    let Some(principal) = state.auth.resolve(&api_key).await else {
        warn!(path = %path, "unrecognised API key");
        return unauthorized("invalid API key");
    };

    if principal.is_expired(Utc::now()) {
        warn!(path = %path, principal = %principal.id, "expired or inactive principal");
        return unauthorized("principal expired or inactive");
    }

    debug!(path = %path, principal = %principal.id, tier = %principal.tier, "authenticated");

    let ctx =
        RequestContext::new(principal.id.clone(), principal.account_id.clone(), principal.tier.clone())
            .with_remote_addr(remote_addr.ip());

    request.extensions_mut().insert(ctx);
    request.extensions_mut().insert(principal);

    next.run(request).await
}
