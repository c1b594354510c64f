//! Router assembly: the six session control-surface operations, wrapped
//! in the auth → rate-limit middleware stack. Registration order matters
//! here: axum runs the last-registered `.layer()` first, so the
//! pre-authentication address limiter is added last to make it outermost.

use crate::{auth, handlers, ratelimit_middleware, state::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let health = Router::new().route("/healthz", get(handlers::health));

    let protected = Router::new()
        .route("/sessions", post(handlers::create_session).get(handlers::list_sessions))
        .route("/sessions/:id", get(handlers::get_session))
        .route("/sessions/:id/stop", post(handlers::stop_session))
        .route("/sessions/:id/kill", post(handlers::kill_session))
        .route("/sessions/:id/attach", get(handlers::attach_session))
        .with_state(state.clone())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            ratelimit_middleware::principal_rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(axum::middleware::from_fn_with_state(
            state,
            ratelimit_middleware::remote_addr_rate_limit_middleware,
        ));

    health.merge(protected).layer(TraceLayer::new_for_http())
}
