//! Thin axum handlers over the six control-surface operations. Validation
//! beyond "does it deserialize" and response shaping are left to the
//! surrounding router; these handlers are illustrative wiring, not a
//! hardened HTTP surface.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use sessionctl_types::{RequestContext, Session, SessionCtlResult, SessionFilter, SessionRequest, SessionStatus};
use serde::Deserialize;
use std::collections::HashMap;

use crate::state::AppState;

pub async fn create_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<SessionRequest>,
) -> SessionCtlResult<impl IntoResponse> {
    let session = state.orchestrator.create(&ctx, request).await?;
    Ok(Json(session))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> SessionCtlResult<impl IntoResponse> {
    let session = state.orchestrator.get(&ctx, &id).await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
pub struct ListQuery {
    status: Option<String>,
}

fn parse_status_filter(query: &ListQuery) -> SessionFilter {
    match query.status.as_deref() {
        Some("pending") => SessionFilter::Status(SessionStatus::Pending),
        Some("running") => SessionFilter::Status(SessionStatus::Running),
        Some("stopping") => SessionFilter::Status(SessionStatus::Stopping),
        Some("stopped") => SessionFilter::Status(SessionStatus::Stopped),
        Some("killed") => SessionFilter::Status(SessionStatus::Killed),
        Some("failed") => SessionFilter::Status(SessionStatus::Failed),
        _ => SessionFilter::Any,
    }
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListQuery>,
) -> SessionCtlResult<impl IntoResponse> {
    let filter = parse_status_filter(&query);
    let sessions = state.orchestrator.list(&ctx, filter).await?;
    Ok(Json(sessions))
}

pub async fn stop_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> SessionCtlResult<impl IntoResponse> {
    let session = state.orchestrator.stop(&ctx, &id).await?;
    Ok(Json(session))
}

pub async fn kill_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> SessionCtlResult<impl IntoResponse> {
    let session = state.orchestrator.kill(&ctx, &id).await?;
    Ok(Json(session))
}

pub async fn attach_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ws: axum::extract::WebSocketUpgrade,
) -> SessionCtlResult<impl IntoResponse> {
    sessionctl_attach::handle_attach(state.attach.clone(), ctx, id, ws).await
}

/// Process liveness only; readiness semantics are left to the
/// surrounding host.
pub async fn health() -> impl IntoResponse {
    Json(HashMap::from([("status", "ok")]))
}
