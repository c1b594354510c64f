//! SQL ↔ domain anti-corruption layer for `sessions` rows.

use chrono::{DateTime, Utc};
use sessionctl_types::{
    FileSeed, NetworkMode, PortMapping, PortRequest, ResourceRequest, Session, SessionCtlError, SessionCtlResult,
    SessionRequest, SessionStatus,
};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;

#[derive(Debug, FromRow)]
pub(crate) struct SessionRow {
    pub id: String,
    pub backend_id: Option<String>,
    pub owner_principal_id: String,
    pub owner_account_id: String,
    pub base_image: String,
    pub command: Json<Option<Vec<String>>>,
    pub env: Json<HashMap<String, String>>,
    pub setup: Json<Vec<String>>,
    pub files: Json<Vec<FileSeed>>,
    pub resources: Json<ResourceRequest>,
    pub network: String,
    pub requested_ports: Json<Vec<PortRequest>>,
    pub ports: Json<Vec<PortMapping>>,
    pub resolved_image: Option<String>,
    pub setup_hash: Option<String>,
    pub status: String,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub cpu_millis_used: Option<i64>,
    pub memory_peak_mb: Option<i32>,
    pub cost_estimate_cents: Option<i64>,
}

pub(crate) fn status_to_db(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "pending",
        SessionStatus::Running => "running",
        SessionStatus::Stopping => "stopping",
        SessionStatus::Stopped => "stopped",
        SessionStatus::Killed => "killed",
        SessionStatus::Failed => "failed",
    }
}

pub(crate) fn status_from_db(value: &str) -> SessionCtlResult<SessionStatus> {
    Ok(match value {
        "pending" => SessionStatus::Pending,
        "running" => SessionStatus::Running,
        "stopping" => SessionStatus::Stopping,
        "stopped" => SessionStatus::Stopped,
        "killed" => SessionStatus::Killed,
        "failed" => SessionStatus::Failed,
        other => return Err(SessionCtlError::internal(format!("unknown session status in store: {other}"))),
    })
}

fn network_to_db(mode: NetworkMode) -> &'static str {
    match mode {
        NetworkMode::None => "none",
        NetworkMode::Outgoing => "outgoing",
        NetworkMode::Exposed => "exposed",
    }
}

fn network_from_db(value: &str) -> SessionCtlResult<NetworkMode> {
    Ok(match value {
        "none" => NetworkMode::None,
        "outgoing" => NetworkMode::Outgoing,
        "exposed" => NetworkMode::Exposed,
        other => return Err(SessionCtlError::internal(format!("unknown network mode in store: {other}"))),
    })
}

impl SessionRow {
    pub(crate) fn from_domain(session: &Session) -> SessionCtlResult<Self> {
        Ok(Self {
            id: session.id.clone(),
            backend_id: session.backend_id.clone(),
            owner_principal_id: session.owner_principal_id.clone(),
            owner_account_id: session.owner_account_id.clone(),
            base_image: session.request.base_image.clone(),
            command: Json(session.request.command.clone()),
            env: Json(session.request.env.clone()),
            setup: Json(session.request.setup.clone()),
            files: Json(session.request.files.clone()),
            resources: Json(session.request.resources),
            network: network_to_db(session.request.network).to_string(),
            requested_ports: Json(session.request.ports.clone()),
            ports: Json(session.ports.clone()),
            resolved_image: session.resolved_image.clone(),
            setup_hash: session.setup_hash.clone(),
            status: status_to_db(session.status).to_string(),
            exit_code: session.exit_code,
            created_at: session.created_at,
            started_at: session.started_at,
            ended_at: session.ended_at,
            duration_ms: session.duration_ms,
            cpu_millis_used: session.cpu_millis_used,
            memory_peak_mb: session.memory_peak_mb,
            cost_estimate_cents: session.cost_estimate_cents,
        })
    }

    pub(crate) fn into_domain(self) -> SessionCtlResult<Session> {
        Ok(Session {
            id: self.id,
            backend_id: self.backend_id,
            owner_principal_id: self.owner_principal_id,
            owner_account_id: self.owner_account_id,
            request: SessionRequest {
                base_image: self.base_image,
                command: self.command.0,
                env: self.env.0,
                setup: self.setup.0,
                files: self.files.0,
                resources: self.resources.0,
                network: network_from_db(&self.network)?,
                ports: self.requested_ports.0,
            },
            resolved_image: self.resolved_image,
            setup_hash: self.setup_hash,
            status: status_from_db(&self.status)?,
            exit_code: self.exit_code,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_ms: self.duration_ms,
            cpu_millis_used: self.cpu_millis_used,
            memory_peak_mb: self.memory_peak_mb,
            cost_estimate_cents: self.cost_estimate_cents,
            ports: self.ports.0,
        })
    }
}
