//! Domain model: sessions, their requests, and the state they move through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An API key identified by an opaque id. Never mutated during a request
/// except for an out-of-band `last_used_at` timestamp maintained elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    pub id: String,
    /// The account this principal's usage counts against. Equal to `id`
    /// for a primary key; a secondary key points at its primary's account.
    pub account_id: String,
    pub tier: String,
    /// Per-second rate-limit budget, in tokens per second.
    pub rate_limit_per_sec: f64,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.active || self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Quota limits for a tier. A negative value means unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierLimits {
    pub sessions_per_day: i64,
    pub concurrent_sessions: i64,
    pub max_duration_sec: i64,
    pub memory_mb: i64,
}

impl TierLimits {
    pub fn is_unlimited(n: i64) -> bool {
        n < 0
    }
}

/// Network exposure mode for a session's container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    None,
    Outgoing,
    Exposed,
}

/// Transport protocol for a port mapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
    Udp,
}

/// A port the caller wants exposed from the container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortRequest {
    pub container_port: u16,
    pub protocol: PortProtocol,
}

/// A resolved port mapping, persisted once the backend exposes it. All
/// ports, requested or discovered, normalise to this one shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: Option<u16>,
    pub protocol: PortProtocol,
    pub url: Option<String>,
}

/// CPU/memory/timeout resource ask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequest {
    pub cpu_millicores: u32,
    pub memory_mb: u32,
    pub timeout_ms: u64,
}

/// A file seed to place in the workload before it starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSeed {
    pub path: String,
    pub content: Vec<u8>,
}

/// The immutable-after-creation request payload for a new session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRequest {
    pub base_image: String,
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub setup: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileSeed>,
    pub resources: ResourceRequest,
    pub network: NetworkMode,
    #[serde(default)]
    pub ports: Vec<PortRequest>,
}

/// Where a session sits in its state machine. Terminal states
/// (`Stopped`, `Killed`, `Failed`) are absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    Stopping,
    Stopped,
    Killed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Killed | Self::Failed)
    }
}

/// The central entity: one on-demand code-execution session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub backend_id: Option<String>,
    pub owner_principal_id: String,
    pub owner_account_id: String,
    pub request: SessionRequest,
    /// The image reference actually run, after resolution.
    pub resolved_image: Option<String>,
    /// Content hash of the build spec, set only if a custom image was built.
    pub setup_hash: Option<String>,
    pub status: SessionStatus,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub cpu_millis_used: Option<i64>,
    pub memory_peak_mb: Option<i32>,
    pub cost_estimate_cents: Option<i64>,
    pub ports: Vec<PortMapping>,
}

impl Session {
    /// `sess_` followed by 12 lowercase hex characters.
    pub fn id_matches_format(id: &str) -> bool {
        let Some(rest) = id.strip_prefix("sess_") else {
            return false;
        };
        rest.len() == 12 && rest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }
}

/// A partial update to an existing session. `None` fields are left
/// untouched by `SessionStore::update`; every variant of a terminal
/// transition sets all four metric-bearing fields in one call so a single
/// write covers the whole transition at the type level too.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionUpdate {
    pub backend_id: Option<String>,
    pub resolved_image: Option<String>,
    pub setup_hash: Option<String>,
    pub status: Option<SessionStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<i64>,
    pub cpu_millis_used: Option<i64>,
    pub memory_peak_mb: Option<i32>,
    pub cost_estimate_cents: Option<i64>,
    pub ports: Option<Vec<PortMapping>>,
}

/// Cache entry for a content-addressed build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageCacheEntry {
    pub hash: String,
    pub base_image: String,
    pub registry_tag: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// An out-of-band record of a tenant asking for larger limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaIncreaseRequest {
    pub id: i64,
    pub account_id: String,
    pub requested_tier: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
