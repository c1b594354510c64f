//! The `Backend` port: the sole seam between this workspace and whatever
//! runs a workload.
//!
//! A single trait covers both compute substrates a deployment might have
//! (a VM fleet, a container orchestrator); neither concrete adapter lives
//! in this crate. Tests exercise the orchestrator and attach hub against a
//! `mockall`-generated double.

use crate::context::RequestContext;
use crate::errors::SessionCtlResult;
use crate::model::{FileSeed, NetworkMode, PortRequest, ResourceRequest, SessionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

/// Everything the backend needs to materialise a workload.
#[derive(Debug, Clone)]
pub struct BackendCreateConfig {
    pub image: String,
    pub command: Option<Vec<String>>,
    pub env: HashMap<String, String>,
    pub work_dir: Option<String>,
    pub resources: ResourceRequest,
    pub network: NetworkMode,
    pub ports: Vec<PortRequest>,
    pub files: Vec<FileSeed>,
    pub setup: Vec<String>,
    pub auto_destroy: bool,
}

/// The host-visible network info returned when `network == Exposed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub host_ports: HashMap<u16, u16>,
}

/// A backend's view of a session: its own opaque id, the status it
/// observes, and an exit code once it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSession {
    pub backend_id: String,
    pub status: SessionStatus,
    pub exit_code: Option<i32>,
}

/// The duplex handle returned by `Backend::attach`.
///
/// `wait` resolves when the container exits, independent of whether stdin
/// or the output streams have been fully drained. The attach hub is
/// responsible for draining output before trusting the exit code.
pub struct BackendAttach {
    pub stdin: Pin<Box<dyn AsyncWrite + Send>>,
    pub stdout: Pin<Box<dyn AsyncRead + Send>>,
    pub stderr: Pin<Box<dyn AsyncRead + Send>>,
    pub wait: Pin<Box<dyn std::future::Future<Output = SessionCtlResult<i32>> + Send>>,
}

/// The sole coupling between the core and the compute substrate.
///
/// Implementations must be thread-safe; the orchestrator and attach hub
/// hold a single shared `Arc<dyn Backend>` for the process lifetime.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Materialise a workload. On success, returns the backend's session
    /// view plus host-visible network info if `network == Exposed`.
    async fn create_session(
        &self,
        ctx: &RequestContext,
        config: BackendCreateConfig,
    ) -> SessionCtlResult<(BackendSession, Option<NetworkInfo>)>;

    /// Read back the backend's current view of a session.
    async fn get_session(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<BackendSession>;

    /// Ask the backend to shut the workload down gracefully.
    async fn stop_session(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<()>;

    /// Force-remove the workload.
    async fn destroy_session(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<()>;

    /// Open stdin/stdout/stderr plus a join handle for the running workload.
    async fn attach(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<BackendAttach>;

    /// The backend's own name, for logging only. The orchestrator must
    /// never branch on this value.
    fn name(&self) -> &str;
}
