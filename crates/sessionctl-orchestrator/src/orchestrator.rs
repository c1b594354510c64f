//! Session orchestrator: drives sessions through their state machine.

use crate::admission::{self, AdmissionDecision};
use crate::id::generate_session_id;
use chrono::Utc;
use sessionctl_images::{BuildHook, ImageCache};
use sessionctl_types::{
    Backend, BackendCreateConfig, PortMapping, RequestContext, Session, SessionCtlError, SessionCtlResult,
    SessionFilter, SessionRequest, SessionStatus, SessionStore, SessionUpdate,
};
use std::sync::Arc;

/// Drives a session through its state machine and reconciles it against
/// the compute backend. Holds a single shared `Backend` and `SessionStore`
/// for the process lifetime.
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn Backend>,
    image_cache: Arc<dyn ImageCache>,
    build_hook: Option<Arc<dyn BuildHook>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn Backend>,
        image_cache: Arc<dyn ImageCache>,
        build_hook: Option<Arc<dyn BuildHook>>,
    ) -> Self {
        Self { store, backend, image_cache, build_hook }
    }

    /// Every operation reads the session and rejects with `NotFound` (not
    /// `Unauthorized`/`Forbidden`) if the caller's account doesn't own it,
    /// so a caller can never distinguish "absent" from "not yours".
    async fn load_owned(&self, ctx: &RequestContext, id: &str) -> SessionCtlResult<Session> {
        let session = self.store.get(id).await?.ok_or_else(|| SessionCtlError::not_found(id.to_string()))?;
        if session.owner_account_id != ctx.account_id {
            return Err(SessionCtlError::not_found(id.to_string()));
        }
        Ok(session)
    }

    /// Create flow: admission, then `Backend.CreateSession`, then persist
    /// with `status = Pending`.
    pub async fn create(&self, ctx: &RequestContext, request: SessionRequest) -> SessionCtlResult<Session> {
        let AdmissionDecision { resolved_image, setup_hash } = admission::admit(
            ctx,
            &request,
            self.store.as_ref(),
            self.image_cache.as_ref(),
            self.build_hook.as_deref(),
        )
        .await?;

        let id = generate_session_id();

        let config = BackendCreateConfig {
            image: resolved_image.clone(),
            command: request.command.clone(),
            env: request.env.clone(),
            work_dir: None,
            resources: request.resources,
            network: request.network,
            ports: request.ports.clone(),
            files: request.files.clone(),
            setup: request.setup.clone(),
            auto_destroy: false,
        };

        let (backend_session, network_info) = self
            .backend
            .create_session(ctx, config)
            .await
            .map_err(|err| SessionCtlError::internal(format!("backend create_session failed: {err}")))?;

        let ports = network_info
            .map(|info| {
                info.host_ports
                    .into_iter()
                    .map(|(container_port, host_port)| {
                        let protocol = request
                            .ports
                            .iter()
                            .find(|p| p.container_port == container_port)
                            .map(|p| p.protocol)
                            .unwrap_or(sessionctl_types::PortProtocol::Tcp);
                        PortMapping { container_port, host_port: Some(host_port), protocol, url: None }
                    })
                    .collect::<Vec<PortMapping>>()
            })
            .unwrap_or_default();

        let session = Session {
            id,
            backend_id: Some(backend_session.backend_id),
            owner_principal_id: ctx.principal_id.clone(),
            owner_account_id: ctx.account_id.clone(),
            request,
            resolved_image: Some(resolved_image),
            setup_hash,
            status: SessionStatus::Pending,
            exit_code: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            duration_ms: None,
            cpu_millis_used: None,
            memory_peak_mb: None,
            cost_estimate_cents: None,
            ports,
        };

        // Persistence failure here leaks the backend session: this
        // orchestrator does not run a compensating destroy on that path.
        self.store.create(&session).await?;

        Ok(session)
    }

    /// Get flow with reconciliation against the backend's observed status.
    pub async fn get(&self, ctx: &RequestContext, id: &str) -> SessionCtlResult<Session> {
        let session = self.load_owned(ctx, id).await?;

        if !matches!(session.status, SessionStatus::Pending | SessionStatus::Running) {
            return Ok(session);
        }
        let Some(backend_id) = session.backend_id.clone() else {
            return Ok(session);
        };

        match self.backend.get_session(ctx, &backend_id).await {
            Ok(observed) if observed.status != session.status => self.reconcile(session, observed).await,
            Ok(_) => Ok(session),
            Err(err) => {
                // The stored state is authoritative when the backend can't be reached.
                tracing::warn!(id = %id, error = %err, "backend reconciliation query failed");
                Ok(session)
            }
        }
    }

    async fn reconcile(&self, session: Session, observed: sessionctl_types::BackendSession) -> SessionCtlResult<Session> {
        let mut delta = SessionUpdate { status: Some(observed.status), ..Default::default() };
        let mut updated = session.clone();
        updated.status = observed.status;

        if observed.status.is_terminal() {
            let now = Utc::now();
            let duration_ms = (now - session.created_at).num_milliseconds().max(0);
            let cpu_millis_used = duration_ms;
            let memory_peak_mb = 256;
            let cost_estimate_cents =
                sessionctl_policy::cost(duration_ms as u64, cpu_millis_used as u64, memory_peak_mb as u32);

            delta.ended_at = Some(now);
            delta.duration_ms = Some(duration_ms);
            delta.cpu_millis_used = Some(cpu_millis_used);
            delta.memory_peak_mb = Some(memory_peak_mb);
            delta.cost_estimate_cents = Some(cost_estimate_cents);
            delta.exit_code = observed.exit_code;

            updated.ended_at = delta.ended_at;
            updated.duration_ms = delta.duration_ms;
            updated.cpu_millis_used = delta.cpu_millis_used;
            updated.memory_peak_mb = delta.memory_peak_mb;
            updated.cost_estimate_cents = delta.cost_estimate_cents;
            updated.exit_code = delta.exit_code;
        }

        self.store.update(&session.id, &delta).await?;
        Ok(updated)
    }

    /// List is a thin read with no reconciliation.
    pub async fn list(&self, ctx: &RequestContext, filter: SessionFilter) -> SessionCtlResult<Vec<Session>> {
        self.store.list(&ctx.account_id, filter).await
    }

    /// Stop: rejects an already-terminal session as `Conflict`; not
    /// idempotent.
    pub async fn stop(&self, ctx: &RequestContext, id: &str) -> SessionCtlResult<Session> {
        let mut session = self.load_owned(ctx, id).await?;

        if session.status.is_terminal() {
            return Err(SessionCtlError::conflict("session is already in a terminal state"));
        }

        if let Some(backend_id) = &session.backend_id {
            self.backend
                .stop_session(ctx, backend_id)
                .await
                .map_err(|err| SessionCtlError::internal(format!("backend stop_session failed: {err}")))?;
        }

        let now = Utc::now();
        let delta = SessionUpdate { status: Some(SessionStatus::Stopped), ended_at: Some(now), ..Default::default() };
        self.store.update(id, &delta).await?;

        session.status = SessionStatus::Stopped;
        session.ended_at = Some(now);
        Ok(session)
    }

    /// Kill: unlike Stop, idempotent with respect to status. Always
    /// attempts the destroy and always writes the terminal state, even if
    /// the session was already terminal.
    pub async fn kill(&self, ctx: &RequestContext, id: &str) -> SessionCtlResult<Session> {
        let mut session = self.load_owned(ctx, id).await?;

        if let Some(backend_id) = &session.backend_id {
            self.backend
                .destroy_session(ctx, backend_id)
                .await
                .map_err(|err| SessionCtlError::internal(format!("backend destroy_session failed: {err}")))?;
        }

        let now = Utc::now();
        let delta = SessionUpdate { status: Some(SessionStatus::Killed), ended_at: Some(now), ..Default::default() };
        self.store.update(id, &delta).await?;

        session.status = SessionStatus::Killed;
        session.ended_at = Some(now);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{in_memory_store, stub_backend};
    use sessionctl_images::InMemoryImageCache;
    use sessionctl_types::{NetworkMode, ResourceRequest};
    use std::collections::HashMap;

    fn orchestrator(observed_status: SessionStatus) -> Orchestrator {
        Orchestrator::new(
            Arc::new(in_memory_store()),
            Arc::new(stub_backend(observed_status)),
            Arc::new(InMemoryImageCache::new()),
            None,
        )
    }

    fn request() -> SessionRequest {
        SessionRequest {
            base_image: "python:3.11".into(),
            command: Some(vec!["python".into(), "-c".into(), "print(1)".into()]),
            env: HashMap::new(),
            setup: vec![],
            files: vec![],
            resources: ResourceRequest { cpu_millicores: 500, memory_mb: 256, timeout_ms: 30_000 },
            network: NetworkMode::None,
            ports: vec![],
        }
    }

    #[tokio::test]
    async fn happy_create_then_stop_then_conflict_on_second_stop() {
        let orch = orchestrator(SessionStatus::Running);
        let ctx = RequestContext::new("p1", "a1", "free");

        let session = orch.create(&ctx, request()).await.unwrap();
        assert!(Session::id_matches_format(&session.id));
        assert_eq!(session.status, SessionStatus::Pending);

        let stopped = orch.stop(&ctx, &session.id).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::Stopped);

        let err = orch.stop(&ctx, &session.id).await.unwrap_err();
        assert!(matches!(err, SessionCtlError::Conflict { .. }));
    }

    #[tokio::test]
    async fn get_reconciles_running_status_from_the_backend() {
        let orch = orchestrator(SessionStatus::Running);
        let ctx = RequestContext::new("p1", "a1", "free");

        let created = orch.create(&ctx, request()).await.unwrap();
        assert_eq!(created.status, SessionStatus::Pending);

        let observed = orch.get(&ctx, &created.id).await.unwrap();
        assert_eq!(observed.status, SessionStatus::Running);
    }

    #[tokio::test]
    async fn get_reconciliation_to_terminal_sets_metrics_in_one_update() {
        let orch = orchestrator(SessionStatus::Failed);
        let ctx = RequestContext::new("p1", "a1", "free");

        let created = orch.create(&ctx, request()).await.unwrap();
        let observed = orch.get(&ctx, &created.id).await.unwrap();

        assert_eq!(observed.status, SessionStatus::Failed);
        assert!(observed.ended_at.is_some());
        assert!(observed.duration_ms.is_some());
        assert_eq!(observed.memory_peak_mb, Some(256));
        assert!(observed.cost_estimate_cents.is_some());
        assert_eq!(observed.exit_code, Some(0));
    }

    #[tokio::test]
    async fn kill_is_idempotent_on_an_already_terminal_session() {
        let orch = orchestrator(SessionStatus::Running);
        let ctx = RequestContext::new("p1", "a1", "free");

        let created = orch.create(&ctx, request()).await.unwrap();
        orch.kill(&ctx, &created.id).await.unwrap();
        let second = orch.kill(&ctx, &created.id).await.unwrap();
        assert_eq!(second.status, SessionStatus::Killed);
    }

    #[tokio::test]
    async fn other_accounts_session_lookup_returns_not_found() {
        let orch = orchestrator(SessionStatus::Running);
        let owner = RequestContext::new("p1", "a1", "free");
        let attacker = RequestContext::new("p2", "a2", "free");

        let created = orch.create(&owner, request()).await.unwrap();
        let err = orch.get(&attacker, &created.id).await.unwrap_err();
        assert!(matches!(err, SessionCtlError::NotFound { .. }));
    }
}
