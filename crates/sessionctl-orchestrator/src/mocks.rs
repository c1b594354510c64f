//! `mockall` doubles for the `SessionStore`/`Backend`/`BuildHook` ports,
//! shared by the orchestrator and admission test modules.

use async_trait::async_trait;
use mockall::mock;
use sessionctl_images::BuildSpec;
use sessionctl_types::{
    Backend, BackendAttach, BackendCreateConfig, BackendSession, NetworkInfo, RequestContext, Session,
    SessionCtlResult, SessionFilter, SessionStatus, SessionStore, SessionUpdate,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

mock! {
    pub SessionStore {}

    #[async_trait]
    impl SessionStore for SessionStore {
        async fn create(&self, session: &Session) -> SessionCtlResult<()>;
        async fn get(&self, id: &str) -> SessionCtlResult<Option<Session>>;
        async fn list(&self, account_id: &str, filter: SessionFilter) -> SessionCtlResult<Vec<Session>>;
        async fn update(&self, id: &str, delta: &SessionUpdate) -> SessionCtlResult<()>;
        async fn count_active(&self, account_id: &str) -> SessionCtlResult<i64>;
        async fn count_today(&self, account_id: &str) -> SessionCtlResult<i64>;
    }
}

mock! {
    pub Backend {}

    #[async_trait]
    impl Backend for Backend {
        async fn create_session(
            &self,
            ctx: &RequestContext,
            config: BackendCreateConfig,
        ) -> SessionCtlResult<(BackendSession, Option<NetworkInfo>)>;
        async fn get_session(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<BackendSession>;
        async fn stop_session(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<()>;
        async fn destroy_session(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<()>;
        async fn attach(&self, ctx: &RequestContext, backend_id: &str) -> SessionCtlResult<BackendAttach>;
        fn name(&self) -> &str;
    }
}

mock! {
    pub BuildHook {}

    #[async_trait]
    impl sessionctl_images::BuildHook for BuildHook {
        async fn build(&self, ctx: &RequestContext, spec: &BuildSpec) -> SessionCtlResult<String>;
    }
}

/// A `MockSessionStore` backed by a shared map: `create`/`get`/`update`
/// behave like a real store across a test's sequence of calls instead of
/// needing one `.expect_*()` per call.
pub fn in_memory_store() -> MockSessionStore {
    let sessions: Arc<Mutex<HashMap<String, Session>>> = Arc::new(Mutex::new(HashMap::new()));
    let mut store = MockSessionStore::new();

    let map = sessions.clone();
    store.expect_create().returning(move |session| {
        map.lock().unwrap().insert(session.id.clone(), session.clone());
        Ok(())
    });

    let map = sessions.clone();
    store.expect_get().returning(move |id| Ok(map.lock().unwrap().get(id).cloned()));

    let map = sessions.clone();
    store.expect_list().returning(move |account_id, _filter| {
        Ok(map.lock().unwrap().values().filter(|s| s.owner_account_id == account_id).cloned().collect())
    });

    let map = sessions.clone();
    store.expect_update().returning(move |id, delta| {
        let mut sessions = map.lock().unwrap();
        let session =
            sessions.get_mut(id).ok_or_else(|| sessionctl_types::SessionCtlError::not_found(id.to_string()))?;
        if let Some(status) = delta.status {
            session.status = status;
        }
        if delta.ended_at.is_some() {
            session.ended_at = delta.ended_at;
        }
        if delta.exit_code.is_some() {
            session.exit_code = delta.exit_code;
        }
        if delta.duration_ms.is_some() {
            session.duration_ms = delta.duration_ms;
        }
        if delta.cpu_millis_used.is_some() {
            session.cpu_millis_used = delta.cpu_millis_used;
        }
        if delta.memory_peak_mb.is_some() {
            session.memory_peak_mb = delta.memory_peak_mb;
        }
        if delta.cost_estimate_cents.is_some() {
            session.cost_estimate_cents = delta.cost_estimate_cents;
        }
        Ok(())
    });

    let map = sessions.clone();
    store.expect_count_active().returning(move |account_id| {
        Ok(map
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.owner_account_id == account_id && !s.status.is_terminal())
            .count() as i64)
    });

    let map = sessions;
    store.expect_count_today().returning(move |account_id| {
        Ok(map.lock().unwrap().values().filter(|s| s.owner_account_id == account_id).count() as i64)
    });

    store
}

/// A `MockSessionStore` that reports fixed `count_active`/`count_today`
/// values and is never expected to take any other call.
pub fn store_with_counts(active: i64, today: i64) -> MockSessionStore {
    let mut store = MockSessionStore::new();
    store.expect_count_active().returning(move |_| Ok(active));
    store.expect_count_today().returning(move |_| Ok(today));
    store
}

/// A `MockBackend` that reports `observed_status` from `get_session` and
/// succeeds on every other call it's exercised through.
pub fn stub_backend(observed_status: SessionStatus) -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_create_session().returning(|_, _| {
        Ok((BackendSession { backend_id: "be-1".into(), status: SessionStatus::Pending, exit_code: None }, None))
    });
    backend.expect_get_session().returning(move |_, backend_id| {
        Ok(BackendSession { backend_id: backend_id.to_string(), status: observed_status, exit_code: Some(0) })
    });
    backend.expect_stop_session().returning(|_, _| Ok(()));
    backend.expect_destroy_session().returning(|_, _| Ok(()));
    backend.expect_name().return_const("stub".to_string());
    backend
}

/// A `MockBuildHook` that always resolves to `tag`.
pub fn build_hook(tag: &'static str) -> MockBuildHook {
    let mut hook = MockBuildHook::new();
    hook.expect_build().returning(move |_, _| Ok(tag.to_string()));
    hook
}
