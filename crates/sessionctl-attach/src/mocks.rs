//! `mockall` doubles for the `SessionStore`/`Backend` ports, used by the
//! attach hub's precondition tests.

use async_trait::async_trait;
use mockall::mock;
use sessionctl_types::{
    Backend, BackendAttach, BackendCreateConfig, BackendSession, NetworkInfo, RequestContext, Session,
    SessionCtlResult, SessionFilter, SessionStore, SessionUpdate,
};

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

/// A `MockSessionStore` whose `get` always returns a clone of `session`.
pub fn store_returning(session: Option<Session>) -> MockSessionStore {
    let mut store = MockSessionStore::new();
    store.expect_get().returning(move |_| Ok(session.clone()));
    store
}
