//! `sessionctl-api`: wires the core crates to an axum HTTP/WebSocket edge.
//!
//! This binary is the edge collaborator, kept out of scope for the core
//! crates: routing, request validation, config/env loading and structured
//! logging setup all live here, composing the core crates into a running
//! service.

mod auth;
mod config;
mod handlers;
mod ratelimit_middleware;
mod routes;
mod state;

use auth::AuthConfig;
use clap::Parser;
use config::{AppConfig, Cli};
use sessionctl_attach::AttachHub;
use sessionctl_orchestrator::Orchestrator;
use sessionctl_ratelimit::{spawn_sweep, RateLimiter};
use sessionctl_store_postgres::{PgImageCache, PgSessionStore};
use sessionctl_types::Principal;
use state::AppState;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli)?;
    tracing::info!(bind_addr = %config.bind_addr, "configuration loaded");

    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::query(sessionctl_store_postgres::SCHEMA_SQL).execute(&pool).await?;

    let store = Arc::new(PgSessionStore::new(pool.clone()));
    let image_cache = Arc::new(PgImageCache::new(pool.clone()));

    // No build hook is wired by default: a deployment that supports custom
    // images supplies a `BuildHook` impl talking to its own image builder.
    // Requests with setup/files are rejected as `BadRequest` until one is
    // configured.
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), unconfigured_backend(), image_cache, None));

    let attach = Arc::new(AttachHub::new(store, unconfigured_backend()));

    let principals: HashMap<String, Principal> = config
        .principals
        .iter()
        .map(|p| {
            (
                p.api_key.clone(),
                Principal {
                    id: p.id.clone(),
                    account_id: p.account_id.clone(),
                    tier: p.tier.clone(),
                    rate_limit_per_sec: p.rate_limit_per_sec,
                    active: true,
                    expires_at: None,
                },
            )
        })
        .collect();

    let remote_addr_limiter = RateLimiter::new();
    let principal_limiter = RateLimiter::new();
    let _sweep_handle = spawn_sweep(vec![remote_addr_limiter.clone(), principal_limiter.clone()]);

    let state = AppState {
        orchestrator,
        attach,
        auth: AuthConfig::new(principals),
        remote_addr_limiter,
        principal_limiter,
        unauthenticated_rate_per_sec: config.unauthenticated_rate_per_sec,
    };

    let app = routes::build_router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(bind_addr = %addr, "sessionctl-api listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// No compute backend ships with this workspace: the concrete compute
/// backends are reduced entirely to the `Backend` interface. A real
/// deployment wires its VM fleet or container orchestrator adapter here;
/// this placeholder rejects every call so the edge still starts and the
/// store/attach plumbing is exercisable against it in integration tests.
fn unconfigured_backend() -> Arc<dyn sessionctl_types::Backend> {
    Arc::new(UnconfiguredBackend)
}

struct UnconfiguredBackend;

#[async_trait::async_trait]
impl sessionctl_types::Backend for UnconfiguredBackend {
    async fn create_session(
        &self,
        _ctx: &sessionctl_types::RequestContext,
        _config: sessionctl_types::BackendCreateConfig,
    ) -> sessionctl_types::SessionCtlResult<(sessionctl_types::BackendSession, Option<sessionctl_types::NetworkInfo>)>
    {
        Err(sessionctl_types::SessionCtlError::internal("no compute backend is configured"))
    }

    async fn get_session(
        &self,
        _ctx: &sessionctl_types::RequestContext,
        _backend_id: &str,
    ) -> sessionctl_types::SessionCtlResult<sessionctl_types::BackendSession> {
        Err(sessionctl_types::SessionCtlError::internal("no compute backend is configured"))
    }

    async fn stop_session(
        &self,
        _ctx: &sessionctl_types::RequestContext,
        _backend_id: &str,
    ) -> sessionctl_types::SessionCtlResult<()> {
        Err(sessionctl_types::SessionCtlError::internal("no compute backend is configured"))
    }

    async fn destroy_session(
        &self,
        _ctx: &sessionctl_types::RequestContext,
        _backend_id: &str,
    ) -> sessionctl_types::SessionCtlResult<()> {
        Err(sessionctl_types::SessionCtlError::internal("no compute backend is configured"))
    }

    async fn attach(
        &self,
        _ctx: &sessionctl_types::RequestContext,
        _backend_id: &str,
    ) -> sessionctl_types::SessionCtlResult<sessionctl_types::BackendAttach> {
        Err(sessionctl_types::SessionCtlError::internal("no compute backend is configured"))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
