//! Configuration loading: a `clap` CLI layered under a typed `AppConfig`
//! read from file + environment via the `config` crate.

use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "sessionctl-api")]
#[command(about = "sessionctl control plane HTTP/WebSocket edge")]
pub struct Cli {
    #[arg(long, default_value = "config/sessionctl.toml")]
    pub config: String,

    #[arg(long)]
    pub bind: Option<String>,
}

/// Runtime configuration for the binary. Field defaults cover the common
/// tier shapes and a conservative pre-authentication rate.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Requests per second admitted per remote address before a principal
    /// is resolved: a fixed rate applied before authentication.
    #[serde(default = "default_unauthenticated_rate")]
    pub unauthenticated_rate_per_sec: f64,

    /// The known principals for this deployment, keyed by API key. A real
    /// deployment resolves these from an account service; this is
    /// illustrative wiring kept out of the core crates.
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    pub api_key: String,
    pub id: String,
    pub account_id: String,
    pub tier: String,
    #[serde(default = "default_principal_rate")]
    pub rate_limit_per_sec: f64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_unauthenticated_rate() -> f64 {
    10.0
}

fn default_principal_rate() -> f64 {
    10.0
}

impl AppConfig {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(&cli.config).required(false))
            .add_source(config::Environment::with_prefix("SESSIONCTL").separator("__"));

        if let Some(bind) = &cli.bind {
            builder = builder.set_override("bind_addr", bind.clone())?;
        }

        let settings = builder.build()?;
        let config: AppConfig = settings.try_deserialize()?;
        Ok(config)
    }
}
