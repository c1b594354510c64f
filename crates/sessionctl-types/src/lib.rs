//! Shared types and port traits for the sessionctl control plane.
//!
//! This crate has no I/O of its own. It defines the domain model, the
//! error taxonomy, the request context that carries the
//! authenticated principal through every core call, and the two ports
//! (`Backend`, `SessionStore`) that the orchestrator and attach hub are
//! written against.

pub mod context;
pub mod errors;
pub mod model;
pub mod ports;

pub use context::RequestContext;
pub use errors::{SessionCtlError, SessionCtlResult};
pub use model::*;
pub use ports::{
    Backend, BackendAttach, BackendCreateConfig, BackendSession, NetworkInfo, QuotaRequestIntake, SessionFilter,
    SessionStore,
};
