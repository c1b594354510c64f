//! Port interfaces for dependency inversion.
//!
//! `Backend` and `SessionStore` are the two seams the core is written
//! against; concrete implementations live in their own crates so the
//! orchestrator never branches on which one is wired in.

pub mod backend;
pub mod store;

pub use backend::{Backend, BackendAttach, BackendCreateConfig, BackendSession, NetworkInfo};
pub use store::{QuotaRequestIntake, SessionFilter, SessionStore};
