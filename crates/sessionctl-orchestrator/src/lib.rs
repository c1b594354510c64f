//! Admission controller and session orchestrator.

mod admission;
mod id;
#[cfg(test)]
mod mocks;
mod orchestrator;

pub use admission::{admit, AdmissionDecision};
pub use id::generate_session_id;
pub use orchestrator::Orchestrator;
