//! Fatal workflow errors.
//!
//! Stop conditions are not errors; they are reported through
//! [`HaltReason`](super::HaltReason). Solver failures keep their own type
//! ([`sfm_refine_core::SolverError`]) and pass through unchanged.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("no active reconstruction")]
    NoActiveReconstruction,
    #[error("reconstruction has no valid tie points")]
    NoTiePoints,
    #[error("host does not provide the {0} capability")]
    MissingCapability(&'static str),
    /// A quantity the controller only ever lowers went up.
    #[error("monotonic invariant violated: {0}")]
    MonotonicViolation(String),
    #[error("{step} requires {requires} to run first")]
    StepOrder {
        step: &'static str,
        requires: &'static str,
    },
}
