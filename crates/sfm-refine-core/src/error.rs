use thiserror::Error;

/// Failure reported by the external bundle adjuster.
///
/// The pipeline never retries a failed solve; this error reaches the caller
/// as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("bundle adjustment did not converge: {0}")]
    NotConverged(String),
    #[error("bundle adjustment aborted by host: {0}")]
    Aborted(String),
}

/// Failure of a host-side write (reference prior update).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("camera index {0} is out of range")]
    CameraOutOfRange(usize),
    #[error("marker index {0} is out of range")]
    MarkerOutOfRange(usize),
}
