//! Solver driver: bundle adjustment with a fixed intrinsic mask.

use anyhow::Result;
use log::debug;
use sfm_refine_core::{BundleAdjuster, OptimizeRequest, TiePointStore};

use super::error::WorkflowError;

/// Issues bundle-adjustment requests and counts completed solves.
///
/// Solver errors are returned as they come from the host, never retried.
/// They stay downcastable to [`sfm_refine_core::SolverError`].
#[derive(Debug, Clone)]
pub struct SolverDriver {
    request: OptimizeRequest,
    solves: usize,
}

impl SolverDriver {
    pub fn new(request: OptimizeRequest) -> Self {
        Self { request, solves: 0 }
    }

    pub fn request(&self) -> &OptimizeRequest {
        &self.request
    }

    /// Number of solves that completed.
    pub fn solves(&self) -> usize {
        self.solves
    }

    /// Run one blocking solve.
    ///
    /// # Errors
    ///
    /// The host's solver error, or [`WorkflowError::MonotonicViolation`] if
    /// the solve increased the valid tie-point count.
    pub fn optimize<R>(&mut self, recon: &mut R) -> Result<()>
    where
        R: BundleAdjuster + TiePointStore + ?Sized,
    {
        let before = recon.valid_tie_point_count();
        recon.optimize_cameras(&self.request)?;
        let after = recon.valid_tie_point_count();
        if after > before {
            return Err(WorkflowError::MonotonicViolation(format!(
                "valid tie points rose from {before} to {after} during a solve"
            ))
            .into());
        }
        self.solves += 1;
        debug!(
            "solve {} done ({} intrinsics fitted, covariance {})",
            self.solves,
            self.request.fit.fitted_count(),
            self.request.tie_point_covariance
        );
        Ok(())
    }
}
