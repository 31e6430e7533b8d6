//! Reference configurator: accuracy priors set before the first solve.

use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sfm_refine_core::{
    CameraStore, MarkerStore, Real, Reconstruction, ReconstructionSettings, isotropic,
};

use super::error::WorkflowError;

/// Accuracy priors applied during preparation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePriors {
    /// Isotropic camera position accuracy (meters). Applied only when at
    /// least one reference-enabled marker exists.
    pub camera_accuracy_m: Real,
    /// Isotropic marker position accuracy (meters).
    pub marker_accuracy_m: Real,
    pub marker_projection_accuracy_px: Real,
    /// Upper bound for the tie-point accuracy (pixels).
    pub tiepoint_accuracy_px: Real,
}

/// What the configurator changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSummary {
    /// Zero when no reference-enabled marker was found.
    pub cameras_loosened: usize,
    pub markers_updated: usize,
    pub tiepoint_accuracy: Real,
}

/// Apply `priors` to the reconstruction.
///
/// Camera priors are loosened only when at least one reference-enabled
/// marker exists; without ground control the camera positions are the only
/// georeference and stay as they are.
///
/// # Errors
///
/// Host write failures, or [`WorkflowError::MonotonicViolation`] if the
/// host raises the tie-point accuracy.
pub fn configure_references<R>(recon: &mut R, priors: &ReferencePriors) -> Result<ReferenceSummary>
where
    R: Reconstruction + ?Sized,
{
    let markers = recon.markers();
    let mut markers_updated = 0;
    for (idx, marker) in markers.iter().enumerate() {
        if marker.reference.enabled {
            recon.set_marker_accuracy(idx, isotropic(priors.marker_accuracy_m))?;
            markers_updated += 1;
        }
    }

    let mut cameras_loosened = 0;
    if markers_updated > 0 {
        for (idx, camera) in recon.camera_references().iter().enumerate() {
            if camera.reference.enabled {
                recon.set_camera_accuracy(idx, isotropic(priors.camera_accuracy_m))?;
                cameras_loosened += 1;
            }
        }
    } else {
        warn!("no reference-enabled markers; camera accuracy priors left unchanged");
    }

    recon.set_marker_projection_accuracy(priors.marker_projection_accuracy_px);
    let tiepoint_accuracy = lower_tiepoint_accuracy(recon, priors.tiepoint_accuracy_px)?;

    debug!(
        "reference priors: {} cameras at {} m, {} markers at {} m, tie points {} px",
        cameras_loosened,
        priors.camera_accuracy_m,
        markers_updated,
        priors.marker_accuracy_m,
        tiepoint_accuracy
    );

    Ok(ReferenceSummary {
        cameras_loosened,
        markers_updated,
        tiepoint_accuracy,
    })
}

/// Set the tie-point accuracy to `min(current, px)` and return the new value.
///
/// # Errors
///
/// [`WorkflowError::MonotonicViolation`] if the value read back is larger
/// than before.
pub fn lower_tiepoint_accuracy<R>(recon: &mut R, px: Real) -> Result<Real>
where
    R: ReconstructionSettings + ?Sized,
{
    let before = recon.tiepoint_accuracy();
    if px < before {
        recon.set_tiepoint_accuracy(px);
    }
    let after = recon.tiepoint_accuracy();
    if after > before {
        return Err(WorkflowError::MonotonicViolation(format!(
            "tie-point accuracy rose from {before} px to {after} px"
        ))
        .into());
    }
    Ok(after)
}
