//! Capability traits implemented by the host reconstruction.
//!
//! The pipeline interacts with a reconstruction exclusively through these
//! traits. They mirror the four capability sets a photogrammetry host
//! exposes on its sparse model:
//!
//! - [`BundleAdjuster`]: intrinsic-mask solve,
//! - [`TiePointStore`]: per-point criterion values, selection and removal,
//! - [`MarkerStore`] and [`CameraStore`]: entity enumeration and prior writes,
//! - [`ReconstructionSettings`]: scalar measurement accuracies.
//!
//! Optional behaviour is advertised once through [`Capabilities`] instead of
//! being probed per call.

use serde::{Deserialize, Serialize};

use crate::{
    CameraReference, Criterion, HostError, MarkerState, OptimizeRequest, Real, SolverError, Vec3,
};

/// Capabilities advertised by a host reconstruction.
///
/// The pipeline reads these once, at the start of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The solver honours [`OptimizeRequest::fit`].
    pub intrinsic_fit_mask: bool,
    /// Markers report post-solve residuals.
    pub marker_residuals: bool,
    /// The solver can estimate per-tie-point covariance.
    pub tie_point_covariance: bool,
    /// The host reports a global reprojection RMSE.
    pub reprojection_rmse: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            intrinsic_fit_mask: true,
            marker_residuals: true,
            tie_point_covariance: true,
            reprojection_rmse: false,
        }
    }
}

/// Per-point criterion values aligned with the tie-point collection.
///
/// Entry `i` belongs to tie point `i`; `None` marks an invalid point.
pub type PointValues = Vec<Option<Real>>;

/// Tie-point filter capability.
pub trait TiePointStore {
    /// Size of the tie-point collection, including invalid points.
    fn tie_point_count(&self) -> usize;

    /// Number of valid tie points.
    fn valid_tie_point_count(&self) -> usize;

    /// Criterion values for every point in the collection.
    ///
    /// Returns `None` when the host cannot evaluate the criterion at all.
    fn criterion_values(&self, criterion: Criterion) -> Option<PointValues>;

    /// Mark the given points as selected. Returns the number of points that
    /// are selected afterwards.
    fn select_points(&mut self, indices: &[usize]) -> usize;

    /// Drop the current selection without removing anything.
    fn clear_selection(&mut self);

    /// Remove all selected points. Returns the number of removed points.
    fn remove_selected_points(&mut self) -> usize;
}

/// Marker enumeration capability.
pub trait MarkerStore {
    /// Snapshot of all markers in host order.
    fn markers(&self) -> Vec<MarkerState>;

    /// Overwrite the reference accuracy of marker `index`.
    fn set_marker_accuracy(&mut self, index: usize, accuracy: Vec3) -> Result<(), HostError>;
}

/// Camera enumeration capability.
pub trait CameraStore {
    /// Snapshot of all camera reference priors in host order.
    fn camera_references(&self) -> Vec<CameraReference>;

    /// Overwrite the reference accuracy of camera `index`.
    fn set_camera_accuracy(&mut self, index: usize, accuracy: Vec3) -> Result<(), HostError>;
}

/// Scalar measurement-accuracy settings.
pub trait ReconstructionSettings {
    /// Assumed standard deviation of tie-point image measurements (pixels).
    fn tiepoint_accuracy(&self) -> Real;
    fn set_tiepoint_accuracy(&mut self, px: Real);

    /// Assumed standard deviation of marker image measurements (pixels).
    fn marker_projection_accuracy(&self) -> Real;
    fn set_marker_projection_accuracy(&mut self, px: Real);
}

/// Intrinsic-mask solve capability.
pub trait BundleAdjuster {
    /// Run a blocking bundle adjustment. Mutates poses, intrinsics, tie-point
    /// positions and marker residuals in place.
    fn optimize_cameras(&mut self, request: &OptimizeRequest) -> Result<(), SolverError>;

    /// Global reprojection RMSE after the latest solve (pixels).
    fn reprojection_rmse(&self) -> Option<Real> {
        None
    }
}

/// A host reconstruction handle exposing every capability the pipeline uses.
pub trait Reconstruction:
    TiePointStore + MarkerStore + CameraStore + ReconstructionSettings + BundleAdjuster
{
    /// Capabilities of this host. Read once per workflow.
    fn capabilities(&self) -> Capabilities;
}
