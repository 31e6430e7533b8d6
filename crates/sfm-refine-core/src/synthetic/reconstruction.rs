//! In-memory host reconstruction.

use crate::{
    BundleAdjuster, CameraReference, CameraStore, Capabilities, Criterion, HostError,
    MarkerState, MarkerStore, OptimizeRequest, PointValues, Real, Reconstruction,
    ReconstructionSettings, ReferencePrior, SolverError, TiePointStore, Vec3, quadratic_mean,
};

/// A scripted tie point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticTiePoint {
    pub reconstruction_uncertainty: Real,
    pub projection_accuracy: Real,
    pub reprojection_error: Real,
    pub valid: bool,
}

impl SyntheticTiePoint {
    pub fn new(ru: Real, pa: Real, re: Real) -> Self {
        Self {
            reconstruction_uncertainty: ru,
            projection_accuracy: pa,
            reprojection_error: re,
            valid: true,
        }
    }

    /// A point below every default USGS target.
    pub fn clean() -> Self {
        Self::new(1.0, 0.5, 0.05)
    }

    /// Clean point with one criterion overridden.
    pub fn with_value(criterion: Criterion, value: Real) -> Self {
        let mut point = Self::clean();
        match criterion {
            Criterion::ReconstructionUncertainty => point.reconstruction_uncertainty = value,
            Criterion::ProjectionAccuracy => point.projection_accuracy = value,
            Criterion::ReprojectionError => point.reprojection_error = value,
        }
        point
    }

    pub fn value(&self, criterion: Criterion) -> Real {
        match criterion {
            Criterion::ReconstructionUncertainty => self.reconstruction_uncertainty,
            Criterion::ProjectionAccuracy => self.projection_accuracy,
            Criterion::ReprojectionError => self.reprojection_error,
        }
    }
}

#[derive(Debug, Clone)]
struct SyntheticMarker {
    state: MarkerState,
    /// Residual after solve `k` (1-based) is `sequence[min(k, len) - 1]`.
    sequence: Vec<Vec3>,
}

/// Deterministic in-memory reconstruction implementing [`Reconstruction`].
///
/// Solves never move points; they record the request, scale reprojection
/// errors by the configured relaxation factor and advance scripted marker
/// residuals.
#[derive(Debug, Clone)]
pub struct SyntheticReconstruction {
    points: Vec<SyntheticTiePoint>,
    selected: Vec<bool>,
    cameras: Vec<CameraReference>,
    markers: Vec<SyntheticMarker>,
    tiepoint_accuracy: Real,
    marker_projection_accuracy: Real,
    capabilities: Capabilities,
    unavailable: Vec<Criterion>,
    reprojection_relaxation: Real,
    fail_at_solve: Option<usize>,
    requests: Vec<OptimizeRequest>,
}

impl SyntheticReconstruction {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Reconstruction with the given points, no cameras and no markers.
    ///
    /// Measurement accuracies start at the common host defaults (1.0 px for
    /// tie points, 0.5 px for markers).
    pub fn new(points: Vec<SyntheticTiePoint>) -> Self {
        let n = points.len();
        Self {
            points,
            selected: vec![false; n],
            cameras: Vec::new(),
            markers: Vec::new(),
            tiepoint_accuracy: 1.0,
            marker_projection_accuracy: 0.5,
            capabilities: Capabilities::default(),
            unavailable: Vec::new(),
            reprojection_relaxation: 1.0,
            fail_at_solve: None,
            requests: Vec::new(),
        }
    }

    /// Clean points carrying the given values for one criterion.
    pub fn from_values(criterion: Criterion, values: Vec<Real>) -> Self {
        Self::new(
            values
                .into_iter()
                .map(|v| SyntheticTiePoint::with_value(criterion, v))
                .collect(),
        )
    }

    /// Clean points carrying the given reprojection errors.
    pub fn from_reprojection_errors(values: Vec<Real>) -> Self {
        Self::from_values(Criterion::ReprojectionError, values)
    }

    /// `n` reprojection errors spaced linearly over `[lo, hi]`.
    pub fn linear_reprojection_errors(n: usize, lo: Real, hi: Real) -> Self {
        let step = if n > 1 { (hi - lo) / (n - 1) as Real } else { 0.0 };
        Self::from_reprojection_errors((0..n).map(|i| lo + step * i as Real).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builders
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `n` cameras with enabled priors of isotropic accuracy `sigma`.
    pub fn with_cameras(mut self, n: usize, sigma: Real) -> Self {
        let start = self.cameras.len();
        for i in 0..n {
            let idx = start + i;
            self.cameras.push(CameraReference {
                label: format!("IMG_{idx:04}"),
                reference: ReferencePrior::enabled(
                    Vec3::new(idx as Real * 25.0, 0.0, 120.0),
                    sigma,
                ),
            });
        }
        self
    }

    pub fn with_camera(mut self, camera: CameraReference) -> Self {
        self.cameras.push(camera);
        self
    }

    /// Add an enabled marker with a fixed residual.
    pub fn with_marker(self, label: &str, sigma: Real, residual: Option<Vec3>) -> Self {
        let state = MarkerState {
            label: label.to_string(),
            reference: ReferencePrior::enabled(Vec3::zeros(), sigma),
            residual,
        };
        self.with_marker_state(state, Vec::new())
    }

    /// Add an enabled marker whose residual after solve `k` is
    /// `sequence[min(k, len) - 1]`. Before the first solve it is untriangulated.
    pub fn with_marker_residuals(self, label: &str, sigma: Real, sequence: Vec<Vec3>) -> Self {
        let state = MarkerState {
            label: label.to_string(),
            reference: ReferencePrior::enabled(Vec3::zeros(), sigma),
            residual: None,
        };
        self.with_marker_state(state, sequence)
    }

    pub fn with_marker_state(mut self, state: MarkerState, sequence: Vec<Vec3>) -> Self {
        self.markers.push(SyntheticMarker { state, sequence });
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make the host unable to evaluate `criterion`.
    pub fn without_criterion(mut self, criterion: Criterion) -> Self {
        self.unavailable.push(criterion);
        self
    }

    /// Scale every reprojection error by `factor` after each solve.
    pub fn with_reprojection_relaxation(mut self, factor: Real) -> Self {
        self.reprojection_relaxation = factor;
        self
    }

    /// Make solve number `k` (1-based) fail to converge.
    pub fn failing_at_solve(mut self, k: usize) -> Self {
        self.fail_at_solve = Some(k);
        self
    }

    pub fn with_tiepoint_accuracy(mut self, px: Real) -> Self {
        self.tiepoint_accuracy = px;
        self
    }

    /// Mark the given points invalid.
    pub fn with_invalid(mut self, indices: &[usize]) -> Self {
        for &i in indices {
            if let Some(p) = self.points.get_mut(i) {
                p.valid = false;
            }
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn points(&self) -> &[SyntheticTiePoint] {
        &self.points
    }

    /// Values of `criterion` over valid points, in collection order.
    pub fn valid_values(&self, criterion: Criterion) -> Vec<Real> {
        self.points
            .iter()
            .filter(|p| p.valid)
            .map(|p| p.value(criterion))
            .collect()
    }

    /// Requests received by the solver, in order.
    pub fn requests(&self) -> &[OptimizeRequest] {
        &self.requests
    }

    pub fn solve_count(&self) -> usize {
        self.requests.len()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }

    pub fn marker(&self, label: &str) -> Option<&MarkerState> {
        self.markers
            .iter()
            .map(|m| &m.state)
            .find(|m| m.label == label)
    }
}

impl TiePointStore for SyntheticReconstruction {
    fn tie_point_count(&self) -> usize {
        self.points.len()
    }

    fn valid_tie_point_count(&self) -> usize {
        self.points.iter().filter(|p| p.valid).count()
    }

    fn criterion_values(&self, criterion: Criterion) -> Option<PointValues> {
        if self.unavailable.contains(&criterion) {
            return None;
        }
        Some(
            self.points
                .iter()
                .map(|p| p.valid.then(|| p.value(criterion)))
                .collect(),
        )
    }

    fn select_points(&mut self, indices: &[usize]) -> usize {
        for &i in indices {
            if self.points.get(i).is_some_and(|p| p.valid) {
                self.selected[i] = true;
            }
        }
        self.selected_count()
    }

    fn clear_selection(&mut self) {
        self.selected.iter_mut().for_each(|s| *s = false);
    }

    fn remove_selected_points(&mut self) -> usize {
        let mut removed = 0;
        for (point, selected) in self.points.iter_mut().zip(self.selected.iter_mut()) {
            if *selected && point.valid {
                point.valid = false;
                removed += 1;
            }
            *selected = false;
        }
        removed
    }
}

impl MarkerStore for SyntheticReconstruction {
    fn markers(&self) -> Vec<MarkerState> {
        self.markers.iter().map(|m| m.state.clone()).collect()
    }

    fn set_marker_accuracy(&mut self, index: usize, accuracy: Vec3) -> Result<(), HostError> {
        let marker = self
            .markers
            .get_mut(index)
            .ok_or(HostError::MarkerOutOfRange(index))?;
        marker.state.reference.accuracy = accuracy;
        Ok(())
    }
}

impl CameraStore for SyntheticReconstruction {
    fn camera_references(&self) -> Vec<CameraReference> {
        self.cameras.clone()
    }

    fn set_camera_accuracy(&mut self, index: usize, accuracy: Vec3) -> Result<(), HostError> {
        let camera = self
            .cameras
            .get_mut(index)
            .ok_or(HostError::CameraOutOfRange(index))?;
        camera.reference.accuracy = accuracy;
        Ok(())
    }
}

impl ReconstructionSettings for SyntheticReconstruction {
    fn tiepoint_accuracy(&self) -> Real {
        self.tiepoint_accuracy
    }

    fn set_tiepoint_accuracy(&mut self, px: Real) {
        self.tiepoint_accuracy = px;
    }

    fn marker_projection_accuracy(&self) -> Real {
        self.marker_projection_accuracy
    }

    fn set_marker_projection_accuracy(&mut self, px: Real) {
        self.marker_projection_accuracy = px;
    }
}

impl BundleAdjuster for SyntheticReconstruction {
    fn optimize_cameras(&mut self, request: &OptimizeRequest) -> Result<(), SolverError> {
        let k = self.requests.len() + 1;
        if self.fail_at_solve == Some(k) {
            return Err(SolverError::NotConverged(format!(
                "solve {k} exceeded the iteration limit"
            )));
        }
        self.requests.push(*request);

        if self.reprojection_relaxation != 1.0 {
            for p in self.points.iter_mut().filter(|p| p.valid) {
                p.reprojection_error *= self.reprojection_relaxation;
            }
        }
        for marker in &mut self.markers {
            if let Some(last) = marker.sequence.len().checked_sub(1) {
                marker.state.residual = Some(marker.sequence[(k - 1).min(last)]);
            }
        }
        Ok(())
    }

    fn reprojection_rmse(&self) -> Option<Real> {
        if !self.capabilities.reprojection_rmse {
            return None;
        }
        quadratic_mean(
            self.points
                .iter()
                .filter(|p| p.valid)
                .map(|p| p.reprojection_error),
        )
    }
}

impl Reconstruction for SyntheticReconstruction {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
