//! Reference priors and per-entity snapshots read from the host.

use serde::{Deserialize, Serialize};

use crate::{Real, Vec3};

/// Reference (georeferencing) prior attached to a camera or marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePrior {
    /// Whether the prior participates in the adjustment.
    pub enabled: bool,
    /// Reference position in world coordinates, if known.
    pub position: Option<Vec3>,
    /// Per-axis standard deviation of the reference position (meters).
    pub accuracy: Vec3,
}

impl ReferencePrior {
    /// Enabled prior at `position` with isotropic accuracy `sigma`.
    pub fn enabled(position: Vec3, sigma: Real) -> Self {
        Self {
            enabled: true,
            position: Some(position),
            accuracy: crate::isotropic(sigma),
        }
    }

    /// Prior that does not participate in the adjustment.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            position: None,
            accuracy: Vec3::zeros(),
        }
    }

    /// Euclidean norm of the accuracy vector.
    ///
    /// This is the limit a marker residual is compared against.
    pub fn accuracy_norm(&self) -> Real {
        self.accuracy.norm()
    }
}

/// Snapshot of a ground control marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerState {
    /// Host label, used in halt reports.
    pub label: String,
    pub reference: ReferencePrior,
    /// 3-D residual (estimated minus reference position) after the latest
    /// solve. `None` when the marker was not triangulated.
    pub residual: Option<Vec3>,
}

impl MarkerState {
    /// Residual magnitude, if the marker was triangulated.
    pub fn error_norm(&self) -> Option<Real> {
        self.residual.map(|r| r.norm())
    }

    /// True when the marker is reference-enabled and triangulated, i.e. it
    /// contributes to the marker RMSE.
    pub fn is_checkable(&self) -> bool {
        self.reference.enabled && self.residual.is_some()
    }
}

/// Snapshot of a camera's reference prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraReference {
    pub label: String,
    pub reference: ReferencePrior,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn accuracy_norm_is_vector_norm() {
        let prior = ReferencePrior::enabled(Vec3::zeros(), 0.02);
        assert_relative_eq!(prior.accuracy_norm(), 0.02 * 3f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn untriangulated_marker_is_not_checkable() {
        let marker = MarkerState {
            label: "GCP1".into(),
            reference: ReferencePrior::enabled(Vec3::zeros(), 0.02),
            residual: None,
        };
        assert!(!marker.is_checkable());
        assert!(marker.error_norm().is_none());
    }

    #[test]
    fn disabled_marker_is_not_checkable() {
        let marker = MarkerState {
            label: "CHK1".into(),
            reference: ReferencePrior::disabled(),
            residual: Some(Vec3::new(0.01, 0.0, 0.0)),
        };
        assert!(!marker.is_checkable());
        assert_relative_eq!(marker.error_norm().unwrap(), 0.01, epsilon = 1e-12);
    }
}
