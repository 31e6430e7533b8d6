//! Metric oracle: read-only quality metrics of a reconstruction.
//!
//! Nothing in this module mutates the host.

use serde::{Deserialize, Serialize};
use sfm_refine_core::{Criterion, MarkerStore, Real, TiePointStore, quadratic_mean};

/// Criterion values of the valid tie points.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionValues {
    pub criterion: Criterion,
    /// `(collection index, value)` in collection order.
    pub indexed: Vec<(usize, Real)>,
    /// The same values sorted in descending order.
    pub sorted_desc: Vec<Real>,
}

impl CriterionValues {
    /// Build from per-point values aligned with the collection.
    ///
    /// Invalid points and NaN values are dropped. An infinite value stays
    /// and ranks as the worst point.
    pub fn from_point_values(criterion: Criterion, values: &[Option<Real>]) -> Self {
        let indexed: Vec<(usize, Real)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.filter(|v| !v.is_nan()).map(|v| (i, v)))
            .collect();
        let mut sorted_desc: Vec<Real> = indexed.iter().map(|(_, v)| *v).collect();
        sorted_desc.sort_by(|a, b| b.total_cmp(a));
        Self {
            criterion,
            indexed,
            sorted_desc,
        }
    }

    pub fn len(&self) -> usize {
        self.indexed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty()
    }

    pub fn max(&self) -> Option<Real> {
        self.sorted_desc.first().copied()
    }

    /// Number of values strictly above `target`.
    pub fn count_over(&self, target: Real) -> usize {
        self.sorted_desc.partition_point(|v| *v > target)
    }

    /// Collection indices of the `k` worst points.
    ///
    /// Ties are broken by collection index, lowest first.
    pub fn worst_indices(&self, k: usize) -> Vec<usize> {
        let mut ranked = self.indexed.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.into_iter().take(k).map(|(i, _)| i).collect()
    }
}

/// Values of `criterion` over the valid tie points.
///
/// `None` when the host cannot evaluate the criterion.
pub fn criterion_values<R>(recon: &R, criterion: Criterion) -> Option<CriterionValues>
where
    R: TiePointStore + ?Sized,
{
    let values = recon.criterion_values(criterion)?;
    Some(CriterionValues::from_point_values(criterion, &values))
}

/// Quadratic mean of marker error magnitudes (meters).
///
/// Only reference-enabled, triangulated markers contribute. `None` when
/// there are none.
pub fn marker_rmse<R>(recon: &R) -> Option<Real>
where
    R: MarkerStore + ?Sized,
{
    quadratic_mean(
        recon
            .markers()
            .iter()
            .filter(|m| m.is_checkable())
            .filter_map(|m| m.error_norm()),
    )
}

/// A marker whose residual exceeds its reference accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerViolation {
    pub label: String,
    /// Residual magnitude (meters).
    pub error: Real,
    /// Norm of the marker's reference accuracy (meters).
    pub limit: Real,
}

/// First reference-enabled, triangulated marker with
/// `‖residual‖ > ‖accuracy‖`, in host order.
pub fn marker_violation<R>(recon: &R) -> Option<MarkerViolation>
where
    R: MarkerStore + ?Sized,
{
    recon.markers().into_iter().find_map(|m| {
        if !m.is_checkable() {
            return None;
        }
        let error = m.error_norm()?;
        let limit = m.reference.accuracy_norm();
        (error > limit).then(|| MarkerViolation {
            label: m.label,
            error,
            limit,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sfm_refine_core::{
        MarkerState, ReferencePrior, Vec3,
        synthetic::{SyntheticReconstruction, SyntheticTiePoint},
    };

    #[test]
    fn values_skip_invalid_and_nan() {
        let values = [Some(0.3), None, Some(Real::NAN), Some(0.9), Some(0.1)];
        let cv = CriterionValues::from_point_values(Criterion::ReprojectionError, &values);

        assert_eq!(cv.indexed, vec![(0, 0.3), (3, 0.9), (4, 0.1)]);
        assert_eq!(cv.sorted_desc, vec![0.9, 0.3, 0.1]);
        assert_eq!(cv.max(), Some(0.9));
        assert_eq!(cv.count_over(0.2), 2);
        assert_eq!(cv.count_over(0.9), 0);
    }

    #[test]
    fn infinite_value_is_the_worst() {
        let values = [Some(5.0), Some(Real::INFINITY), Some(7.0)];
        let cv = CriterionValues::from_point_values(Criterion::ReconstructionUncertainty, &values);

        assert_eq!(cv.len(), 3);
        assert_eq!(cv.max(), Some(Real::INFINITY));
        assert_eq!(cv.count_over(10.0), 1);
        assert_eq!(cv.worst_indices(1), vec![1]);
    }

    #[test]
    fn worst_indices_break_ties_by_index() {
        let values = [Some(5.0), Some(50.0), Some(50.0), Some(7.0), Some(50.0)];
        let cv = CriterionValues::from_point_values(Criterion::ReconstructionUncertainty, &values);
        assert_eq!(cv.worst_indices(2), vec![1, 2]);
        assert_eq!(cv.worst_indices(4), vec![1, 2, 4, 3]);
    }

    #[test]
    fn empty_values() {
        let cv = CriterionValues::from_point_values(Criterion::ProjectionAccuracy, &[None, None]);
        assert!(cv.is_empty());
        assert_eq!(cv.max(), None);
        assert_eq!(cv.count_over(0.0), 0);
    }

    #[test]
    fn oracle_reads_host_values() {
        let recon = SyntheticReconstruction::new(vec![
            SyntheticTiePoint::new(12.0, 0.5, 0.05),
            SyntheticTiePoint::new(3.0, 2.5, 0.05),
        ]);
        let ru = criterion_values(&recon, Criterion::ReconstructionUncertainty).unwrap();
        assert_eq!(ru.max(), Some(12.0));
        let pa = criterion_values(&recon, Criterion::ProjectionAccuracy).unwrap();
        assert_eq!(pa.indexed, vec![(0, 0.5), (1, 2.5)]);

        let blind = recon.without_criterion(Criterion::ProjectionAccuracy);
        assert!(criterion_values(&blind, Criterion::ProjectionAccuracy).is_none());
    }

    fn marker(label: &str, enabled: bool, residual: Option<Vec3>) -> MarkerState {
        let mut reference = ReferencePrior::enabled(Vec3::zeros(), 0.02);
        reference.enabled = enabled;
        MarkerState {
            label: label.into(),
            reference,
            residual,
        }
    }

    #[test]
    fn marker_rmse_uses_checkable_markers_only() {
        let recon = SyntheticReconstruction::from_reprojection_errors(vec![0.1])
            .with_marker_state(marker("A", true, Some(Vec3::new(0.03, 0.0, 0.0))), vec![])
            .with_marker_state(marker("B", true, Some(Vec3::new(0.0, 0.04, 0.0))), vec![])
            .with_marker_state(marker("C", false, Some(Vec3::new(9.0, 0.0, 0.0))), vec![])
            .with_marker_state(marker("D", true, None), vec![]);

        let expected = ((0.03f64.powi(2) + 0.04f64.powi(2)) / 2.0).sqrt();
        assert_relative_eq!(marker_rmse(&recon).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn marker_rmse_none_without_markers() {
        let recon = SyntheticReconstruction::from_reprojection_errors(vec![0.1]);
        assert!(marker_rmse(&recon).is_none());
    }

    #[test]
    fn first_violating_marker_is_reported() {
        // limit = 0.02 * sqrt(3) ~= 0.0346
        let recon = SyntheticReconstruction::from_reprojection_errors(vec![0.1])
            .with_marker_state(marker("GCP01", true, Some(Vec3::new(0.03, 0.0, 0.0))), vec![])
            .with_marker_state(marker("CHK01", false, Some(Vec3::new(1.0, 0.0, 0.0))), vec![])
            .with_marker_state(marker("GCP02", true, Some(Vec3::new(0.0, 0.0, 0.05))), vec![])
            .with_marker_state(marker("GCP03", true, Some(Vec3::new(0.0, 0.0, 0.08))), vec![]);

        let v = marker_violation(&recon).unwrap();
        assert_eq!(v.label, "GCP02");
        assert_relative_eq!(v.error, 0.05, epsilon = 1e-12);
        assert_relative_eq!(v.limit, 0.02 * 3f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn no_violation_within_accuracy() {
        let recon = SyntheticReconstruction::from_reprojection_errors(vec![0.1])
            .with_marker_state(marker("GCP01", true, Some(Vec3::new(0.02, 0.02, 0.0))), vec![]);
        assert!(marker_violation(&recon).is_none());
    }
}
