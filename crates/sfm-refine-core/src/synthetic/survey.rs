//! Deterministic aerial-survey scene.

use serde::{Deserialize, Serialize};

use super::{SyntheticReconstruction, SyntheticTiePoint, UnitSampler};
use crate::{Real, Vec3};

/// Parameters of a synthetic aerial survey.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurveySpec {
    pub seed: u64,
    /// Number of tie points.
    pub points: usize,
    /// Number of cameras with RTK-grade priors.
    pub cameras: usize,
    /// Number of surveyed markers.
    pub markers: usize,
    /// Fraction of points carrying a bad value for some criterion.
    pub outlier_fraction: Real,
    /// Multiplicative change of reprojection errors per solve.
    pub relaxation: Real,
}

impl Default for SurveySpec {
    fn default() -> Self {
        Self {
            seed: 0,
            points: 20_000,
            cameras: 120,
            markers: 8,
            outlier_fraction: 0.15,
            relaxation: 0.985,
        }
    }
}

// Independent sample streams.
const STREAM_RU: usize = 0;
const STREAM_PA: usize = 1;
const STREAM_RE: usize = 2;
const STREAM_OUTLIER: usize = 3;
const STREAM_MARKER: usize = 4;

/// Build a survey reconstruction.
///
/// Inlier values sit below the default USGS targets; outliers are spread
/// above them, one criterion per outlier class.
pub fn survey(spec: &SurveySpec) -> SyntheticReconstruction {
    let sampler = UnitSampler::new(spec.seed);
    let frac = spec.outlier_fraction.clamp(0.0, 1.0);

    let points = (0..spec.points)
        .map(|i| {
            let mut point = SyntheticTiePoint::new(
                sampler.sample_range(STREAM_RU, i, 1.5, 7.5),
                sampler.sample_range(STREAM_PA, i, 0.6, 1.8),
                sampler.sample_range(STREAM_RE, i, 0.02, 0.14),
            );
            let u = sampler.sample(STREAM_OUTLIER, i);
            if u < frac / 3.0 {
                point.reconstruction_uncertainty = sampler.sample_range(STREAM_RU, i, 10.0, 80.0);
            } else if u < 2.0 * frac / 3.0 {
                point.projection_accuracy = sampler.sample_range(STREAM_PA, i, 2.0, 6.0);
            } else if u < frac {
                point.reprojection_error = sampler.sample_range(STREAM_RE, i, 0.2, 1.5);
            }
            point
        })
        .collect();

    let mut recon = SyntheticReconstruction::new(points)
        .with_cameras(spec.cameras, 0.05)
        .with_reprojection_relaxation(spec.relaxation);

    for m in 0..spec.markers {
        let residual = Vec3::new(
            sampler.sample_range(STREAM_MARKER, 3 * m, -0.008, 0.008),
            sampler.sample_range(STREAM_MARKER, 3 * m + 1, -0.008, 0.008),
            sampler.sample_range(STREAM_MARKER, 3 * m + 2, -0.012, 0.012),
        );
        recon = recon.with_marker_residuals(&format!("GCP{:02}", m + 1), 0.005, vec![residual]);
    }
    recon
}
