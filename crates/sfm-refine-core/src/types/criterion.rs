//! Tie-point quality criteria used by gradual selection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-tie-point quality criterion exposed by the host's tie-point filter.
///
/// Higher values always mean a worse point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Ratio of the longest to the shortest axis of the triangulation error
    /// ellipsoid. Large values mark weak multi-view geometry.
    ReconstructionUncertainty,
    /// Scale related to the image pyramid level the feature was detected at.
    /// Large values mark coarsely localized points.
    ProjectionAccuracy,
    /// Maximum pixel residual across the point's projections after the
    /// current solve.
    ReprojectionError,
}

impl Criterion {
    /// All criteria in the order the USGS workflow applies them.
    pub const ALL: [Criterion; 3] = [
        Criterion::ReconstructionUncertainty,
        Criterion::ProjectionAccuracy,
        Criterion::ReprojectionError,
    ];

    /// Two-letter abbreviation used in logs and reports.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Criterion::ReconstructionUncertainty => "RU",
            Criterion::ProjectionAccuracy => "PA",
            Criterion::ReprojectionError => "RE",
        }
    }

    /// Unit suffix for formatted values.
    pub fn unit(self) -> &'static str {
        match self {
            Criterion::ReconstructionUncertainty => "",
            Criterion::ProjectionAccuracy | Criterion::ReprojectionError => "px",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Criterion::ReconstructionUncertainty => "reconstruction uncertainty",
            Criterion::ProjectionAccuracy => "projection accuracy",
            Criterion::ReprojectionError => "reprojection error",
        };
        f.write_str(name)
    }
}
