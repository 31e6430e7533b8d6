//! Solver options handed to the host bundle adjuster.
//!
//! The intrinsic mask replaces scattered `fit_*` booleans with one semantic
//! structure that can be stored in configuration and compared in tests.

use serde::{Deserialize, Serialize};

/// Mask of intrinsic parameters refined by the bundle adjuster.
///
/// Set a field to `true` to let the solver fit that parameter; `false` keeps
/// it at its current value.
///
/// # Default
///
/// The default is the USGS aerial mask: focal length, principal point, radial
/// `k1..k3` and tangential `p1, p2` are fitted. Higher-order radial `k4`,
/// higher-order tangential `p3, p4` and affinity/skew `b1, b2` stay fixed.
///
/// # Example
///
/// ```
/// use sfm_refine_core::IntrinsicFitMask;
///
/// let mask = IntrinsicFitMask::default();
/// assert!(mask.f);
/// assert!(!mask.k4); // unstable at airborne geometries
/// assert!(!mask.b1); // mechanical-shutter cameras
///
/// // Also fit higher-order tangential terms
/// let mask = IntrinsicFitMask {
///     p3: true,
///     p4: true,
///     ..Default::default()
/// };
/// assert_eq!(mask.fitted_count(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrinsicFitMask {
    /// Focal length.
    pub f: bool,
    /// Principal point x.
    pub cx: bool,
    /// Principal point y.
    pub cy: bool,
    /// Radial distortion coefficients.
    pub k1: bool,
    pub k2: bool,
    pub k3: bool,
    pub k4: bool,
    /// Tangential distortion coefficients.
    pub p1: bool,
    pub p2: bool,
    pub p3: bool,
    pub p4: bool,
    /// Affinity and skew.
    pub b1: bool,
    pub b2: bool,
}

impl Default for IntrinsicFitMask {
    fn default() -> Self {
        Self {
            f: true,
            cx: true,
            cy: true,
            k1: true,
            k2: true,
            k3: true,
            k4: false,
            p1: true,
            p2: true,
            p3: false,
            p4: false,
            b1: false,
            b2: false,
        }
    }
}

impl IntrinsicFitMask {
    /// Parameter names in host order, paired with their fit flag.
    pub fn entries(&self) -> [(&'static str, bool); 13] {
        [
            ("f", self.f),
            ("cx", self.cx),
            ("cy", self.cy),
            ("k1", self.k1),
            ("k2", self.k2),
            ("k3", self.k3),
            ("k4", self.k4),
            ("p1", self.p1),
            ("p2", self.p2),
            ("p3", self.p3),
            ("p4", self.p4),
            ("b1", self.b1),
            ("b2", self.b2),
        ]
    }

    /// Mask that fits every parameter.
    pub fn all_free() -> Self {
        Self {
            f: true,
            cx: true,
            cy: true,
            k1: true,
            k2: true,
            k3: true,
            k4: true,
            p1: true,
            p2: true,
            p3: true,
            p4: true,
            b1: true,
            b2: true,
        }
    }

    /// Mask that keeps every parameter fixed (poses and points only).
    pub fn all_fixed() -> Self {
        Self {
            f: false,
            cx: false,
            cy: false,
            k1: false,
            k2: false,
            k3: false,
            k4: false,
            p1: false,
            p2: false,
            p3: false,
            p4: false,
            b1: false,
            b2: false,
        }
    }

    /// Names of the fitted parameters.
    pub fn fitted(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter_map(|(name, fit)| fit.then_some(name))
            .collect()
    }

    /// Number of fitted parameters.
    pub fn fitted_count(&self) -> usize {
        self.entries().iter().filter(|(_, fit)| *fit).count()
    }
}

/// One bundle-adjustment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub fit: IntrinsicFitMask,
    /// Let the solver drop parameters whose covariance is degenerate.
    pub adaptive_fitting: bool,
    /// Estimate per-tie-point covariance (diagnostics, final solve only).
    pub tie_point_covariance: bool,
}

impl Default for OptimizeRequest {
    fn default() -> Self {
        Self {
            fit: IntrinsicFitMask::default(),
            adaptive_fitting: true,
            tie_point_covariance: false,
        }
    }
}
