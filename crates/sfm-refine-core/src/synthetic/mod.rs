//! Deterministic synthetic reconstructions.
//!
//! [`SyntheticReconstruction`] is an in-memory host implementing every
//! capability trait. Criterion values are scripted, marker residuals follow
//! per-solve sequences, and the "solver" only records requests and applies
//! an optional relaxation of reprojection errors. This is enough to drive
//! the controller through every termination path without a real bundle
//! adjuster.
//!
//! [`survey`] builds a plausible aerial survey cloud from a seed.

mod noise;
mod reconstruction;
mod survey;

pub use noise::UnitSampler;
pub use reconstruction::{SyntheticReconstruction, SyntheticTiePoint};
pub use survey::{SurveySpec, survey};
