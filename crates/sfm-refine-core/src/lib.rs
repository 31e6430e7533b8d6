//! Core types and host interfaces for `sfm-refine`.
//!
//! This crate provides the building blocks shared by the refinement pipeline:
//!
//! - linear algebra type aliases (`Real`, `Vec3`) and small statistics helpers,
//! - the data model of a sparse reconstruction as seen by the controller
//!   (quality criteria, reference priors, marker and camera snapshots),
//! - the intrinsic fit mask and solve request handed to the bundle adjuster,
//! - capability traits the host application implements on its reconstruction
//!   handle,
//! - a deterministic in-memory reconstruction for tests and demos.
//!
//! The controller never owns entity storage. Everything it reads or mutates
//! goes through the [`Reconstruction`] traits, so a host (a photogrammetry
//! application, a bundle adjuster binding, or the [`synthetic`] simulator)
//! only has to expose those capabilities.
//!
//! # Example
//!
//! ```
//! use sfm_refine_core::{Criterion, TiePointStore, synthetic::SyntheticReconstruction};
//!
//! let recon = SyntheticReconstruction::from_reprojection_errors(vec![0.1, 0.5, 2.0]);
//! assert_eq!(recon.valid_tie_point_count(), 3);
//!
//! let values = recon.criterion_values(Criterion::ReprojectionError).unwrap();
//! assert_eq!(values.len(), 3);
//! ```

mod error;
mod host;
/// Linear algebra type aliases and helpers.
mod math;
/// Deterministic in-memory reconstruction and scene generators.
///
/// Used by workspace tests, the demo example and the CLI. Not intended as a
/// production host.
pub mod synthetic;
/// Data model shared by the host traits and the pipeline.
mod types;

pub use error::*;
pub use host::*;
pub use math::*;
pub use types::*;
