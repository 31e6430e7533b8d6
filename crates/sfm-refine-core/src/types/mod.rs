//! Common types shared across the refinement workspace.
//!
//! This module provides the quality criteria, reference priors and solver
//! options exchanged between the pipeline and the host reconstruction.

mod criterion;
mod options;
mod reference;

pub use criterion::*;
pub use options::*;
pub use reference::*;
