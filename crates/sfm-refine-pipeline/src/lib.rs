//! Refinement workflows for aligned sparse reconstructions.
//!
//! ## Session API
//!
//! A [`RefinementSession`] holds the controller's configuration, state and
//! results. Step functions mutate it in place while operating on a host
//! reconstruction that implements [`sfm_refine_core::Reconstruction`].
//!
//! ```no_run
//! use sfm_refine_core::synthetic::{SurveySpec, survey};
//! use sfm_refine_pipeline::session::RefinementSession;
//! use sfm_refine_pipeline::gradual_selection::{
//!     GradualSelectionProblem, run_workflow, step_prepare, step_reprojection_error,
//!     step_final_solve,
//! };
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut recon = survey(&SurveySpec::default());
//! let mut session = RefinementSession::<GradualSelectionProblem>::new();
//!
//! // Option 1: individual steps
//! step_prepare(&mut session, &mut recon)?;
//! step_reprojection_error(&mut session, &mut recon)?;
//! step_final_solve(&mut session, &mut recon)?;
//!
//! // Option 2: the whole workflow
//! let config = session.config.clone();
//! run_workflow(&mut session, &mut recon, config)?;
//!
//! let report = session.export()?;
//! # Ok(())
//! # }
//! ```

// Core session framework
pub mod session;

// Problem-specific modules
pub mod gradual_selection;

// ─────────────────────────────────────────────────────────────────────────────
// Session API Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::session::{
    ExportRecord, InvalidationPolicy, LogEntry, LogOutcome, ProblemType, RefinementSession,
    SessionMetadata,
};

pub use crate::gradual_selection::{
    ExitState, GradualSelectionConfig, GradualSelectionProblem, GradualSelectionState,
    HaltReason, StageReport, WorkflowError, WorkflowReport, run_on_active, run_workflow,
    step_coarse_reprojection, step_final_solve, step_prepare, step_projection_accuracy,
    step_reconstruction_uncertainty, step_reprojection_error, step_tighten,
};
