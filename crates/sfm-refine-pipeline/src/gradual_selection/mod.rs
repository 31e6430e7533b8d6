//! USGS gradual-selection refinement (Open-File Report 2021-1039).
//!
//! Removes low-quality tie points in three stages and re-solves the bundle
//! adjustment after every deletion:
//!
//! | Step | Criterion | Default target | Safety ratio |
//! |------|-----------|----------------|--------------|
//! | [`step_reconstruction_uncertainty`] | RU | 10.0 | 50 % |
//! | [`step_projection_accuracy`] | PA | 2.0 px | 50 % |
//! | [`step_tighten`] | tie-point accuracy 1.0 → 0.2 px | | |
//! | [`step_reprojection_error`] | RE | 0.18 px | 10 % |
//!
//! [`step_prepare`] runs first and [`step_final_solve`] last;
//! [`run_workflow`] chains all of them.
//!
//! ```no_run
//! use sfm_refine_core::synthetic::{SurveySpec, survey};
//! use sfm_refine_pipeline::gradual_selection::{
//!     GradualSelectionConfig, GradualSelectionProblem, run_workflow,
//! };
//! use sfm_refine_pipeline::session::RefinementSession;
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut recon = survey(&SurveySpec::default());
//! let mut session = RefinementSession::<GradualSelectionProblem>::new();
//! run_workflow(&mut session, &mut recon, GradualSelectionConfig::coarse())?;
//!
//! let report = session.export()?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod error;
mod guard;
mod oracle;
mod problem;
mod reference;
mod report;
mod solver;
mod stage;
mod state;
mod steps;

// ─────────────────────────────────────────────────────────────────────────────
// Session API
// ─────────────────────────────────────────────────────────────────────────────
pub use problem::{GradualSelectionConfig, GradualSelectionProblem};
pub use report::{WorkflowReport, percent_removed};
pub use state::GradualSelectionState;
pub use steps::{
    run_on_active, run_workflow, step_coarse_reprojection, step_final_solve, step_prepare,
    step_projection_accuracy, step_reconstruction_uncertainty, step_reprojection_error,
    step_tighten,
};

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────
pub use error::WorkflowError;
pub use guard::{ExhaustedCause, ExitState, GuardLimits, HaltReason, StopGuard};
pub use oracle::{
    CriterionValues, MarkerViolation, criterion_values, marker_rmse, marker_violation,
};
pub use reference::{
    ReferencePriors, ReferenceSummary, configure_references, lower_tiepoint_accuracy,
};
pub use solver::SolverDriver;
pub use stage::{
    DeletionPlan, RoundRecord, StageReport, StageSpec, delete_where, plan_deletion, run_stage,
};
