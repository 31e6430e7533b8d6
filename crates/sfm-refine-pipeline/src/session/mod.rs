//! Refinement session framework.
//!
//! Sessions are mutable containers for the controller's configuration,
//! scalar state and results. Step functions mutate a session in place while
//! operating on a host reconstruction passed alongside it.
//!
//! ```no_run
//! use sfm_refine_core::synthetic::{SurveySpec, survey};
//! use sfm_refine_pipeline::gradual_selection::{
//!     GradualSelectionProblem, step_final_solve, step_prepare, step_projection_accuracy,
//!     step_reconstruction_uncertainty, step_reprojection_error, step_tighten,
//! };
//! use sfm_refine_pipeline::session::RefinementSession;
//! # fn main() -> anyhow::Result<()> {
//!
//! let mut recon = survey(&SurveySpec::default());
//! let mut session = RefinementSession::<GradualSelectionProblem>::new();
//!
//! step_prepare(&mut session, &mut recon)?;
//! step_reconstruction_uncertainty(&mut session, &mut recon)?;
//! step_projection_accuracy(&mut session, &mut recon)?;
//! step_tighten(&mut session, &mut recon)?;
//! step_reprojection_error(&mut session, &mut recon)?;
//! step_final_solve(&mut session, &mut recon)?;
//!
//! let report = session.export()?;
//! # Ok(())
//! # }
//! ```

pub mod problem_type;
pub mod refine_session;
pub mod types;

pub use problem_type::{InvalidationPolicy, ProblemType};
pub use refine_session::RefinementSession;
pub use types::{ExportRecord, LogEntry, LogOutcome, SessionMetadata, current_timestamp};
