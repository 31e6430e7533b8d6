//! High-level entry crate for `sfm-refine`, automated refinement of aligned
//! sparse SfM reconstructions.
//!
//! The library drives an external bundle adjuster through the USGS
//! gradual-selection procedure (Open-File Report 2021-1039): tie points with
//! high reconstruction uncertainty, poor projection accuracy and large
//! reprojection error are removed in bounded rounds, and the reconstruction
//! is re-solved after every deletion.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sfm_refine::prelude::*;
//! use sfm_refine::synthetic::{SurveySpec, survey};
//!
//! // Any host implementing `Reconstruction` works; this one is in memory.
//! let mut recon = survey(&SurveySpec::default());
//!
//! let mut session = RefinementSession::<GradualSelectionProblem>::new();
//! run_workflow(&mut session, &mut recon, GradualSelectionConfig::fine())?;
//!
//! let report = session.export()?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`session`] - Session framework (`RefinementSession`, `ProblemType`)
//! - [`gradual_selection`] - The refinement workflow and its components
//! - [`core`] - Data model and host capability traits
//! - [`synthetic`] - In-memory reconstructions for tests and demos
//!
//! # Steps
//!
//! | Step | Effect |
//! |------|--------|
//! | `step_prepare` | capability check, reference priors, first solve |
//! | `step_reconstruction_uncertainty` | RU stage |
//! | `step_projection_accuracy` | PA stage |
//! | `step_coarse_reprojection` | optional RE pre-pass |
//! | `step_tighten` | tie-point accuracy 1.0 → 0.2 px, solve |
//! | `step_reprojection_error` | RE stage with marker checks |
//! | `step_final_solve` | solve with covariance, build the report |
//!
//! A halt (point floor, marker RMSE regression, marker accuracy, exhausted
//! stage or iteration cap) is reported through [`ExitState`], not as an
//! error. Errors are reserved for precondition failures and solver errors.

// ═══════════════════════════════════════════════════════════════════════════════
// Session Framework
// ═══════════════════════════════════════════════════════════════════════════════

/// Session framework: mutable state container, audit log and JSON
/// checkpointing.
pub mod session {
    pub use sfm_refine_pipeline::session::{
        ExportRecord, InvalidationPolicy, LogEntry, LogOutcome, ProblemType, RefinementSession,
        SessionMetadata,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Workflows
// ═══════════════════════════════════════════════════════════════════════════════

/// USGS gradual selection.
///
/// # Steps
/// 1. `step_prepare` - Negotiate capabilities, set reference priors, solve
/// 2. `step_reconstruction_uncertainty` - Remove RU outliers
/// 3. `step_projection_accuracy` - Remove PA outliers
/// 4. `step_coarse_reprojection` (optional) - Coarse RE pass
/// 5. `step_tighten` - Lower tie-point accuracy, solve
/// 6. `step_reprojection_error` - Remove RE outliers
/// 7. `step_final_solve` - Final solve and report
///
/// # Example
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use sfm_refine::prelude::*;
/// use sfm_refine::gradual_selection::{step_final_solve, step_prepare, step_reprojection_error};
/// use sfm_refine::synthetic::SyntheticReconstruction;
///
/// let mut recon = SyntheticReconstruction::linear_reprojection_errors(1000, 0.05, 0.5);
/// let mut session = RefinementSession::<GradualSelectionProblem>::new();
/// step_prepare(&mut session, &mut recon)?;
/// step_reprojection_error(&mut session, &mut recon)?;
/// step_final_solve(&mut session, &mut recon)?;
/// # Ok(())
/// # }
/// ```
pub mod gradual_selection {
    pub use sfm_refine_pipeline::gradual_selection::{
        // Components
        CriterionValues,
        DeletionPlan,
        ExhaustedCause,
        ExitState,
        // Problem type and config
        GradualSelectionConfig,
        GradualSelectionProblem,
        GradualSelectionState,
        GuardLimits,
        HaltReason,
        MarkerViolation,
        ReferencePriors,
        ReferenceSummary,
        RoundRecord,
        SolverDriver,
        StageReport,
        StageSpec,
        StopGuard,
        WorkflowError,
        WorkflowReport,
        configure_references,
        criterion_values,
        delete_where,
        lower_tiepoint_accuracy,
        marker_rmse,
        marker_violation,
        percent_removed,
        plan_deletion,
        // Step functions
        run_on_active,
        run_stage,
        run_workflow,
        step_coarse_reprojection,
        step_final_solve,
        step_prepare,
        step_projection_accuracy,
        step_reconstruction_uncertainty,
        step_reprojection_error,
        step_tighten,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Foundation Crate
// ═══════════════════════════════════════════════════════════════════════════════

/// Data model, host capability traits and math helpers.
pub mod core {
    pub use sfm_refine_core::*;
}

/// Deterministic in-memory reconstructions.
pub mod synthetic {
    pub use sfm_refine_core::synthetic::*;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Root Re-exports
// ═══════════════════════════════════════════════════════════════════════════════

pub use sfm_refine_core::{
    BundleAdjuster, CameraReference, CameraStore, Capabilities, Criterion, HostError,
    IntrinsicFitMask, MarkerState, MarkerStore, OptimizeRequest, PointValues, Real,
    Reconstruction, ReconstructionSettings, ReferencePrior, SolverError, TiePointStore, Vec3,
};
pub use sfm_refine_pipeline::gradual_selection::{
    ExitState, GradualSelectionConfig, GradualSelectionProblem, HaltReason, WorkflowError,
    WorkflowReport, run_on_active, run_workflow,
};
pub use sfm_refine_pipeline::session::RefinementSession;

/// Convenient imports for the common case.
///
/// ```no_run
/// use sfm_refine::prelude::*;
/// ```
pub mod prelude {
    // Session framework
    pub use crate::session::{ProblemType, RefinementSession};

    // Problem type and pipeline functions
    pub use crate::{
        ExitState, GradualSelectionConfig, GradualSelectionProblem, HaltReason, WorkflowReport,
        run_on_active, run_workflow,
    };

    // Host interface
    pub use crate::{
        Capabilities, Criterion, IntrinsicFitMask, OptimizeRequest, Real, Reconstruction, Vec3,
    };
}
