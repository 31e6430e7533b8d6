//! Step functions for gradual selection.
//!
//! Every step takes the session and the host reconstruction. Steps append
//! an audit entry to the session log whether they succeed, halt or fail.

use anyhow::Result;
use log::{debug, info, warn};
use sfm_refine_core::{
    BundleAdjuster, Capabilities, Criterion, Reconstruction, ReconstructionSettings,
    TiePointStore,
};

use crate::session::RefinementSession;

use super::error::WorkflowError;
use super::guard::StopGuard;
use super::oracle;
use super::problem::{GradualSelectionConfig, GradualSelectionProblem};
use super::reference::{configure_references, lower_tiepoint_accuracy};
use super::report::{WorkflowReport, percent_removed};
use super::solver::SolverDriver;
use super::stage::{StageSpec, run_stage};

type Session = RefinementSession<GradualSelectionProblem>;

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Log a failed step and hand the error back.
fn logged<T>(session: &mut Session, operation: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        session.log_failure(operation, format!("{err:#}"));
    }
    result
}

/// Initial point count of a prepared session.
fn require_prepared(session: &Session, step: &'static str) -> Result<usize> {
    match session.state.initial_point_count {
        Some(initial) if session.state.is_prepared() => Ok(initial),
        _ => Err(WorkflowError::StepOrder {
            step,
            requires: "step_prepare",
        }
        .into()),
    }
}

/// True (after logging the skip) when a previous halt ends the selection.
fn skip_after_halt(session: &mut Session, operation: &str) -> bool {
    if session.state.is_halted() && !session.config.continue_after_halt {
        debug!("{operation}: skipped, workflow already halted");
        session.log_success_with_notes(operation, "skipped: workflow halted");
        return true;
    }
    false
}

fn negotiate(capabilities: &Capabilities) -> Result<(), WorkflowError> {
    if !capabilities.intrinsic_fit_mask {
        return Err(WorkflowError::MissingCapability("intrinsic-mask solve"));
    }
    if !capabilities.marker_residuals {
        return Err(WorkflowError::MissingCapability("marker residual"));
    }
    Ok(())
}

/// Run one solve and add it to the session's solve count.
fn solve<R>(session: &mut Session, recon: &mut R, tie_point_covariance: bool) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let mut driver = SolverDriver::new(session.config.optimize_request(tie_point_covariance));
    let result = driver.optimize(recon);
    session.state.solve_count += driver.solves();
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Step Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Negotiate capabilities, set reference priors and run the first solve.
///
/// Resets the controller state, so a session can be reused for another run.
///
/// # Errors
///
/// - [`WorkflowError::MissingCapability`] if the host lacks the
///   intrinsic-mask solve or marker residuals.
/// - [`WorkflowError::NoTiePoints`] if there is no valid tie point.
/// - Solver errors, unchanged.
///
/// Precondition failures leave the reconstruction untouched.
pub fn step_prepare<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let result = prepare(session, recon);
    logged(session, "prepare", result)
}

fn prepare<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    session.validate()?;
    let capabilities = recon.capabilities();
    negotiate(&capabilities)?;
    let initial = recon.valid_tie_point_count();
    if initial == 0 {
        return Err(WorkflowError::NoTiePoints.into());
    }
    if session.config.final_covariance && !capabilities.tie_point_covariance {
        warn!("host cannot estimate tie-point covariance; the final solve runs without it");
    }

    session.state.clear();
    session.clear_output();
    session.state.capabilities = Some(capabilities);
    session.state.initial_point_count = Some(initial);

    let summary = configure_references(recon, &session.config.reference_priors())?;
    solve(session, recon, false)?;

    info!(
        "prepared: {initial} tie points, tie-point accuracy {:.2} px",
        summary.tiepoint_accuracy
    );
    session.log_success_with_notes(
        "prepare",
        format!(
            "{initial} tie points, {} cameras loosened, {} markers, tie-point accuracy {:.2} px",
            summary.cameras_loosened, summary.markers_updated, summary.tiepoint_accuracy
        ),
    );
    Ok(())
}

fn selection_stage<R>(session: &mut Session, recon: &mut R, spec: &StageSpec) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let initial = require_prepared(session, spec.name)?;
    if skip_after_halt(session, spec.name) {
        return Ok(());
    }

    let mut guard = StopGuard::new(session.config.guard_limits(), initial, spec.final_stage);
    let mut driver = SolverDriver::new(session.config.optimize_request(false));
    let result = run_stage(recon, spec, &mut guard, &mut driver);
    session.state.solve_count += driver.solves();
    let report = result?;

    match &report.halt {
        Some(halt) => {
            warn!("{}: {halt}", spec.name);
            session.log_halt(spec.name, halt.to_string());
        }
        None => session.log_success_with_notes(
            spec.name,
            format!(
                "{} rounds, {} points removed, max {} {:.4} {}",
                report.rounds.len(),
                report.removed(),
                spec.criterion.abbreviation(),
                report.final_max.unwrap_or_default(),
                spec.criterion.unit()
            ),
        ),
    }
    session.state.record_stage(report);
    Ok(())
}

fn logged_stage<R>(session: &mut Session, recon: &mut R, spec: StageSpec) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let result = selection_stage(session, recon, &spec);
    logged(session, spec.name, result)
}

/// Stage 1: remove points with high reconstruction uncertainty.
///
/// # Errors
///
/// [`WorkflowError::StepOrder`] before [`step_prepare`]; solver errors.
pub fn step_reconstruction_uncertainty<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let spec = session.config.reconstruction_uncertainty_stage();
    logged_stage(session, recon, spec)
}

/// Stage 2: remove points with poor projection accuracy.
///
/// # Errors
///
/// [`WorkflowError::StepOrder`] before [`step_prepare`]; solver errors.
pub fn step_projection_accuracy<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let spec = session.config.projection_accuracy_stage();
    logged_stage(session, recon, spec)
}

/// Optional reprojection-error pass before tightening.
///
/// Does nothing unless `coarse_re_target` is set.
///
/// # Errors
///
/// [`WorkflowError::StepOrder`] before [`step_prepare`]; solver errors.
pub fn step_coarse_reprojection<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    match session.config.coarse_reprojection_stage() {
        Some(spec) => logged_stage(session, recon, spec),
        None => {
            debug!("coarse reprojection pass disabled");
            Ok(())
        }
    }
}

/// Lower the tie-point accuracy to `tiepoint_accuracy_final` and re-solve.
///
/// # Errors
///
/// [`WorkflowError::StepOrder`] before [`step_prepare`],
/// [`WorkflowError::MonotonicViolation`] if the host raises the accuracy,
/// solver errors.
pub fn step_tighten<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let result = tighten(session, recon);
    logged(session, "tighten", result)
}

fn tighten<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    require_prepared(session, "tighten")?;
    if skip_after_halt(session, "tighten") {
        return Ok(());
    }

    let before = recon.tiepoint_accuracy();
    let after = lower_tiepoint_accuracy(recon, session.config.tiepoint_accuracy_final)?;
    solve(session, recon, false)?;
    session.state.tightened_accuracy = Some(after);

    info!("tie-point accuracy {before:.2} -> {after:.2} px");
    session.log_success_with_notes(
        "tighten",
        format!("tie-point accuracy {before:.2} -> {after:.2} px"),
    );
    Ok(())
}

/// Stage 3: remove points with high reprojection error.
///
/// The marker-accuracy predicate is active in this stage.
///
/// # Errors
///
/// [`WorkflowError::StepOrder`] before [`step_prepare`]; solver errors.
pub fn step_reprojection_error<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let spec = session.config.reprojection_error_stage();
    logged_stage(session, recon, spec)
}

/// Final solve (with tie-point covariance when available) and report.
///
/// Runs after a halt too, so the reconstruction is always left solved.
///
/// # Errors
///
/// [`WorkflowError::StepOrder`] before [`step_prepare`]; solver errors.
pub fn step_final_solve<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let result = final_solve(session, recon);
    logged(session, "final_solve", result)
}

fn final_solve<R>(session: &mut Session, recon: &mut R) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let initial = require_prepared(session, "final_solve")?;
    let capabilities = session.state.capabilities.unwrap_or_default();
    let covariance = session.config.final_covariance && capabilities.tie_point_covariance;

    solve(session, recon, covariance)?;
    session.state.final_solved = true;

    let remaining = recon.valid_tie_point_count();
    let reprojection_rmse = if capabilities.reprojection_rmse {
        recon.reprojection_rmse()
    } else {
        None
    };
    let report = WorkflowReport {
        exit: session.state.exit_state(),
        halt: session.state.halt.clone(),
        halted_stage: session.state.halted_stage.clone(),
        final_max_reprojection_error: oracle::criterion_values(
            &*recon,
            Criterion::ReprojectionError,
        )
        .and_then(|values| values.max()),
        initial_points: initial,
        remaining_points: remaining,
        percent_removed: percent_removed(initial, remaining),
        final_tiepoint_accuracy: recon.tiepoint_accuracy(),
        marker_rmse_cm: oracle::marker_rmse(&*recon).map(|m| m * 100.0),
        reprojection_rmse,
        covariance_computed: covariance,
        solve_count: session.state.solve_count,
        stages: session.state.stages.clone(),
    };

    info!(
        "workflow {}: {remaining}/{initial} tie points kept ({:.1}% removed)",
        report.exit, report.percent_removed
    );
    session.log_success_with_notes(
        "final_solve",
        format!(
            "exit {}, covariance {}, {} solves",
            report.exit, covariance, report.solve_count
        ),
    );
    session.set_output(report);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Run the complete workflow with `config`.
///
/// Order: preparation, RU stage, PA stage, optional coarse RE pass,
/// tightening, RE stage, final solve. After the first halt the remaining
/// selection stages and the tightening are skipped unless
/// `continue_after_halt` is set; the final solve always runs.
///
/// # Errors
///
/// Invalid configuration, precondition failures and solver errors. Halts
/// are reported in the output, not as errors.
pub fn run_workflow<R>(
    session: &mut Session,
    recon: &mut R,
    config: GradualSelectionConfig,
) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    session.set_config(config)?;

    step_prepare(session, recon)?;
    step_reconstruction_uncertainty(session, recon)?;
    step_projection_accuracy(session, recon)?;
    step_coarse_reprojection(session, recon)?;
    step_tighten(session, recon)?;
    step_reprojection_error(session, recon)?;
    step_final_solve(session, recon)?;

    Ok(())
}

/// [`run_workflow`] on the host's active reconstruction, if there is one.
///
/// # Errors
///
/// [`WorkflowError::NoActiveReconstruction`] when `active` is `None`, plus
/// everything [`run_workflow`] returns.
pub fn run_on_active<R>(
    session: &mut Session,
    active: Option<&mut R>,
    config: GradualSelectionConfig,
) -> Result<()>
where
    R: Reconstruction + ?Sized,
{
    let Some(recon) = active else {
        let err = WorkflowError::NoActiveReconstruction;
        session.log_failure("workflow", err.to_string());
        return Err(err.into());
    };
    run_workflow(session, recon, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradual_selection::HaltReason;
    use crate::session::LogOutcome;
    use sfm_refine_core::synthetic::SyntheticReconstruction;

    #[test]
    fn stages_require_preparation() {
        let mut session = Session::new();
        let mut recon = SyntheticReconstruction::from_reprojection_errors(vec![1.0; 10]);

        let err = step_reprojection_error(&mut session, &mut recon).unwrap_err();
        assert_eq!(
            err.downcast_ref::<WorkflowError>(),
            Some(&WorkflowError::StepOrder {
                step: "stage_re",
                requires: "step_prepare",
            })
        );
        assert!(step_tighten(&mut session, &mut recon).is_err());
        assert!(step_final_solve(&mut session, &mut recon).is_err());
        assert_eq!(recon.solve_count(), 0);
        assert!(session.log.iter().all(|e| e.is_failure()));
    }

    #[test]
    fn prepare_records_initial_state() {
        let mut session = Session::new();
        let mut recon = SyntheticReconstruction::from_reprojection_errors(vec![0.1; 50])
            .with_invalid(&[0, 1]);

        step_prepare(&mut session, &mut recon).unwrap();

        assert!(session.state.is_prepared());
        assert_eq!(session.state.initial_point_count, Some(48));
        assert_eq!(session.state.solve_count, 1);
        assert_eq!(recon.solve_count(), 1);
        assert!(!recon.requests()[0].tie_point_covariance);
        assert_eq!(session.log.last().unwrap().operation, "prepare");
    }

    #[test]
    fn halt_skips_tightening() {
        let mut session = Session::new();
        let mut recon = SyntheticReconstruction::from_reprojection_errors(vec![0.1; 10]);
        step_prepare(&mut session, &mut recon).unwrap();
        session.state.halt = Some(HaltReason::IterationCap { rounds: 50 });

        step_tighten(&mut session, &mut recon).unwrap();

        assert!(!session.state.is_tightened());
        assert_eq!(recon.tiepoint_accuracy(), 1.0);
        assert_eq!(recon.solve_count(), 1);
        let entry = session.log.last().unwrap();
        assert_eq!(entry.outcome, LogOutcome::Success);
        assert_eq!(entry.notes.as_deref(), Some("skipped: workflow halted"));
    }

    #[test]
    fn coarse_pass_is_off_by_default() {
        let mut session = Session::new();
        let mut recon = SyntheticReconstruction::from_reprojection_errors(vec![1.0; 10]);
        step_prepare(&mut session, &mut recon).unwrap();
        let log_len = session.log.len();

        step_coarse_reprojection(&mut session, &mut recon).unwrap();

        assert_eq!(session.log.len(), log_len);
        assert!(session.state.stages.is_empty());
        assert_eq!(recon.valid_tie_point_count(), 10);
    }

    #[test]
    fn no_active_reconstruction() {
        let mut session = Session::new();
        let err = run_on_active::<SyntheticReconstruction>(
            &mut session,
            None,
            GradualSelectionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<WorkflowError>(),
            Some(&WorkflowError::NoActiveReconstruction)
        );
        assert!(!session.has_output());
    }
}
