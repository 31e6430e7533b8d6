//! Gradual selection on a synthetic aerial survey.
//!
//! This example walks through the refinement workflow step by step:
//! 1. Build a deterministic survey reconstruction (tie points, cameras, markers)
//! 2. Prepare: reference priors and the first solve
//! 3. Run the RU, PA and RE stages with mid-workflow tightening
//! 4. Run the final solve and print the report
//!
//! Run with: `RUST_LOG=debug cargo run -p sfm-refine --example usgs_synthetic`

use anyhow::Result;
use sfm_refine::gradual_selection::{
    step_final_solve, step_prepare, step_projection_accuracy, step_reconstruction_uncertainty,
    step_reprojection_error, step_tighten,
};
use sfm_refine::prelude::*;
use sfm_refine::synthetic::{SurveySpec, survey};
use sfm_refine::{ReconstructionSettings, TiePointStore};

fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    println!("=== USGS Gradual Selection (Synthetic Survey) ===\n");

    let spec = SurveySpec {
        points: 20_000,
        cameras: 120,
        markers: 8,
        ..Default::default()
    };
    let mut recon = survey(&spec);
    println!(
        "Survey: {} tie points, {} cameras, {} markers, outlier fraction {:.0}%\n",
        recon.valid_tie_point_count(),
        spec.cameras,
        spec.markers,
        spec.outlier_fraction * 100.0
    );

    let mut session = RefinementSession::<GradualSelectionProblem>::with_description(
        "synthetic survey, fine settings",
    );
    session.set_config(GradualSelectionConfig::fine())?;

    // Option 1: Step-by-step (recommended for inspection)
    println!("--- Preparation ---");
    step_prepare(&mut session, &mut recon)?;
    println!(
        "  Tie-point accuracy: {:.2} px",
        recon.tiepoint_accuracy()
    );
    println!();

    step_reconstruction_uncertainty(&mut session, &mut recon)?;
    step_projection_accuracy(&mut session, &mut recon)?;
    step_tighten(&mut session, &mut recon)?;
    step_reprojection_error(&mut session, &mut recon)?;

    println!("--- Stages ---");
    for stage in &session.state.stages {
        println!(
            "  {:<10} {} -> {} points in {} rounds (max {} {:.4} -> {:.4})",
            stage.name,
            stage.points_before,
            stage.points_after,
            stage.rounds.len(),
            stage.criterion.abbreviation(),
            stage.initial_max.unwrap_or_default(),
            stage.final_max.unwrap_or_default()
        );
    }
    println!();

    step_final_solve(&mut session, &mut recon)?;
    let report = session.export()?;

    println!("--- Final Report ---");
    println!("{report}");
    println!();

    println!("--- Audit Log ---");
    for entry in &session.log {
        println!(
            "  {:<12} {:?} {}",
            entry.operation,
            entry.outcome,
            entry.notes.as_deref().unwrap_or("")
        );
    }
    println!();

    // Option 2: Pipeline function (convenience)
    println!("--- Alternative: run_workflow() with coarse settings ---");
    let mut recon2 = survey(&spec);
    let mut session2 = RefinementSession::<GradualSelectionProblem>::new();
    run_workflow(&mut session2, &mut recon2, GradualSelectionConfig::coarse())?;
    let report2 = session2.export()?;
    println!(
        "  Exit: {}, {} of {} tie points kept ({:.1}% removed)",
        report2.exit, report2.remaining_points, report2.initial_points, report2.percent_removed
    );

    Ok(())
}
