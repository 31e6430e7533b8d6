use sfm_refine::prelude::*;
use sfm_refine::synthetic::{SurveySpec, SyntheticReconstruction, survey};

#[test]
fn prelude_runs_workflow() {
    let mut recon = survey(&SurveySpec {
        points: 1000,
        ..Default::default()
    });
    let mut session = RefinementSession::<GradualSelectionProblem>::new();
    run_workflow(&mut session, &mut recon, GradualSelectionConfig::default()).unwrap();

    let report = session.export().unwrap();
    assert_eq!(report.exit, ExitState::Success);
    assert_eq!(report.initial_points, 1000);
    assert_eq!(session.exports.len(), 1);
}

#[test]
fn report_serializes_exit_code() {
    let mut recon = SyntheticReconstruction::from_reprojection_errors(vec![1.0; 1000]);
    let mut session = RefinementSession::<GradualSelectionProblem>::new();
    run_workflow(&mut session, &mut recon, GradualSelectionConfig::default()).unwrap();

    let report = session.export().unwrap();
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["exit"], "halted_point_floor");
    assert_eq!(json["halt"]["kind"], "point_floor");
    assert_eq!(json["remaining_points"], 93);
}

#[test]
fn missing_reconstruction_is_an_error() {
    let mut session = RefinementSession::<GradualSelectionProblem>::new();
    let err = run_on_active::<SyntheticReconstruction>(
        &mut session,
        None,
        GradualSelectionConfig::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<sfm_refine::WorkflowError>(),
        Some(&sfm_refine::WorkflowError::NoActiveReconstruction)
    );
}
