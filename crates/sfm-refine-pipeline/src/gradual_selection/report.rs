//! Final workflow report.

use std::fmt;

use serde::{Deserialize, Serialize};
use sfm_refine_core::Real;

use super::guard::{ExitState, HaltReason};
use super::stage::StageReport;

/// Summary of a finished workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub exit: ExitState,
    /// First halt of the workflow, if any.
    pub halt: Option<HaltReason>,
    /// Operation name of the stage that halted.
    pub halted_stage: Option<String>,

    /// Worst reprojection error after the final solve (pixels).
    pub final_max_reprojection_error: Option<Real>,
    /// Valid tie points before preparation.
    pub initial_points: usize,
    pub remaining_points: usize,
    pub percent_removed: Real,
    /// Tie-point accuracy in effect for the final solve (pixels).
    pub final_tiepoint_accuracy: Real,
    /// Marker RMSE after the final solve (centimeters).
    pub marker_rmse_cm: Option<Real>,
    /// Global reprojection RMSE, when the host reports one (pixels).
    pub reprojection_rmse: Option<Real>,

    pub covariance_computed: bool,
    pub solve_count: usize,
    pub stages: Vec<StageReport>,
}

impl WorkflowReport {
    pub fn removed_points(&self) -> usize {
        self.initial_points.saturating_sub(self.remaining_points)
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Percentage of `initial` no longer in `remaining`. Zero for an empty start.
pub fn percent_removed(initial: usize, remaining: usize) -> Real {
    if initial == 0 {
        return 0.0;
    }
    100.0 * initial.saturating_sub(remaining) as Real / initial as Real
}

fn opt(value: Option<Real>, precision: usize, unit: &str) -> String {
    value.map_or_else(
        || "n/a".to_string(),
        |v| format!("{v:.precision$} {unit}"),
    )
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "exit: {}", self.exit)?;
        if let Some(halt) = &self.halt {
            let stage = self.halted_stage.as_deref().unwrap_or("?");
            writeln!(f, "halt ({stage}): {halt}")?;
        }
        writeln!(
            f,
            "max reprojection error: {}",
            opt(self.final_max_reprojection_error, 4, "px")
        )?;
        writeln!(
            f,
            "tie points: {} of {} kept, {:.1}% removed",
            self.remaining_points, self.initial_points, self.percent_removed
        )?;
        writeln!(
            f,
            "tie-point accuracy: {:.2} px",
            self.final_tiepoint_accuracy
        )?;
        writeln!(f, "marker RMSE: {}", opt(self.marker_rmse_cm, 2, "cm"))?;
        write!(
            f,
            "reprojection RMSE: {}",
            opt(self.reprojection_rmse, 4, "px")
        )
    }
}
