//! Controller state between steps.
//!
//! Only scalar bookkeeping lives here. The reconstruction is owned by the
//! host, so a serialized session never contains tie points.

use serde::{Deserialize, Serialize};
use sfm_refine_core::{Capabilities, Real};

use super::guard::{ExitState, HaltReason};
use super::stage::StageReport;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradualSelectionState {
    // ─────────────────────────────────────────────────────────────────────────
    // From preparation
    // ─────────────────────────────────────────────────────────────────────────
    /// Host capabilities, negotiated once.
    pub capabilities: Option<Capabilities>,

    /// Valid tie points before preparation; the point floor refers to it.
    pub initial_point_count: Option<usize>,

    // ─────────────────────────────────────────────────────────────────────────
    // From stages
    // ─────────────────────────────────────────────────────────────────────────
    pub stages: Vec<StageReport>,

    /// First halt of the workflow.
    pub halt: Option<HaltReason>,
    pub halted_stage: Option<String>,

    /// Tie-point accuracy after mid-workflow tightening (pixels).
    pub tightened_accuracy: Option<Real>,

    // ─────────────────────────────────────────────────────────────────────────
    // Bookkeeping
    // ─────────────────────────────────────────────────────────────────────────
    /// Completed solves since preparation started.
    pub solve_count: usize,

    pub final_solved: bool,
}

impl GradualSelectionState {
    pub fn is_prepared(&self) -> bool {
        self.capabilities.is_some() && self.initial_point_count.is_some()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    pub fn is_tightened(&self) -> bool {
        self.tightened_accuracy.is_some()
    }

    /// Exit state implied by the stages run so far.
    pub fn exit_state(&self) -> ExitState {
        self.halt
            .as_ref()
            .map_or(ExitState::Success, HaltReason::exit_state)
    }

    /// Record a stage result. Only the first halt is kept.
    pub fn record_stage(&mut self, report: StageReport) {
        if self.halt.is_none() {
            if let Some(halt) = &report.halt {
                self.halt = Some(halt.clone());
                self.halted_stage = Some(report.name.clone());
            }
        }
        self.stages.push(report);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfm_refine_core::Criterion;

    fn stage(name: &str, halt: Option<HaltReason>) -> StageReport {
        StageReport {
            name: name.into(),
            criterion: Criterion::ReprojectionError,
            target: 0.18,
            initial_max: Some(1.0),
            final_max: Some(1.0),
            points_before: 100,
            points_after: 90,
            rounds: Vec::new(),
            halt,
        }
    }

    #[test]
    fn default_state_not_prepared() {
        let state = GradualSelectionState::default();
        assert!(!state.is_prepared());
        assert!(!state.is_halted());
        assert!(!state.is_tightened());
        assert_eq!(state.exit_state(), ExitState::Success);
    }

    #[test]
    fn first_halt_wins() {
        let mut state = GradualSelectionState::default();
        state.record_stage(stage("stage_ru", None));
        state.record_stage(stage(
            "stage_pa",
            Some(HaltReason::IterationCap { rounds: 50 }),
        ));
        state.record_stage(stage(
            "stage_re",
            Some(HaltReason::PointFloor {
                remaining: 9,
                initial: 100,
                ratio: 0.1,
            }),
        ));

        assert_eq!(state.stages.len(), 3);
        assert_eq!(state.exit_state(), ExitState::HaltedIterationCap);
        assert_eq!(state.halted_stage.as_deref(), Some("stage_pa"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = GradualSelectionState {
            capabilities: Some(Capabilities::default()),
            initial_point_count: Some(10),
            solve_count: 4,
            ..Default::default()
        };
        assert!(state.is_prepared());
        state.clear();
        assert!(!state.is_prepared());
        assert_eq!(state.solve_count, 0);
    }
}
