//! Stop guard: stage termination predicates.
//!
//! A halt is an ordinary outcome. It carries enough detail to explain why
//! the workflow stopped, and maps to one of the public exit codes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sfm_refine_core::{Criterion, MarkerStore, Real};

use super::oracle::{MarkerViolation, marker_violation};

/// Exit state of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitState {
    Success,
    HaltedPointFloor,
    HaltedRmseRegression,
    HaltedMarkerAccuracy,
    HaltedExhausted,
    HaltedIterationCap,
}

impl ExitState {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            ExitState::Success => "success",
            ExitState::HaltedPointFloor => "halted_point_floor",
            ExitState::HaltedRmseRegression => "halted_rmse_regression",
            ExitState::HaltedMarkerAccuracy => "halted_marker_accuracy",
            ExitState::HaltedExhausted => "halted_exhausted",
            ExitState::HaltedIterationCap => "halted_iteration_cap",
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitState::Success
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a stage stopped making progress while values were still over target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedCause {
    /// The host could not evaluate the criterion, or no valid point has a value.
    NoValues,
    /// The threshold selected no point.
    EmptySelection,
    /// Points were selected but the host removed none.
    NothingRemoved,
}

/// Detailed reason a stage halted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    PointFloor {
        remaining: usize,
        initial: usize,
        ratio: Real,
    },
    RmseRegression {
        previous: Real,
        current: Real,
    },
    MarkerAccuracy(MarkerViolation),
    Exhausted {
        criterion: Criterion,
        cause: ExhaustedCause,
    },
    IterationCap {
        rounds: usize,
    },
}

impl HaltReason {
    pub fn exit_state(&self) -> ExitState {
        match self {
            HaltReason::PointFloor { .. } => ExitState::HaltedPointFloor,
            HaltReason::RmseRegression { .. } => ExitState::HaltedRmseRegression,
            HaltReason::MarkerAccuracy(_) => ExitState::HaltedMarkerAccuracy,
            HaltReason::Exhausted { .. } => ExitState::HaltedExhausted,
            HaltReason::IterationCap { .. } => ExitState::HaltedIterationCap,
        }
    }

    /// Label of the offending marker, for marker-accuracy halts.
    pub fn marker_label(&self) -> Option<&str> {
        match self {
            HaltReason::MarkerAccuracy(v) => Some(&v.label),
            _ => None,
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::PointFloor {
                remaining,
                initial,
                ratio,
            } => write!(
                f,
                "{}: {remaining} valid tie points left, below {:.1}% of {initial}",
                self.exit_state(),
                ratio * 100.0
            ),
            HaltReason::RmseRegression { previous, current } => write!(
                f,
                "{}: marker RMSE rose from {previous:.4} m to {current:.4} m",
                self.exit_state()
            ),
            HaltReason::MarkerAccuracy(v) => write!(
                f,
                "{}: marker {} error {:.4} m exceeds {:.4} m",
                self.exit_state(),
                v.label,
                v.error,
                v.limit
            ),
            HaltReason::Exhausted { criterion, cause } => write!(
                f,
                "{}: {} stage cannot progress ({cause:?})",
                self.exit_state(),
                criterion.abbreviation()
            ),
            HaltReason::IterationCap { rounds } => {
                write!(f, "{}: {rounds} rounds", self.exit_state())
            }
        }
    }
}

/// Thresholds of the stop guard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardLimits {
    /// Halt when the valid count drops below this fraction of the initial count.
    pub point_floor_ratio: Real,
    /// Halt when marker RMSE exceeds the previous value by more than this fraction.
    pub rmse_regression_tolerance: Real,
    pub max_iterations: usize,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            point_floor_ratio: 0.10,
            rmse_regression_tolerance: 0.01,
            max_iterations: 50,
        }
    }
}

/// Per-stage stop guard.
///
/// Holds the marker RMSE memo of the stage. Create a new guard for every
/// stage; the memo starts at `+∞` so the first round never regresses.
#[derive(Debug, Clone)]
pub struct StopGuard {
    limits: GuardLimits,
    initial_count: usize,
    check_markers: bool,
    previous_rmse: Real,
    current_rmse: Option<Real>,
}

impl StopGuard {
    /// `initial_count` is the valid tie-point count at workflow start.
    /// `check_markers` enables the marker-accuracy predicate.
    pub fn new(limits: GuardLimits, initial_count: usize, check_markers: bool) -> Self {
        Self {
            limits,
            initial_count,
            check_markers,
            previous_rmse: Real::INFINITY,
            current_rmse: None,
        }
    }

    pub fn limits(&self) -> &GuardLimits {
        &self.limits
    }

    /// Record the marker RMSE measured after a solve.
    ///
    /// `None` (no checkable markers) leaves the memo unchanged.
    pub fn observe_rmse(&mut self, rmse: Option<Real>) {
        if let Some(rmse) = rmse {
            self.previous_rmse = self.current_rmse.unwrap_or(Real::INFINITY);
            self.current_rmse = Some(rmse);
        }
    }

    pub fn current_rmse(&self) -> Option<Real> {
        self.current_rmse
    }

    /// Evaluate the pre-deletion predicates in order: point floor, RMSE
    /// regression, marker accuracy, iteration cap.
    ///
    /// `valid_count` is the current valid tie-point count and `rounds_done`
    /// the number of deletion rounds this stage has completed.
    pub fn check<R>(&self, recon: &R, valid_count: usize, rounds_done: usize) -> Option<HaltReason>
    where
        R: MarkerStore + ?Sized,
    {
        let floor = self.limits.point_floor_ratio * self.initial_count as Real;
        if (valid_count as Real) < floor {
            return Some(HaltReason::PointFloor {
                remaining: valid_count,
                initial: self.initial_count,
                ratio: self.limits.point_floor_ratio,
            });
        }

        if let Some(current) = self.current_rmse {
            let limit = (1.0 + self.limits.rmse_regression_tolerance) * self.previous_rmse;
            if current > limit {
                return Some(HaltReason::RmseRegression {
                    previous: self.previous_rmse,
                    current,
                });
            }
        }

        if self.check_markers {
            if let Some(violation) = marker_violation(recon) {
                return Some(HaltReason::MarkerAccuracy(violation));
            }
        }

        if rounds_done >= self.limits.max_iterations {
            return Some(HaltReason::IterationCap {
                rounds: rounds_done,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfm_refine_core::{Vec3, synthetic::SyntheticReconstruction};

    fn empty() -> SyntheticReconstruction {
        SyntheticReconstruction::from_reprojection_errors(vec![0.1])
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitState::Success.to_string(), "success");
        assert_eq!(
            serde_json::to_string(&ExitState::HaltedRmseRegression).unwrap(),
            "\"halted_rmse_regression\""
        );
        let all = [
            ExitState::Success,
            ExitState::HaltedPointFloor,
            ExitState::HaltedRmseRegression,
            ExitState::HaltedMarkerAccuracy,
            ExitState::HaltedExhausted,
            ExitState::HaltedIterationCap,
        ];
        for state in all {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.code()));
        }
    }

    #[test]
    fn limits_are_kept() {
        let limits = GuardLimits {
            max_iterations: 7,
            ..Default::default()
        };
        let guard = StopGuard::new(limits, 1000, false);
        assert_eq!(guard.limits(), &limits);
    }

    #[test]
    fn point_floor_is_strict() {
        let guard = StopGuard::new(GuardLimits::default(), 1000, false);
        assert!(guard.check(&empty(), 100, 0).is_none());
        let halt = guard.check(&empty(), 99, 0).unwrap();
        assert_eq!(halt.exit_state(), ExitState::HaltedPointFloor);
    }

    #[test]
    fn first_round_never_regresses() {
        let mut guard = StopGuard::new(GuardLimits::default(), 1000, false);
        assert!(guard.check(&empty(), 1000, 0).is_none());
        guard.observe_rmse(Some(5.0));
        assert!(guard.check(&empty(), 1000, 1).is_none());
    }

    #[test]
    fn regression_uses_tolerance() {
        let mut guard = StopGuard::new(GuardLimits::default(), 1000, false);
        for rmse in [0.10, 0.09, 0.08, 0.0805] {
            guard.observe_rmse(Some(rmse));
            assert!(guard.check(&empty(), 1000, 1).is_none(), "rmse {rmse}");
        }
        guard.observe_rmse(Some(0.0817));
        let halt = guard.check(&empty(), 1000, 1).unwrap();
        match halt {
            HaltReason::RmseRegression { previous, current } => {
                assert_eq!(previous, 0.0805);
                assert_eq!(current, 0.0817);
            }
            other => panic!("unexpected halt {other:?}"),
        }
    }

    #[test]
    fn missing_rmse_keeps_memo() {
        let mut guard = StopGuard::new(GuardLimits::default(), 1000, false);
        guard.observe_rmse(Some(0.05));
        guard.observe_rmse(None);
        assert_eq!(guard.current_rmse(), Some(0.05));
    }

    #[test]
    fn marker_predicate_only_when_enabled() {
        let recon = empty().with_marker("GCP07", 0.02, Some(Vec3::new(0.05, 0.0, 0.0)));

        let lenient = StopGuard::new(GuardLimits::default(), 1, false);
        assert!(lenient.check(&recon, 1, 0).is_none());

        let strict = StopGuard::new(GuardLimits::default(), 1, true);
        let halt = strict.check(&recon, 1, 0).unwrap();
        assert_eq!(halt.exit_state(), ExitState::HaltedMarkerAccuracy);
        assert_eq!(halt.marker_label(), Some("GCP07"));
    }

    #[test]
    fn iteration_cap() {
        let limits = GuardLimits {
            max_iterations: 3,
            ..Default::default()
        };
        let guard = StopGuard::new(limits, 10, false);
        assert!(guard.check(&empty(), 10, 2).is_none());
        assert_eq!(
            guard.check(&empty(), 10, 3),
            Some(HaltReason::IterationCap { rounds: 3 })
        );
    }

    #[test]
    fn predicates_report_in_order() {
        let limits = GuardLimits {
            max_iterations: 1,
            ..Default::default()
        };
        let recon = empty().with_marker("GCP01", 0.02, Some(Vec3::new(1.0, 0.0, 0.0)));
        let mut guard = StopGuard::new(limits, 1000, true);
        guard.observe_rmse(Some(0.1));
        guard.observe_rmse(Some(0.2));

        // Floor wins over everything else
        let halt = guard.check(&recon, 10, 5).unwrap();
        assert_eq!(halt.exit_state(), ExitState::HaltedPointFloor);

        // Then regression, then marker accuracy
        let halt = guard.check(&recon, 1000, 5).unwrap();
        assert_eq!(halt.exit_state(), ExitState::HaltedRmseRegression);

        guard.observe_rmse(Some(0.2));
        let halt = guard.check(&recon, 1000, 5).unwrap();
        assert_eq!(halt.exit_state(), ExitState::HaltedMarkerAccuracy);
    }

    #[test]
    fn halt_reason_serializes_with_kind_tag() {
        let halt = HaltReason::IterationCap { rounds: 50 };
        let json = serde_json::to_value(&halt).unwrap();
        assert_eq!(json["kind"], "iteration_cap");
        assert_eq!(json["rounds"], 50);

        let halt = HaltReason::Exhausted {
            criterion: Criterion::ReprojectionError,
            cause: ExhaustedCause::NoValues,
        };
        let back: HaltReason =
            serde_json::from_value(serde_json::to_value(&halt).unwrap()).unwrap();
        assert_eq!(back, halt);
    }

    #[test]
    fn display_mentions_label() {
        let halt = HaltReason::MarkerAccuracy(MarkerViolation {
            label: "GCP03".into(),
            error: 0.05,
            limit: 0.0346,
        });
        let text = halt.to_string();
        assert!(text.starts_with("halted_marker_accuracy"));
        assert!(text.contains("GCP03"));
    }
}
