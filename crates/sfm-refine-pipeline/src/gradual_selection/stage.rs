//! Stage executor: one gradual-selection stage.
//!
//! Each round reads the criterion values, stops when the worst value meets
//! the target, asks the stop guard, picks a threshold under the safety
//! ratio, deletes the points above it and re-solves.
//!
//! When more than `safety_ratio` of the points exceed the target, exactly
//! `⌊N · safety_ratio⌋` points are deleted, worst first, so a plateau of
//! equal values is cut at the rank boundary. Ties go to the lower collection
//! index.

use anyhow::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sfm_refine_core::{Criterion, Real, Reconstruction, TiePointStore};

use super::guard::{ExhaustedCause, HaltReason, StopGuard};
use super::oracle::{self, CriterionValues};
use super::solver::SolverDriver;

/// Parameters of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    /// Operation name used in logs and reports.
    pub name: &'static str,
    pub criterion: Criterion,
    pub target: Real,
    pub safety_ratio: Real,
    /// Enables the marker-accuracy predicate.
    pub final_stage: bool,
}

/// Trace of one deletion round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number.
    pub round: usize,
    pub max_value: Real,
    pub threshold: Real,
    /// True when the safety ratio limited the deletion.
    pub safety_limited: bool,
    pub points_before: usize,
    pub selected: usize,
    pub removed: usize,
    /// Marker RMSE after the round's solve (meters).
    pub marker_rmse: Option<Real>,
}

/// Result of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub criterion: Criterion,
    pub target: Real,
    /// Worst value at the first read.
    pub initial_max: Option<Real>,
    /// Worst value at the last read.
    pub final_max: Option<Real>,
    pub points_before: usize,
    pub points_after: usize,
    pub rounds: Vec<RoundRecord>,
    /// `None` when the target was met.
    pub halt: Option<HaltReason>,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        self.halt.is_none()
    }

    pub fn removed(&self) -> usize {
        self.points_before.saturating_sub(self.points_after)
    }
}

/// Deletion chosen for one round.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionPlan {
    pub threshold: Real,
    pub safety_limited: bool,
    /// Collection indices to delete.
    pub indices: Vec<usize>,
}

/// Choose the points to delete this round.
///
/// At most `safety_ratio` of the points exceed `target`: delete all of them.
/// Otherwise delete the `⌊N · safety_ratio⌋` worst, with the threshold
/// reported as the value at that rank (never below `target`).
pub fn plan_deletion(values: &CriterionValues, target: Real, safety_ratio: Real) -> DeletionPlan {
    let n = values.len();
    let over = values.count_over(target);
    if n == 0 || over as Real / n as Real <= safety_ratio {
        let indices = values
            .indexed
            .iter()
            .filter(|(_, v)| *v > target)
            .map(|(i, _)| *i)
            .collect();
        return DeletionPlan {
            threshold: target,
            safety_limited: false,
            indices,
        };
    }

    let k = (n as Real * safety_ratio).floor() as usize;
    let threshold = values
        .sorted_desc
        .get(k)
        .copied()
        .map_or(target, |v| v.max(target));
    DeletionPlan {
        threshold,
        safety_limited: true,
        indices: values.worst_indices(k),
    }
}

/// Select every valid point matching `predicate` and delete the selection.
///
/// Returns the number of removed points.
pub fn delete_where<R, F>(recon: &mut R, values: &CriterionValues, mut predicate: F) -> usize
where
    R: TiePointStore + ?Sized,
    F: FnMut(usize, Real) -> bool,
{
    let indices: Vec<usize> = values
        .indexed
        .iter()
        .filter(|(i, v)| predicate(*i, *v))
        .map(|(i, _)| *i)
        .collect();
    if indices.is_empty() {
        return 0;
    }
    recon.clear_selection();
    recon.select_points(&indices);
    recon.remove_selected_points()
}

/// Run one stage to completion.
///
/// # Errors
///
/// Solver errors and monotonic violations from [`SolverDriver::optimize`].
/// Stop conditions are reported in [`StageReport::halt`], not as errors.
pub fn run_stage<R>(
    recon: &mut R,
    spec: &StageSpec,
    guard: &mut StopGuard,
    driver: &mut SolverDriver,
) -> Result<StageReport>
where
    R: Reconstruction + ?Sized,
{
    let mut report = StageReport {
        name: spec.name.to_string(),
        criterion: spec.criterion,
        target: spec.target,
        initial_max: None,
        final_max: None,
        points_before: recon.valid_tie_point_count(),
        points_after: 0,
        rounds: Vec::new(),
        halt: None,
    };
    debug!(
        "{}: target {} {}, at most {} rounds, {} intrinsics fitted",
        spec.name,
        spec.criterion.abbreviation(),
        spec.target,
        guard.limits().max_iterations,
        driver.request().fit.fitted_count()
    );

    loop {
        let exhausted = |cause| HaltReason::Exhausted {
            criterion: spec.criterion,
            cause,
        };

        let values = match oracle::criterion_values(&*recon, spec.criterion) {
            Some(values) if !values.is_empty() => values,
            _ => {
                report.halt = Some(exhausted(ExhaustedCause::NoValues));
                break;
            }
        };
        let max_value = values.max().unwrap_or(Real::NEG_INFINITY);
        report.initial_max.get_or_insert(max_value);
        report.final_max = Some(max_value);

        if max_value <= spec.target {
            break;
        }

        let points_before = recon.valid_tie_point_count();
        if let Some(halt) = guard.check(&*recon, points_before, report.rounds.len()) {
            report.halt = Some(halt);
            break;
        }

        let plan = plan_deletion(&values, spec.target, spec.safety_ratio);
        if plan.indices.is_empty() {
            report.halt = Some(exhausted(ExhaustedCause::EmptySelection));
            break;
        }

        let mut marked = vec![false; recon.tie_point_count()];
        for &i in &plan.indices {
            if let Some(m) = marked.get_mut(i) {
                *m = true;
            }
        }
        let removed = delete_where(recon, &values, |i, _| {
            marked.get(i).copied().unwrap_or(false)
        });
        if removed == 0 {
            report.halt = Some(exhausted(ExhaustedCause::NothingRemoved));
            break;
        }

        driver.optimize(recon)?;
        let marker_rmse = oracle::marker_rmse(&*recon);
        guard.observe_rmse(marker_rmse);

        let record = RoundRecord {
            round: report.rounds.len() + 1,
            max_value,
            threshold: plan.threshold,
            safety_limited: plan.safety_limited,
            points_before,
            selected: plan.indices.len(),
            removed,
            marker_rmse,
        };
        debug!(
            "{} round {}: max {:.4} {}, threshold {:.4}{}, removed {}/{}",
            spec.name,
            record.round,
            max_value,
            spec.criterion.unit(),
            record.threshold,
            if record.safety_limited { " (safety)" } else { "" },
            removed,
            points_before
        );
        report.rounds.push(record);
    }

    report.points_after = recon.valid_tie_point_count();
    match &report.halt {
        None => info!(
            "{}: target {} met after {} rounds, {} points removed",
            spec.name,
            spec.target,
            report.rounds.len(),
            report.removed()
        ),
        Some(halt) => info!("{}: {} after {} rounds", spec.name, halt, report.rounds.len()),
    }
    Ok(report)
}
