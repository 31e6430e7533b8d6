//! [`ProblemType`] implementation for USGS gradual selection.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use sfm_refine_core::{Criterion, IntrinsicFitMask, OptimizeRequest, Real};

use crate::session::{InvalidationPolicy, ProblemType};

use super::guard::GuardLimits;
use super::reference::ReferencePriors;
use super::report::WorkflowReport;
use super::stage::StageSpec;
use super::state::GradualSelectionState;

/// Gradual-selection refinement of an aligned sparse reconstruction
/// (USGS Open-File Report 2021-1039).
///
/// # Associated Types
///
/// - **Config**: [`GradualSelectionConfig`]
/// - **State**: [`GradualSelectionState`]
/// - **Output**: [`WorkflowReport`]
/// - **Export**: [`WorkflowReport`]
#[derive(Debug)]
pub struct GradualSelectionProblem;

/// Configuration of the gradual-selection workflow.
///
/// Defaults are the USGS "fine" settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradualSelectionConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Stage targets
    // ─────────────────────────────────────────────────────────────────────────
    /// Reconstruction uncertainty target (unitless ratio).
    pub target_ru: Real,
    /// Projection accuracy target (pixels).
    pub target_pa: Real,
    /// Reprojection error target (pixels).
    pub target_re: Real,

    // ─────────────────────────────────────────────────────────────────────────
    // Safety ratios
    // ─────────────────────────────────────────────────────────────────────────
    /// Largest fraction of points one RU or PA round may delete.
    pub safety_ratio_ru_pa: Real,
    /// Largest fraction of points one RE round may delete.
    pub safety_ratio_re: Real,

    // ─────────────────────────────────────────────────────────────────────────
    // Stop guard
    // ─────────────────────────────────────────────────────────────────────────
    pub point_floor_ratio: Real,
    pub rmse_regression_tolerance: Real,
    pub max_iterations_per_stage: usize,

    // ─────────────────────────────────────────────────────────────────────────
    // Reference priors
    // ─────────────────────────────────────────────────────────────────────────
    /// Tie-point accuracy set during preparation (pixels).
    pub tiepoint_accuracy_start: Real,
    /// Tie-point accuracy set before the RE stage (pixels).
    pub tiepoint_accuracy_final: Real,
    /// Camera position accuracy (meters) set during preparation. Ignored
    /// when the reconstruction has no reference-enabled markers.
    pub camera_accuracy_override_m: Real,
    pub marker_accuracy_m: Real,
    pub marker_projection_accuracy_px: Real,

    // ─────────────────────────────────────────────────────────────────────────
    // Solver
    // ─────────────────────────────────────────────────────────────────────────
    pub fit_mask: IntrinsicFitMask,
    pub adaptive_fitting: bool,
    /// Request tie-point covariance on the final solve.
    pub final_covariance: bool,

    // ─────────────────────────────────────────────────────────────────────────
    // Workflow
    // ─────────────────────────────────────────────────────────────────────────
    /// Target of an optional RE pass before tightening (pixels).
    pub coarse_re_target: Option<Real>,
    /// Keep running later stages after a stage halts.
    pub continue_after_halt: bool,
}

impl Default for GradualSelectionConfig {
    fn default() -> Self {
        Self {
            target_ru: 10.0,
            target_pa: 2.0,
            target_re: 0.18,
            safety_ratio_ru_pa: 0.5,
            safety_ratio_re: 0.1,
            point_floor_ratio: 0.1,
            rmse_regression_tolerance: 0.01,
            max_iterations_per_stage: 50,
            tiepoint_accuracy_start: 1.0,
            tiepoint_accuracy_final: 0.2,
            camera_accuracy_override_m: 10.0,
            marker_accuracy_m: 0.02,
            marker_projection_accuracy_px: 0.5,
            fit_mask: IntrinsicFitMask::default(),
            adaptive_fitting: true,
            final_covariance: true,
            coarse_re_target: None,
            continue_after_halt: false,
        }
    }
}

impl GradualSelectionConfig {
    /// USGS fine settings (same as `Default`).
    pub fn fine() -> Self {
        Self::default()
    }

    /// Looser PA and RE targets for imagery that cannot reach the fine ones.
    pub fn coarse() -> Self {
        Self {
            target_pa: 3.0,
            target_re: 0.3,
            ..Self::default()
        }
    }

    /// Tighter final tie-point accuracy.
    pub fn strict() -> Self {
        Self {
            tiepoint_accuracy_final: 0.1,
            ..Self::default()
        }
    }

    /// Look up a named variant (`fine`, `coarse` or `strict`).
    pub fn variant(name: &str) -> Option<Self> {
        match name {
            "fine" => Some(Self::fine()),
            "coarse" => Some(Self::coarse()),
            "strict" => Some(Self::strict()),
            _ => None,
        }
    }

    pub fn reference_priors(&self) -> ReferencePriors {
        ReferencePriors {
            camera_accuracy_m: self.camera_accuracy_override_m,
            marker_accuracy_m: self.marker_accuracy_m,
            marker_projection_accuracy_px: self.marker_projection_accuracy_px,
            tiepoint_accuracy_px: self.tiepoint_accuracy_start,
        }
    }

    pub fn guard_limits(&self) -> GuardLimits {
        GuardLimits {
            point_floor_ratio: self.point_floor_ratio,
            rmse_regression_tolerance: self.rmse_regression_tolerance,
            max_iterations: self.max_iterations_per_stage,
        }
    }

    pub fn optimize_request(&self, tie_point_covariance: bool) -> OptimizeRequest {
        OptimizeRequest {
            fit: self.fit_mask,
            adaptive_fitting: self.adaptive_fitting,
            tie_point_covariance,
        }
    }

    pub fn reconstruction_uncertainty_stage(&self) -> StageSpec {
        StageSpec {
            name: "stage_ru",
            criterion: Criterion::ReconstructionUncertainty,
            target: self.target_ru,
            safety_ratio: self.safety_ratio_ru_pa,
            final_stage: false,
        }
    }

    pub fn projection_accuracy_stage(&self) -> StageSpec {
        StageSpec {
            name: "stage_pa",
            criterion: Criterion::ProjectionAccuracy,
            target: self.target_pa,
            safety_ratio: self.safety_ratio_ru_pa,
            final_stage: false,
        }
    }

    pub fn coarse_reprojection_stage(&self) -> Option<StageSpec> {
        self.coarse_re_target.map(|target| StageSpec {
            name: "stage_re_coarse",
            criterion: Criterion::ReprojectionError,
            target,
            safety_ratio: self.safety_ratio_re,
            final_stage: false,
        })
    }

    pub fn reprojection_error_stage(&self) -> StageSpec {
        StageSpec {
            name: "stage_re",
            criterion: Criterion::ReprojectionError,
            target: self.target_re,
            safety_ratio: self.safety_ratio_re,
            final_stage: true,
        }
    }
}

fn ensure_positive(name: &str, value: Real) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be positive (got {value})"
    );
    Ok(())
}

fn ensure_ratio(name: &str, value: Real) -> Result<()> {
    ensure!(
        value > 0.0 && value <= 1.0,
        "{name} must be in (0, 1] (got {value})"
    );
    Ok(())
}

impl ProblemType for GradualSelectionProblem {
    type Config = GradualSelectionConfig;
    type State = GradualSelectionState;
    type Output = WorkflowReport;
    type Export = WorkflowReport;

    fn name() -> &'static str {
        "gradual_selection"
    }

    fn schema_version() -> u32 {
        1
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        ensure_positive("target_ru", config.target_ru)?;
        ensure_positive("target_pa", config.target_pa)?;
        ensure_positive("target_re", config.target_re)?;
        ensure_ratio("safety_ratio_ru_pa", config.safety_ratio_ru_pa)?;
        ensure_ratio("safety_ratio_re", config.safety_ratio_re)?;
        ensure!(
            (0.0..1.0).contains(&config.point_floor_ratio),
            "point_floor_ratio must be in [0, 1) (got {})",
            config.point_floor_ratio
        );
        ensure!(
            config.rmse_regression_tolerance >= 0.0,
            "rmse_regression_tolerance must be non-negative (got {})",
            config.rmse_regression_tolerance
        );
        ensure!(
            config.max_iterations_per_stage > 0,
            "max_iterations_per_stage must be positive"
        );
        ensure_positive("tiepoint_accuracy_start", config.tiepoint_accuracy_start)?;
        ensure_positive("tiepoint_accuracy_final", config.tiepoint_accuracy_final)?;
        ensure!(
            config.tiepoint_accuracy_final <= config.tiepoint_accuracy_start,
            "tiepoint_accuracy_final ({}) must not exceed tiepoint_accuracy_start ({})",
            config.tiepoint_accuracy_final,
            config.tiepoint_accuracy_start
        );
        ensure_positive("camera_accuracy_override_m", config.camera_accuracy_override_m)?;
        ensure_positive("marker_accuracy_m", config.marker_accuracy_m)?;
        ensure_positive(
            "marker_projection_accuracy_px",
            config.marker_projection_accuracy_px,
        )?;
        if let Some(coarse) = config.coarse_re_target {
            ensure!(
                coarse > config.target_re,
                "coarse_re_target ({coarse}) must be above target_re ({})",
                config.target_re
            );
        }
        Ok(())
    }

    fn on_config_change() -> InvalidationPolicy {
        // A new config describes a new run; the old report no longer applies.
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
        Ok(output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(f: impl FnOnce(&mut GradualSelectionConfig)) -> String {
        let mut config = GradualSelectionConfig::default();
        f(&mut config);
        GradualSelectionProblem::validate_config(&config)
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn defaults_are_usgs_fine() {
        let config = GradualSelectionConfig::default();
        assert_eq!(config, GradualSelectionConfig::fine());
        assert_eq!(config.target_ru, 10.0);
        assert_eq!(config.target_pa, 2.0);
        assert_eq!(config.target_re, 0.18);
        assert_eq!(config.max_iterations_per_stage, 50);
        assert!(GradualSelectionProblem::validate_config(&config).is_ok());
    }

    #[test]
    fn variants_validate() {
        for name in ["fine", "coarse", "strict"] {
            let config = GradualSelectionConfig::variant(name).unwrap();
            assert!(GradualSelectionProblem::validate_config(&config).is_ok(), "{name}");
        }
        assert_eq!(GradualSelectionConfig::coarse().target_re, 0.3);
        assert_eq!(GradualSelectionConfig::strict().tiepoint_accuracy_final, 0.1);
        assert!(GradualSelectionConfig::variant("ultra").is_none());
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(invalid(|c| c.target_re = 0.0).contains("target_re"));
        assert!(invalid(|c| c.safety_ratio_re = 1.5).contains("safety_ratio_re"));
        assert!(invalid(|c| c.safety_ratio_ru_pa = 0.0).contains("safety_ratio_ru_pa"));
        assert!(invalid(|c| c.point_floor_ratio = 1.0).contains("point_floor_ratio"));
        assert!(invalid(|c| c.rmse_regression_tolerance = -0.1).contains("tolerance"));
        assert!(invalid(|c| c.max_iterations_per_stage = 0).contains("max_iterations"));
        assert!(invalid(|c| c.tiepoint_accuracy_final = 2.0).contains("must not exceed"));
        assert!(invalid(|c| c.coarse_re_target = Some(0.1)).contains("coarse_re_target"));
    }

    #[test]
    fn stage_specs_follow_config() {
        let config = GradualSelectionConfig::coarse();
        let re = config.reprojection_error_stage();
        assert_eq!(re.criterion, Criterion::ReprojectionError);
        assert_eq!(re.target, 0.3);
        assert_eq!(re.safety_ratio, 0.1);
        assert!(re.final_stage);

        let pa = config.projection_accuracy_stage();
        assert_eq!(pa.target, 3.0);
        assert_eq!(pa.safety_ratio, 0.5);
        assert!(!pa.final_stage);

        assert!(config.coarse_reprojection_stage().is_none());
        let config = GradualSelectionConfig {
            coarse_re_target: Some(0.3),
            ..Default::default()
        };
        let coarse = config.coarse_reprojection_stage().unwrap();
        assert_eq!(coarse.target, 0.3);
        assert!(!coarse.final_stage);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: GradualSelectionConfig =
            serde_json::from_str(r#"{ "target_re": 0.25, "continue_after_halt": true }"#).unwrap();
        assert_eq!(config.target_re, 0.25);
        assert!(config.continue_after_halt);
        assert_eq!(config.target_ru, 10.0);
        assert_eq!(config.fit_mask, IntrinsicFitMask::default());
    }

    #[test]
    fn optimize_request_carries_mask() {
        let config = GradualSelectionConfig {
            fit_mask: IntrinsicFitMask::all_free(),
            adaptive_fitting: false,
            ..Default::default()
        };
        let req = config.optimize_request(true);
        assert_eq!(req.fit.fitted_count(), 13);
        assert!(!req.adaptive_fitting);
        assert!(req.tie_point_covariance);
    }
}
