use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::info;
use serde_json::Value;
use sfm_refine::prelude::*;
use sfm_refine::synthetic::{SurveySpec, survey};

/// Gradual-selection refinement of a synthetic aerial survey.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "USGS gradual-selection refinement on a synthetic survey"
)]
struct Args {
    /// Optional path to a JSON GradualSelectionConfig. Missing fields,
    /// including nested fit-mask entries, take the variant's values.
    #[arg(long)]
    config: Option<String>,

    /// Named base settings: fine, coarse or strict.
    #[arg(long, default_value = "fine")]
    variant: String,

    /// Number of tie points in the survey.
    #[arg(long, default_value_t = 20_000)]
    points: usize,

    /// Seed of the survey generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = 120)]
    cameras: usize,

    #[arg(long, default_value_t = 8)]
    markers: usize,

    /// Fraction of tie points with a bad criterion value.
    #[arg(long, default_value_t = 0.15)]
    outlier_fraction: f64,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

/// Overlay `overrides` on `base`, descending into nested objects.
fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn load_config(config_path: Option<&str>, variant: &str) -> Result<GradualSelectionConfig> {
    let base = GradualSelectionConfig::variant(variant).ok_or_else(|| {
        anyhow!("unknown variant '{variant}' (expected fine, coarse or strict)")
    })?;
    let Some(path) = config_path else {
        return Ok(base);
    };

    let overrides: Value = load_json_file(Path::new(path))?;
    if !overrides.is_object() {
        bail!("{path}: expected a JSON object");
    }
    let mut merged = serde_json::to_value(base)?;
    merge_json(&mut merged, overrides);
    serde_json::from_value(merged).with_context(|| format!("invalid config in {path}"))
}

fn write_report_json(report: &WorkflowReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn run_survey(spec: &SurveySpec, config: GradualSelectionConfig) -> Result<String> {
    let mut recon = survey(spec);
    let mut session = RefinementSession::<GradualSelectionProblem>::with_description(format!(
        "synthetic survey, seed {}, {} points",
        spec.seed, spec.points
    ));
    run_workflow(&mut session, &mut recon, config)?;

    let report = session.export()?;
    info!("{} solves, exit {}", report.solve_count, report.exit);
    write_report_json(&report)
}

fn main() {
    pretty_env_logger::init_timed();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref(), &args.variant)?;
    let spec = SurveySpec {
        seed: args.seed,
        points: args.points,
        cameras: args.cameras,
        markers: args.markers,
        outlier_fraction: args.outlier_fraction,
        ..Default::default()
    };
    let json = run_survey(&spec, config)?;
    println!("{json}");
    Ok(())
}
