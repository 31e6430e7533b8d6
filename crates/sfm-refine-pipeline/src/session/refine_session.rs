//! Refinement session container.
//!
//! A session holds everything the controller owns between steps: config,
//! scalar state, the final output, exports and an audit log. The host
//! reconstruction is deliberately absent; step functions receive it as a
//! separate `&mut` argument.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::problem_type::ProblemType;
use super::types::{ExportRecord, LogEntry, SessionMetadata};

/// Mutable session container parameterized over a problem type.
///
/// # Example
///
/// ```no_run
/// use sfm_refine_core::synthetic::{SurveySpec, survey};
/// use sfm_refine_pipeline::gradual_selection::{GradualSelectionProblem, run_workflow};
/// use sfm_refine_pipeline::session::RefinementSession;
/// # fn main() -> anyhow::Result<()> {
///
/// let mut recon = survey(&SurveySpec::default());
/// let mut session = RefinementSession::<GradualSelectionProblem>::new();
/// let config = session.config.clone();
///
/// run_workflow(&mut session, &mut recon, config)?;
/// let report = session.export()?;
/// println!("{}", report.exit);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "P: ProblemType")]
pub struct RefinementSession<P: ProblemType> {
    pub metadata: SessionMetadata,

    /// Always present; defaults until explicitly set.
    pub config: P::Config,

    pub state: P::State,

    output: Option<P::Output>,

    pub exports: Vec<ExportRecord<P::Export>>,

    pub log: Vec<LogEntry>,
}

impl<P: ProblemType> RefinementSession<P> {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty session with default configuration.
    pub fn new() -> Self {
        Self::from_metadata(SessionMetadata::new(P::name(), P::schema_version()))
    }

    /// Create an empty session with a description.
    pub fn with_description(description: impl Into<String>) -> Self {
        Self::from_metadata(SessionMetadata::with_description(
            P::name(),
            P::schema_version(),
            description,
        ))
    }

    fn from_metadata(metadata: SessionMetadata) -> Self {
        Self {
            metadata,
            config: P::Config::default(),
            state: P::State::default(),
            output: None,
            exports: Vec::new(),
            log: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────────

    /// Set configuration, applying validation and the invalidation policy.
    ///
    /// # Errors
    ///
    /// Returns an error if [`ProblemType::validate_config`] fails. The
    /// session is left untouched in that case.
    pub fn set_config(&mut self, config: P::Config) -> Result<()> {
        P::validate_config(&config)?;

        let policy = P::on_config_change();
        if policy.clear_state {
            self.state = P::State::default();
        }
        if policy.clear_output {
            self.output = None;
        }
        if policy.clear_exports {
            self.exports.clear();
        }

        self.config = config;
        self.metadata.touch();
        Ok(())
    }

    /// Edit a copy of the configuration, then validate and store it.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails after the update.
    pub fn update_config<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut P::Config),
    {
        let mut new_config = self.config.clone();
        f(&mut new_config);
        self.set_config(new_config)
    }

    /// Validate the stored configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error, if any.
    pub fn validate(&self) -> Result<()> {
        P::validate_config(&self.config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────────

    pub fn output(&self) -> Option<&P::Output> {
        self.output.as_ref()
    }

    /// # Errors
    ///
    /// Returns an error if no output has been computed.
    pub fn require_output(&self) -> Result<&P::Output> {
        self.output
            .as_ref()
            .ok_or_else(|| anyhow!("output not computed"))
    }

    /// Store the output (called by step functions).
    pub fn set_output(&mut self, output: P::Output) {
        self.output = Some(output);
        self.metadata.touch();
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn clear_output(&mut self) {
        self.output = None;
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────────

    /// Export the current output and append it to the exports collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is not computed or conversion fails.
    pub fn export(&mut self) -> Result<P::Export> {
        let export = self.export_peek()?;
        self.exports.push(ExportRecord::new(export.clone()));
        self.metadata.touch();
        Ok(export)
    }

    /// Like [`export`](Self::export), attaching notes to the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is not computed or conversion fails.
    pub fn export_with_notes(&mut self, notes: impl Into<String>) -> Result<P::Export> {
        let export = self.export_peek()?;
        self.exports
            .push(ExportRecord::with_notes(export.clone(), notes));
        self.metadata.touch();
        Ok(export)
    }

    /// Export without storing a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the output is not computed or conversion fails.
    pub fn export_peek(&self) -> Result<P::Export> {
        let output = self.require_output()?;
        P::export(output, &self.config)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    pub fn log_success(&mut self, operation: impl Into<String>) {
        self.push_log(LogEntry::success(operation));
    }

    pub fn log_success_with_notes(
        &mut self,
        operation: impl Into<String>,
        notes: impl Into<String>,
    ) {
        self.push_log(LogEntry::success_with_notes(operation, notes));
    }

    /// Log an operation that ended on a stop condition.
    pub fn log_halt(&mut self, operation: impl Into<String>, reason: impl Into<String>) {
        self.push_log(LogEntry::halted(operation, reason));
    }

    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.push_log(LogEntry::failure(operation, error));
    }

    fn push_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    /// Reset state to default, keeping config, output and exports.
    pub fn reset_state(&mut self) {
        self.state = P::State::default();
        self.metadata.touch();
    }

    /// Reset everything except config and metadata.
    pub fn reset(&mut self) {
        self.state = P::State::default();
        self.output = None;
        self.exports.clear();
        self.log.clear();
        self.metadata.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize the session to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Restore a session from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails, if the session belongs to
    /// another problem type, or if its schema version is newer than supported.
    pub fn from_json(json: &str) -> Result<Self> {
        let session: Self = serde_json::from_str(json)?;

        if session.metadata.problem_type != P::name() {
            bail!(
                "session belongs to problem type '{}', expected '{}'",
                session.metadata.problem_type,
                P::name()
            );
        }
        if session.metadata.schema_version > P::schema_version() {
            bail!(
                "session schema version {} is newer than supported version {}",
                session.metadata.schema_version,
                P::schema_version()
            );
        }

        Ok(session)
    }
}

impl<P: ProblemType> Default for RefinementSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InvalidationPolicy;
    use crate::session::types::LogOutcome;
    use anyhow::ensure;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct CounterConfig {
        cap: usize,
    }

    impl Default for CounterConfig {
        fn default() -> Self {
            Self { cap: 5 }
        }
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct CounterState {
        rounds: usize,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct CounterOutput {
        removed: usize,
    }

    #[derive(Debug)]
    struct CounterProblem;

    impl ProblemType for CounterProblem {
        type Config = CounterConfig;
        type State = CounterState;
        type Output = CounterOutput;
        type Export = usize;

        fn name() -> &'static str {
            "counter"
        }

        fn validate_config(config: &Self::Config) -> Result<()> {
            ensure!(config.cap > 0, "cap must be positive");
            Ok(())
        }

        fn on_config_change() -> InvalidationPolicy {
            InvalidationPolicy::CLEAR_COMPUTED
        }

        fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
            Ok(output.removed)
        }
    }

    #[derive(Debug)]
    struct OtherProblem;

    impl ProblemType for OtherProblem {
        type Config = CounterConfig;
        type State = CounterState;
        type Output = CounterOutput;
        type Export = usize;

        fn name() -> &'static str {
            "other"
        }

        fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
            Ok(output.removed)
        }
    }

    #[test]
    fn new_session_has_defaults() {
        let session = RefinementSession::<CounterProblem>::new();
        assert_eq!(session.metadata.problem_type, "counter");
        assert_eq!(session.metadata.schema_version, 1);
        assert_eq!(session.config.cap, 5);
        assert!(session.output().is_none());
        assert!(session.exports.is_empty());
        assert!(session.log.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_without_side_effects() {
        let mut session = RefinementSession::<CounterProblem>::new();
        session.state.rounds = 3;
        let err = session.set_config(CounterConfig { cap: 0 }).unwrap_err();
        assert!(err.to_string().contains("cap"));
        assert_eq!(session.config.cap, 5);
        assert_eq!(session.state.rounds, 3);
    }

    #[test]
    fn config_change_applies_policy() {
        let mut session = RefinementSession::<CounterProblem>::new();
        session.state.rounds = 3;
        session.set_output(CounterOutput { removed: 10 });
        session.export().unwrap();

        session.update_config(|c| c.cap = 9).unwrap();

        assert_eq!(session.config.cap, 9);
        assert_eq!(session.state.rounds, 0);
        assert!(!session.has_output());
        assert_eq!(session.exports.len(), 1);
    }

    #[test]
    fn export_requires_output() {
        let mut session = RefinementSession::<CounterProblem>::new();
        let err = session.export().unwrap_err();
        assert!(err.to_string().contains("output not computed"));
    }

    #[test]
    fn export_collection() {
        let mut session = RefinementSession::<CounterProblem>::new();
        session.set_output(CounterOutput { removed: 42 });

        assert_eq!(session.export_peek().unwrap(), 42);
        assert!(session.exports.is_empty());

        session.export().unwrap();
        session.export_with_notes("after final solve").unwrap();
        assert_eq!(session.exports.len(), 2);
        assert_eq!(
            session.exports[1].notes.as_deref(),
            Some("after final solve")
        );
    }

    #[test]
    fn log_entries_recorded() {
        let mut session = RefinementSession::<CounterProblem>::new();
        session.log_success("prepare");
        session.log_halt("stage_re", "halted_point_floor");
        session.log_failure("final_solve", "diverged");

        let outcomes: Vec<_> = session.log.iter().map(|e| e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![LogOutcome::Success, LogOutcome::Halted, LogOutcome::Failure]
        );
    }

    #[test]
    fn reset_keeps_config() {
        let mut session = RefinementSession::<CounterProblem>::new();
        session.config.cap = 7;
        session.state.rounds = 2;
        session.set_output(CounterOutput { removed: 1 });
        session.log_success("prepare");

        session.reset();

        assert_eq!(session.config.cap, 7);
        assert_eq!(session.state.rounds, 0);
        assert!(!session.has_output());
        assert!(session.log.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let mut session = RefinementSession::<CounterProblem>::with_description("block A");
        session.state.rounds = 4;
        session.set_output(CounterOutput { removed: 12 });

        let json = session.to_json().unwrap();
        let restored = RefinementSession::<CounterProblem>::from_json(&json).unwrap();

        assert_eq!(restored.metadata.description.as_deref(), Some("block A"));
        assert_eq!(restored.state.rounds, 4);
        assert_eq!(restored.output().unwrap().removed, 12);
    }

    #[test]
    fn from_json_rejects_newer_schema() {
        let mut session = RefinementSession::<CounterProblem>::new();
        session.metadata.schema_version = 99;
        let json = session.to_json().unwrap();

        let err = RefinementSession::<CounterProblem>::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn from_json_rejects_foreign_problem() {
        let json = RefinementSession::<OtherProblem>::new().to_json().unwrap();
        let err = RefinementSession::<CounterProblem>::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("other"));
    }
}
