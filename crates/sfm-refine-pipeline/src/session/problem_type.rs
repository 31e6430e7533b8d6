//! Problem type trait for refinement sessions.
//!
//! Defines the interface a refinement problem implements to work with
//! [`RefinementSession`](super::RefinementSession).

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// What to clear from a session when its configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationPolicy {
    /// Clear the problem-specific state (controller memo, stage reports).
    pub clear_state: bool,
    /// Clear the final output.
    pub clear_output: bool,
    /// Clear the exports collection.
    pub clear_exports: bool,
}

impl InvalidationPolicy {
    /// Clear nothing.
    pub const KEEP_ALL: Self = Self {
        clear_state: false,
        clear_output: false,
        clear_exports: false,
    };

    /// Clear state and output but keep exports.
    pub const CLEAR_COMPUTED: Self = Self {
        clear_state: true,
        clear_output: true,
        clear_exports: false,
    };

    /// Clear everything.
    pub const CLEAR_ALL: Self = Self {
        clear_state: true,
        clear_output: true,
        clear_exports: true,
    };
}

impl Default for InvalidationPolicy {
    fn default() -> Self {
        Self::KEEP_ALL
    }
}

/// Interface of a refinement problem.
///
/// The reconstruction itself is never part of the session: it is owned by
/// the host and handed to each step function as `&mut R`. A problem type
/// therefore only describes the controller's own data.
///
/// # Associated Types
///
/// - **Config**: thresholds, ratios, masks and caps
/// - **State**: scalar controller state between steps
/// - **Output**: final workflow result
/// - **Export**: user-facing result (may be the same as Output)
pub trait ProblemType: Sized + 'static {
    type Config: Clone + Default + Serialize + DeserializeOwned + Debug;

    type State: Clone + Default + Serialize + DeserializeOwned + Debug;

    type Output: Clone + Serialize + DeserializeOwned + Debug;

    type Export: Clone + Serialize + DeserializeOwned + Debug;

    /// Stable snake_case identifier, stored in session metadata.
    fn name() -> &'static str;

    /// Schema version of the serialized session.
    ///
    /// Sessions with a newer version than this are rejected on load.
    fn schema_version() -> u32 {
        1
    }

    /// Validate a configuration before it is stored.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid option.
    fn validate_config(_config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Invalidation applied by `set_config`.
    fn on_config_change() -> InvalidationPolicy {
        InvalidationPolicy::KEEP_ALL
    }

    /// Convert the output to its export form.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion fails.
    fn export(output: &Self::Output, config: &Self::Config) -> Result<Self::Export>;
}
