//! Configuration types for the review orchestrator.
//!
//! [`SessionConfig`] carries the limits of a single session and is passed
//! explicitly to the coordinator, so sessions with different budgets can run
//! side by side. [`Config`] is the on-disk `mathreview.json` shape the CLI
//! loads and converts into a [`SessionConfig`] and a [`ProblemRequest`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ReviewError};
use crate::model::ProblemRequest;

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "mathreview.json";

/// Default maximum Student/Teacher rounds per session.
const fn default_max_iterations() -> u32 {
    3
}

/// Default per-round timeout in seconds.
const fn default_per_iteration_timeout() -> u64 {
    30
}

/// Default total session budget in seconds.
const fn default_total_time_budget() -> u64 {
    120
}

/// Default topic for generated problems.
fn default_topic() -> String {
    "equations".to_string()
}

/// Default difficulty for generated problems.
fn default_difficulty() -> String {
    "intermediate".to_string()
}

/// Default grade level for generated problems.
const fn default_grade_level() -> u32 {
    7
}

/// Default output directory for reports.
fn default_output_dir() -> String {
    ".".to_string()
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Limits that bound one review session.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use mathreview_orchestrator::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_max_iterations(5)
///     .with_per_iteration_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_iterations, 5);
/// assert_eq!(config.total_time_budget, Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum number of rounds, timed-out rounds included.
    pub max_iterations: u32,
    /// Deadline for one round (student call plus teacher review), and for
    /// problem generation.
    pub per_iteration_timeout: Duration,
    /// Budget for the whole session, checked between rounds.
    pub total_time_budget: Duration,
    /// Cancel an in-flight round as soon as the total budget runs out instead
    /// of letting it run to its own deadline.
    pub hard_budget_cancel: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            per_iteration_timeout: Duration::from_secs(default_per_iteration_timeout()),
            total_time_budget: Duration::from_secs(default_total_time_budget()),
            hard_budget_cancel: false,
        }
    }
}

impl SessionConfig {
    /// Sets the maximum number of rounds.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the per-round deadline.
    #[must_use]
    pub const fn with_per_iteration_timeout(mut self, timeout: Duration) -> Self {
        self.per_iteration_timeout = timeout;
        self
    }

    /// Sets the total session budget.
    #[must_use]
    pub const fn with_total_time_budget(mut self, budget: Duration) -> Self {
        self.total_time_budget = budget;
        self
    }

    /// Enables or disables hard cancellation at the total budget.
    #[must_use]
    pub const fn with_hard_budget_cancel(mut self, enabled: bool) -> Self {
        self.hard_budget_cancel = enabled;
        self
    }

    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ConfigValidationError` if any limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ReviewError::config_validation(
                "maxIterations must be greater than 0",
                "Set maxIterations to at least 1",
            ));
        }

        if self.per_iteration_timeout.is_zero() {
            return Err(ReviewError::config_validation(
                "perIterationTimeout must be greater than 0",
                "Set perIterationTimeout to at least 1 second",
            ));
        }

        if self.total_time_budget.is_zero() {
            return Err(ReviewError::config_validation(
                "totalTimeBudget must be greater than 0",
                "Set totalTimeBudget to at least 1 second",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Config
// ============================================================================

/// On-disk configuration for the `mathreview` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Maximum Student/Teacher rounds per session.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Per-round timeout in seconds.
    #[serde(default = "default_per_iteration_timeout")]
    pub per_iteration_timeout: u64,

    /// Total session budget in seconds.
    #[serde(default = "default_total_time_budget")]
    pub total_time_budget: u64,

    /// Cancel in-flight rounds once the total budget is spent.
    #[serde(default)]
    pub hard_budget_cancel: bool,

    /// Topic of the generated problems.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Difficulty of the generated problems.
    #[serde(default = "default_difficulty")]
    pub difficulty: String,

    /// Grade level of the generated problems.
    #[serde(default = "default_grade_level")]
    pub grade_level: u32,

    /// Seed for the rule-based problem generator. Random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Probability that the rule-based student slips on a first attempt.
    #[serde(default)]
    pub slip_rate: f64,

    /// Output directory for generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            per_iteration_timeout: default_per_iteration_timeout(),
            total_time_budget: default_total_time_budget(),
            hard_budget_cancel: false,
            topic: default_topic(),
            difficulty: default_difficulty(),
            grade_level: default_grade_level(),
            seed: None,
            slip_rate: 0.0,
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `mathreview.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ReviewError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `mathreview.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `ReviewError::ConfigValidationError` if the values
    /// are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ReviewError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ReviewError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// Topic, difficulty and grade level are not checked here; they are
    /// validated as a problem specification when a session starts.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        self.session_config().validate()?;

        if !(0.0..=1.0).contains(&self.slip_rate) {
            return Err(ReviewError::config_validation(
                format!("slipRate must be between 0 and 1, got {}", self.slip_rate),
                "Set slipRate to a probability such as 0.25 in your mathreview.json",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(ReviewError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your mathreview.json (use '.' for current directory)",
            ));
        }

        Ok(())
    }

    /// Returns the session limits described by this configuration.
    #[must_use]
    pub const fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_iterations: self.max_iterations,
            per_iteration_timeout: Duration::from_secs(self.per_iteration_timeout),
            total_time_budget: Duration::from_secs(self.total_time_budget),
            hard_budget_cancel: self.hard_budget_cancel,
        }
    }

    /// Returns the (unvalidated) problem request described by this configuration.
    #[must_use]
    pub fn problem_request(&self) -> ProblemRequest {
        ProblemRequest::new(&self.topic, &self.difficulty, self.grade_level)
    }
}
