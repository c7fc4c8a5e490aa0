//! Error types for the review orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, problem specification validation, and the
//! failures an agent capability can report during a review session.

use std::path::PathBuf;
use std::time::Duration;

/// A specialized `Result` type for review orchestrator operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Errors that can occur while configuring or running a review session.
///
/// Only [`ReviewError::InvalidSpec`] and the configuration errors ever reach
/// the caller of a session; every agent-side error is captured by the
/// coordinator and reported as a terminal reason instead.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your mathreview.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// The problem specification names an unknown topic or difficulty, or a
    /// grade level outside the supported range.
    #[error("Invalid problem specification: {message}\n\nSuggestion: {suggestion}")]
    InvalidSpec {
        /// Description of the invalid field.
        message: String,
        /// Actionable suggestion for the caller.
        suggestion: String,
    },

    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// The generation capability could not produce any problem.
    #[error("Problem generation failed for {topic}/{difficulty}: {reason}")]
    GenerationFailure {
        /// Requested topic.
        topic: String,
        /// Requested difficulty.
        difficulty: String,
        /// Why no problem could be produced.
        reason: String,
    },

    /// The solving capability could not produce any candidate solution.
    ///
    /// An incorrect candidate is not a failure; it is rejected and revised.
    #[error("Solving failed: {reason}")]
    SolvingFailure {
        /// Why no candidate could be produced.
        reason: String,
    },

    /// The review capability could not produce a verdict.
    #[error("Review failed: {reason}")]
    ReviewFailure {
        /// Why no verdict could be produced.
        reason: String,
    },

    /// An agent call did not finish within its deadline.
    #[error("{agent} call '{operation}' timed out after {timeout_ms}ms")]
    AgentTimeout {
        /// Which agent timed out ("teacher" or "student").
        agent: String,
        /// The operation that was in flight.
        operation: String,
        /// The deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    // ========================================================================
    // Concurrency Errors
    // ========================================================================
    /// A spawned session task panicked or was cancelled.
    #[error("Session task failed: {message}")]
    SessionTask {
        /// Description of the join failure.
        message: String,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid session state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },
}

impl ReviewError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidSpec` error.
    #[must_use]
    pub fn invalid_spec(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `GenerationFailure`.
    #[must_use]
    pub fn generation(
        topic: impl std::fmt::Display,
        difficulty: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::GenerationFailure {
            topic: topic.to_string(),
            difficulty: difficulty.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a new `SolvingFailure`.
    #[must_use]
    pub fn solving(reason: impl Into<String>) -> Self {
        Self::SolvingFailure {
            reason: reason.into(),
        }
    }

    /// Creates a new `ReviewFailure`.
    #[must_use]
    pub fn review(reason: impl Into<String>) -> Self {
        Self::ReviewFailure {
            reason: reason.into(),
        }
    }

    /// Creates a new `AgentTimeout` error.
    #[must_use]
    pub fn agent_timeout(
        agent: impl Into<String>,
        operation: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::AgentTimeout {
            agent: agent.into(),
            operation: operation.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a new `SessionTask` error.
    #[must_use]
    pub fn session_task(message: impl Into<String>) -> Self {
        Self::SessionTask {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error originates from an agent capability.
    ///
    /// The coordinator ends a session with `agent_failure` on any error from
    /// an agent call; these are the ones agents are expected to raise.
    #[must_use]
    pub const fn is_agent_failure(&self) -> bool {
        matches!(
            self,
            Self::GenerationFailure { .. }
                | Self::SolvingFailure { .. }
                | Self::ReviewFailure { .. }
                | Self::AgentTimeout { .. }
        )
    }

    /// Returns `true` if this error is the caller's fault and retrying with
    /// the same input cannot succeed.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpec { .. }
                | Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
        )
    }
}
