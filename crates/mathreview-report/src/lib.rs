//! Math Review Report Generation
//!
//! Turns the [`SessionResult`]s of one or more review sessions into a
//! [`Report`], which can be serialized to JSON for programmatic access or
//! rendered to Markdown for human review.
//!
//! # Types
//!
//! - [`Report`] - The complete report: title, summary and one entry per session
//! - [`ReportSummary`] - Counts per terminal reason and aggregate metrics
//! - [`SessionEntry`] - One session with its transcript of rounds
//! - [`RoundEntry`] - One Solution/Verdict pair
//!
//! # Generators
//!
//! - [`ReportGenerator`] - Builds a [`Report`] from session results
//! - [`json::JsonGenerator`] - Compact or pretty JSON
//! - [`MarkdownGenerator`] - Human-readable Markdown
//!
//! # Example
//!
//! ```rust
//! use mathreview_report::{json::JsonGenerator, MarkdownGenerator, ReportGenerator};
//!
//! let report = ReportGenerator::new("Grade 7 equations", &[]).generate();
//! assert_eq!(report.summary.total_sessions, 0);
//!
//! let json = JsonGenerator::new(&report).generate_pretty().unwrap();
//! assert!(json.contains("Grade 7 equations"));
//!
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.starts_with("# Math Review Report"));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use mathreview_orchestrator::{IterationRecord, SessionResult, TerminalReason};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Report
// ============================================================================

/// Complete report over a batch of review sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Report title.
    pub title: String,

    /// When the report was generated.
    pub generated_at: DateTime<Utc>,

    /// Aggregate metrics.
    pub summary: ReportSummary,

    /// One entry per session, in run order.
    pub sessions: Vec<SessionEntry>,
}

impl Report {
    /// Returns `true` if every session ended with an accepted solution.
    ///
    /// An empty report counts as not accepted.
    #[must_use]
    pub fn all_accepted(&self) -> bool {
        !self.sessions.is_empty() && self.sessions.iter().all(SessionEntry::is_accepted)
    }

    /// Returns the sessions that ended for `reason`.
    pub fn sessions_with(&self, reason: TerminalReason) -> impl Iterator<Item = &SessionEntry> {
        self.sessions
            .iter()
            .filter(move |s| s.terminal_reason == reason)
    }
}

// ============================================================================
// ReportSummary
// ============================================================================

/// Aggregate metrics over all sessions in a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of sessions.
    pub total_sessions: usize,

    /// Sessions that ended with an accepted solution.
    pub accepted: usize,

    /// Sessions that used every round without an accept.
    pub max_iterations_exhausted: usize,

    /// Sessions stopped by the time budget.
    pub time_budget_exceeded: usize,

    /// Sessions ended by an agent failure.
    pub agent_failure: usize,

    /// Fraction of sessions accepted, `0.0` for an empty report.
    pub acceptance_rate: f64,

    /// Mean completed pairs per session.
    pub average_iterations: f64,

    /// Sum of session durations in milliseconds.
    pub total_duration_ms: u64,
}

impl ReportSummary {
    /// Computes the summary of `sessions`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_sessions(sessions: &[SessionEntry]) -> Self {
        let mut summary = Self {
            total_sessions: sessions.len(),
            ..Self::default()
        };

        let mut iterations = 0_u64;
        for session in sessions {
            match session.terminal_reason {
                TerminalReason::Accepted => summary.accepted += 1,
                TerminalReason::MaxIterationsExhausted => summary.max_iterations_exhausted += 1,
                TerminalReason::TimeBudgetExceeded => summary.time_budget_exceeded += 1,
                TerminalReason::AgentFailure => summary.agent_failure += 1,
            }
            iterations += u64::from(session.iterations_used);
            summary.total_duration_ms = summary.total_duration_ms.saturating_add(session.duration_ms);
        }

        if !sessions.is_empty() {
            let total = sessions.len() as f64;
            summary.acceptance_rate = summary.accepted as f64 / total;
            summary.average_iterations = iterations as f64 / total;
        }

        summary
    }

    /// Returns the number of sessions that ended for `reason`.
    #[must_use]
    pub const fn count(&self, reason: TerminalReason) -> usize {
        match reason {
            TerminalReason::Accepted => self.accepted,
            TerminalReason::MaxIterationsExhausted => self.max_iterations_exhausted,
            TerminalReason::TimeBudgetExceeded => self.time_budget_exceeded,
            TerminalReason::AgentFailure => self.agent_failure,
        }
    }
}

// ============================================================================
// SessionEntry
// ============================================================================

/// One review session as it appears in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Session identifier.
    pub session_id: String,

    /// Requested topic.
    pub topic: String,

    /// Requested difficulty.
    pub difficulty: String,

    /// Requested grade level.
    pub grade_level: u32,

    /// Problem statement, absent when generation failed.
    pub statement: Option<String>,

    /// The teacher's expected answer.
    pub expected_answer: Option<String>,

    /// The last answer the student gave.
    pub final_answer: Option<String>,

    /// Why the session ended.
    pub terminal_reason: TerminalReason,

    /// Completed Solution/Verdict pairs.
    pub iterations_used: u32,

    /// Round slots consumed, timed-out rounds included.
    pub rounds_attempted: u32,

    /// Session duration in milliseconds.
    pub duration_ms: u64,

    /// Error text for agent failures.
    pub failure: Option<String>,

    /// Transcript of completed rounds.
    pub rounds: Vec<RoundEntry>,
}

impl SessionEntry {
    /// Returns `true` if the session ended with an accepted solution.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.terminal_reason == TerminalReason::Accepted
    }
}

impl From<&SessionResult> for SessionEntry {
    fn from(result: &SessionResult) -> Self {
        Self {
            session_id: result.session_id.to_string(),
            topic: result.spec.topic.to_string(),
            difficulty: result.spec.difficulty.to_string(),
            grade_level: result.spec.grade_level,
            statement: result.problem.as_ref().map(|p| p.statement.clone()),
            expected_answer: result.problem.as_ref().map(|p| p.expected_answer.to_string()),
            final_answer: result.final_solution.as_ref().map(|s| s.value.to_string()),
            terminal_reason: result.terminal_reason,
            iterations_used: result.iterations_used,
            rounds_attempted: result.rounds_attempted,
            duration_ms: u64::try_from(result.elapsed_time.as_millis()).unwrap_or(u64::MAX),
            failure: result.failure.clone(),
            rounds: result.history.iter().map(RoundEntry::from).collect(),
        }
    }
}

// ============================================================================
// RoundEntry
// ============================================================================

/// One Solution/Verdict pair in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEntry {
    /// Solution index (1-based, no gaps).
    pub iteration: u32,

    /// Round slot the pair was produced in.
    pub round: u32,

    /// The student's answer.
    pub answer: String,

    /// The student's working.
    pub explanation: String,

    /// Whether the teacher accepted it.
    pub accepted: bool,

    /// The teacher's feedback.
    pub feedback: String,
}

impl From<&IterationRecord> for RoundEntry {
    fn from(record: &IterationRecord) -> Self {
        Self {
            iteration: record.iteration_index,
            round: record.round,
            answer: record.solution.value.to_string(),
            explanation: record.solution.explanation.clone(),
            accepted: record.verdict.is_accept(),
            feedback: record.verdict.feedback.clone(),
        }
    }
}

// ============================================================================
// ReportGenerator
// ============================================================================

/// Builds a [`Report`] from session results.
#[derive(Debug, Clone, Copy)]
pub struct ReportGenerator<'a> {
    title: &'a str,
    results: &'a [SessionResult],
}

impl<'a> ReportGenerator<'a> {
    /// Creates a generator over `results`.
    #[must_use]
    pub const fn new(title: &'a str, results: &'a [SessionResult]) -> Self {
        Self { title, results }
    }

    /// Generates the report.
    #[must_use]
    pub fn generate(&self) -> Report {
        let sessions: Vec<SessionEntry> = self.results.iter().map(SessionEntry::from).collect();
        Report {
            title: self.title.to_string(),
            generated_at: Utc::now(),
            summary: ReportSummary::from_sessions(&sessions),
            sessions,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
