//! Data model shared by the coordinator and both agents.
//!
//! Everything here is plain data: problems, solutions and verdicts are created
//! once and never mutated, so a session's history can be handed to callers
//! (and reports) as-is.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ReviewError};

/// Lowest grade level a problem can be requested for.
pub const MIN_GRADE_LEVEL: u32 = 1;

/// Highest grade level a problem can be requested for.
pub const MAX_GRADE_LEVEL: u32 = 12;

/// Relative tolerance used when comparing decimal answers.
pub const DECIMAL_RELATIVE_TOLERANCE: f64 = 0.005;

/// Absolute tolerance used when the expected decimal answer is zero.
pub const DECIMAL_ZERO_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Topic and Difficulty
// ============================================================================

/// Problem topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Signed integer arithmetic.
    Integers,
    /// One-variable linear equations.
    Equations,
    /// Word problems that resolve to a linear equation.
    WordProblem,
    /// Everyday scenarios: shopping, travel, discounts.
    RealLife,
}

impl Topic {
    /// All recognized topics, in display order.
    pub const ALL: [Self; 4] = [
        Self::Integers,
        Self::Equations,
        Self::WordProblem,
        Self::RealLife,
    ];

    /// Returns the canonical snake_case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Integers => "integers",
            Self::Equations => "equations",
            Self::WordProblem => "word_problem",
            Self::RealLife => "real_life",
        }
    }

    /// Parses a topic name case-insensitively, accepting `-` or spaces in
    /// place of `_`.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == normalized)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_case_insensitive(s).ok_or_else(|| {
            ReviewError::invalid_spec(
                format!("unsupported topic '{s}'"),
                "Use one of: integers, equations, word_problem, real_life",
            )
        })
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid topic '{s}': expected one of 'integers', 'equations', 'word_problem', 'real_life'"
            ))
        })
    }
}

impl Serialize for Topic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Problem difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    /// Single-step problems.
    Easy,
    /// Two-step problems.
    Intermediate,
    /// Multi-step problems, possibly with decimal answers.
    Hard,
}

impl Difficulty {
    /// All recognized difficulties, easiest first.
    pub const ALL: [Self; 3] = [Self::Easy, Self::Intermediate, Self::Hard];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Intermediate => "intermediate",
            Self::Hard => "hard",
        }
    }

    /// Parses a difficulty name case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "intermediate" | "medium" => Some(Self::Intermediate),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_case_insensitive(s).ok_or_else(|| {
            ReviewError::invalid_spec(
                format!("unsupported difficulty '{s}'"),
                "Use one of: easy, intermediate, hard",
            )
        })
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid difficulty '{s}': expected one of 'easy', 'intermediate', 'hard'"
            ))
        })
    }
}

impl Serialize for Difficulty {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// ProblemRequest and ProblemSpec
// ============================================================================

/// Unvalidated problem request as it arrives from a config file or CLI flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRequest {
    /// Topic name, e.g. `"equations"`.
    pub topic: String,
    /// Difficulty name, e.g. `"hard"`.
    pub difficulty: String,
    /// School grade the problem is aimed at.
    pub grade_level: u32,
}

impl ProblemRequest {
    /// Creates a new request from raw values.
    #[must_use]
    pub fn new(topic: impl Into<String>, difficulty: impl Into<String>, grade_level: u32) -> Self {
        Self {
            topic: topic.into(),
            difficulty: difficulty.into(),
            grade_level,
        }
    }
}

/// Validated input to a review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSpec {
    /// Problem topic.
    pub topic: Topic,
    /// Problem difficulty.
    pub difficulty: Difficulty,
    /// School grade the problem is aimed at.
    pub grade_level: u32,
}

impl ProblemSpec {
    /// Creates a spec from typed values.
    ///
    /// The grade level is not checked here; see [`ProblemSpec::validate`].
    #[must_use]
    pub const fn new(topic: Topic, difficulty: Difficulty, grade_level: u32) -> Self {
        Self {
            topic,
            difficulty,
            grade_level,
        }
    }

    /// Checks that the grade level lies within the supported range.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathreview_orchestrator::{Difficulty, ProblemSpec, Topic};
    ///
    /// assert!(ProblemSpec::new(Topic::Equations, Difficulty::Easy, 7).validate().is_ok());
    /// assert!(ProblemSpec::new(Topic::Equations, Difficulty::Easy, 0).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if !(MIN_GRADE_LEVEL..=MAX_GRADE_LEVEL).contains(&self.grade_level) {
            return Err(ReviewError::invalid_spec(
                format!(
                    "grade level {} is outside the supported range {MIN_GRADE_LEVEL}..={MAX_GRADE_LEVEL}",
                    self.grade_level
                ),
                format!("Request a grade level between {MIN_GRADE_LEVEL} and {MAX_GRADE_LEVEL}"),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&ProblemRequest> for ProblemSpec {
    type Error = ReviewError;

    fn try_from(request: &ProblemRequest) -> Result<Self> {
        let spec = Self {
            topic: request.topic.parse()?,
            difficulty: request.difficulty.parse()?,
            grade_level: request.grade_level,
        };
        spec.validate()?;
        Ok(spec)
    }
}

// ============================================================================
// Answer
// ============================================================================

/// A numeric answer.
///
/// Integer answers are compared exactly; decimal answers within
/// [`DECIMAL_RELATIVE_TOLERANCE`] of the expected value, or within
/// [`DECIMAL_ZERO_TOLERANCE`] when the expected value is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// Whole-number answer.
    Integer(i64),
    /// Decimal answer.
    Decimal(f64),
}

impl Answer {
    /// Builds an answer from a computed value, snapping near-whole values to
    /// [`Answer::Integer`].
    ///
    /// ```
    /// use mathreview_orchestrator::Answer;
    ///
    /// assert_eq!(Answer::from_value(4.000_000_000_1), Answer::Integer(4));
    /// assert_eq!(Answer::from_value(2.5), Answer::Decimal(2.5));
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_value(value: f64) -> Self {
        const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
        let rounded = value.round();
        if value.is_finite() && rounded.abs() < MAX_EXACT && (value - rounded).abs() < 1e-9 {
            Self::Integer(rounded as i64)
        } else {
            Self::Decimal(value)
        }
    }

    /// Returns the answer as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(n) => *n as f64,
            Self::Decimal(d) => *d,
        }
    }

    /// Returns `true` if the value has no fractional part.
    #[must_use]
    pub fn is_whole(&self) -> bool {
        match self {
            Self::Integer(_) => true,
            Self::Decimal(d) => d.is_finite() && d.fract() == 0.0,
        }
    }

    /// Returns `true` if `self`, taken as a candidate, matches `expected`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathreview_orchestrator::Answer;
    ///
    /// assert!(Answer::Integer(12).matches(&Answer::Integer(12)));
    /// assert!(Answer::Decimal(12.0).matches(&Answer::Integer(12)));
    /// assert!(!Answer::Decimal(12.01).matches(&Answer::Integer(12)));
    /// assert!(Answer::Decimal(78.54).matches(&Answer::Decimal(78.5398)));
    /// ```
    #[must_use]
    pub fn matches(&self, expected: &Self) -> bool {
        if let (Self::Integer(got), Self::Integer(want)) = (self, expected) {
            return got == want;
        }

        let candidate = self.as_f64();
        if !candidate.is_finite() {
            return false;
        }
        match expected {
            Self::Integer(_) => self.is_whole() && (candidate - expected.as_f64()).abs() < 0.5,
            Self::Decimal(want) if *want == 0.0 => candidate.abs() <= DECIMAL_ZERO_TOLERANCE,
            Self::Decimal(want) => {
                (candidate - want).abs() <= DECIMAL_RELATIVE_TOLERANCE * want.abs()
            }
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(d) => {
                let rounded = format!("{d:.2}");
                let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
                f.write_str(if trimmed == "-0" { "0" } else { trimmed })
            }
        }
    }
}

// ============================================================================
// Problem
// ============================================================================

/// Topic, difficulty and grade a problem was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemMetadata {
    /// Problem topic.
    pub topic: Topic,
    /// Problem difficulty.
    pub difficulty: Difficulty,
    /// Grade the problem targets.
    pub grade_level: u32,
}

impl From<ProblemSpec> for ProblemMetadata {
    fn from(spec: ProblemSpec) -> Self {
        Self {
            topic: spec.topic,
            difficulty: spec.difficulty,
            grade_level: spec.grade_level,
        }
    }
}

/// A generated math problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Identifier assigned by the generator.
    pub id: String,
    /// Problem statement shown to the learner.
    pub statement: String,
    /// Machine-readable expression or equation in `x` the statement encodes.
    pub formulation: String,
    /// The answer the teacher expects.
    pub expected_answer: Answer,
    /// What the problem was generated for.
    pub metadata: ProblemMetadata,
}

// ============================================================================
// Solution and Verdict
// ============================================================================

/// A candidate solution produced by the student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// The final answer.
    pub value: Answer,
    /// Step-by-step working.
    pub explanation: String,
    /// 1-based index of this solution within the session.
    pub iteration_index: u32,
}

impl Solution {
    /// Creates a new solution.
    #[must_use]
    pub fn new(value: Answer, explanation: impl Into<String>, iteration_index: u32) -> Self {
        Self {
            value,
            explanation: explanation.into(),
            iteration_index,
        }
    }
}

/// Outcome of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOutcome {
    /// The solution is correct and coherent.
    Accept,
    /// The solution needs revision.
    Reject,
}

impl fmt::Display for VerdictOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// The teacher's judgment on one solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Accept or reject.
    pub outcome: VerdictOutcome,
    /// What is wrong (on reject) or a short confirmation (on accept).
    pub feedback: String,
    /// Same index as the solution that was reviewed.
    pub iteration_index: u32,
}

impl Verdict {
    /// Creates an accepting verdict.
    #[must_use]
    pub fn accept(feedback: impl Into<String>, iteration_index: u32) -> Self {
        Self {
            outcome: VerdictOutcome::Accept,
            feedback: feedback.into(),
            iteration_index,
        }
    }

    /// Creates a rejecting verdict.
    #[must_use]
    pub fn reject(feedback: impl Into<String>, iteration_index: u32) -> Self {
        Self {
            outcome: VerdictOutcome::Reject,
            feedback: feedback.into(),
            iteration_index,
        }
    }

    /// Returns `true` if the verdict accepts the solution.
    #[must_use]
    pub const fn is_accept(&self) -> bool {
        matches!(self.outcome, VerdictOutcome::Accept)
    }
}

// ============================================================================
// IterationRecord
// ============================================================================

/// One completed Solution/Verdict pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Index shared by the solution and the verdict.
    pub iteration_index: u32,
    /// Round slot (1-based) this pair was produced in.
    ///
    /// Differs from `iteration_index` once a round has timed out.
    pub round: u32,
    /// The student's solution.
    pub solution: Solution,
    /// The teacher's verdict on it.
    pub verdict: Verdict,
    /// When the round started.
    pub started_at: DateTime<Utc>,
    /// When the round ended.
    pub ended_at: DateTime<Utc>,
}

// ============================================================================
// TerminalReason and SessionResult
// ============================================================================

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The teacher accepted a solution.
    Accepted,
    /// All rounds were used without an accepted solution.
    MaxIterationsExhausted,
    /// The total budget ran out, or the last round timed out.
    TimeBudgetExceeded,
    /// An agent capability failed outright.
    AgentFailure,
}

impl TerminalReason {
    /// All terminal reasons, in display order.
    pub const ALL: [Self; 4] = [
        Self::Accepted,
        Self::MaxIterationsExhausted,
        Self::TimeBudgetExceeded,
        Self::AgentFailure,
    ];

    /// Returns a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Accepted => "Solution accepted",
            Self::MaxIterationsExhausted => "Maximum iterations exhausted",
            Self::TimeBudgetExceeded => "Time budget exceeded",
            Self::AgentFailure => "Agent failure",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::MaxIterationsExhausted => write!(f, "max_iterations_exhausted"),
            Self::TimeBudgetExceeded => write!(f, "time_budget_exceeded"),
            Self::AgentFailure => write!(f, "agent_failure"),
        }
    }
}

/// The single output of a review session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Identifier of the session, also attached to its tracing span.
    pub session_id: Uuid,
    /// The validated input.
    pub spec: ProblemSpec,
    /// The generated problem; absent when generation failed.
    pub problem: Option<Problem>,
    /// The last solution produced, if any.
    pub final_solution: Option<Solution>,
    /// The verdict on `final_solution`, if any.
    pub final_verdict: Option<Verdict>,
    /// Number of completed Solution/Verdict pairs.
    pub iterations_used: u32,
    /// Number of round slots consumed, including timed-out rounds.
    pub rounds_attempted: u32,
    /// Monotonic time from session start to the terminal decision.
    pub elapsed_time: Duration,
    /// Why the session ended.
    pub terminal_reason: TerminalReason,
    /// Every completed pair, in order.
    pub history: Vec<IterationRecord>,
    /// Error text when the session ended with `agent_failure`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Wall-clock start, for display.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end, for display.
    pub ended_at: DateTime<Utc>,
}

impl SessionResult {
    /// Returns `true` if the session ended with an accepted solution.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.terminal_reason, TerminalReason::Accepted)
    }

    /// Returns the iteration indices recorded in the history, in order.
    #[must_use]
    pub fn history_indices(&self) -> Vec<u32> {
        self.history.iter().map(|r| r.iteration_index).collect()
    }
}
