//! Capability traits the agents are built from.
//!
//! A capability is the opaque "intelligence" behind an agent: the rule-based
//! engines in [`crate::rules`] implement these traits, and so would an LLM
//! backend. Capabilities carry no per-session state, so one instance can serve
//! any number of concurrent sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Answer, Problem, ProblemSpec, Solution, VerdictOutcome};

/// What a solving capability produces: an answer and the working behind it.
///
/// The student agent turns a candidate into a [`Solution`] by assigning the
/// iteration index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Proposed answer.
    pub value: Answer,
    /// Step-by-step working.
    pub explanation: String,
}

impl Candidate {
    /// Creates a new candidate.
    #[must_use]
    pub fn new(value: Answer, explanation: impl Into<String>) -> Self {
        Self {
            value,
            explanation: explanation.into(),
        }
    }
}

/// The previous attempt and the teacher's feedback on it.
#[derive(Debug, Clone, Copy)]
pub struct Revision<'a> {
    /// The solution that was rejected.
    pub previous: &'a Solution,
    /// Why it was rejected.
    pub feedback: &'a str,
}

/// What a review capability produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Accept or reject.
    pub outcome: VerdictOutcome,
    /// Rationale; on reject, what is wrong.
    pub feedback: String,
}

impl Assessment {
    /// Creates an accepting assessment.
    #[must_use]
    pub fn accept(feedback: impl Into<String>) -> Self {
        Self {
            outcome: VerdictOutcome::Accept,
            feedback: feedback.into(),
        }
    }

    /// Creates a rejecting assessment.
    #[must_use]
    pub fn reject(feedback: impl Into<String>) -> Self {
        Self {
            outcome: VerdictOutcome::Reject,
            feedback: feedback.into(),
        }
    }
}

/// Produces a problem for a specification.
#[async_trait]
pub trait ProblemSource: Send + Sync {
    /// Generates a problem.
    ///
    /// Fails with `ReviewError::GenerationFailure` when no problem can be
    /// produced for the topic/difficulty/grade combination.
    async fn generate(&self, spec: &ProblemSpec) -> Result<Problem>;
}

/// Produces candidate solutions.
#[async_trait]
pub trait SolutionEngine: Send + Sync {
    /// Solves `problem`, optionally revising an earlier attempt.
    ///
    /// Fails with `ReviewError::SolvingFailure` only when no candidate at all
    /// can be produced.
    async fn solve(&self, problem: &Problem, revision: Option<Revision<'_>>) -> Result<Candidate>;
}

/// Judges candidate solutions.
#[async_trait]
pub trait ReviewEngine: Send + Sync {
    /// Assesses `solution` against `problem`.
    async fn assess(&self, problem: &Problem, solution: &Solution) -> Result<Assessment>;
}
