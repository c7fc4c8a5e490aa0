//! Session state for a single review session.
//!
//! The coordinator owns one [`SessionState`] per session. It tracks the
//! protocol phase, round counters and the history of completed pairs, and is
//! consumed into the final [`SessionResult`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ReviewError};
use crate::model::{IterationRecord, Problem, ProblemSpec, SessionResult, TerminalReason};

// ============================================================================
// SessionStatus
// ============================================================================

/// Phase of a review session.
///
/// The status transitions through these states:
/// - `Starting` -> `Generating`
/// - `Generating` -> `Solving` (problem ready) or a terminal state
/// - `Solving` -> `Reviewing`, or `Solving` again after a timed-out round
/// - `Reviewing` -> `Solving` (rejected, rounds remain) or a terminal state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, nothing called yet.
    #[default]
    Starting,
    /// Waiting for the teacher to generate the problem.
    Generating,
    /// Waiting for the student to attempt or revise.
    Solving,
    /// Waiting for the teacher to review.
    Reviewing,
    /// A solution was accepted.
    Accepted,
    /// Every round was used.
    MaxIterationsExhausted,
    /// The time budget ran out.
    TimeBudgetExceeded,
    /// An agent failed outright.
    AgentFailure,
}

impl SessionStatus {
    /// Returns `true` if this status represents a terminal state.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathreview_orchestrator::SessionStatus;
    ///
    /// assert!(SessionStatus::Accepted.is_terminal());
    /// assert!(SessionStatus::AgentFailure.is_terminal());
    /// assert!(!SessionStatus::Reviewing.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.terminal_reason().is_some()
    }

    /// Returns the terminal reason this status stands for, if any.
    #[must_use]
    pub const fn terminal_reason(&self) -> Option<TerminalReason> {
        match self {
            Self::Accepted => Some(TerminalReason::Accepted),
            Self::MaxIterationsExhausted => Some(TerminalReason::MaxIterationsExhausted),
            Self::TimeBudgetExceeded => Some(TerminalReason::TimeBudgetExceeded),
            Self::AgentFailure => Some(TerminalReason::AgentFailure),
            Self::Starting | Self::Generating | Self::Solving | Self::Reviewing => None,
        }
    }

    /// Returns `true` if the protocol allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Starting => matches!(next, Self::Generating),
            Self::Generating => matches!(
                next,
                Self::Solving | Self::TimeBudgetExceeded | Self::AgentFailure
            ),
            Self::Solving => matches!(
                next,
                Self::Reviewing | Self::Solving | Self::TimeBudgetExceeded | Self::AgentFailure
            ),
            Self::Reviewing => matches!(
                next,
                Self::Solving
                    | Self::Accepted
                    | Self::MaxIterationsExhausted
                    | Self::TimeBudgetExceeded
                    | Self::AgentFailure
            ),
            Self::Accepted
            | Self::MaxIterationsExhausted
            | Self::TimeBudgetExceeded
            | Self::AgentFailure => false,
        }
    }
}

impl From<TerminalReason> for SessionStatus {
    fn from(reason: TerminalReason) -> Self {
        match reason {
            TerminalReason::Accepted => Self::Accepted,
            TerminalReason::MaxIterationsExhausted => Self::MaxIterationsExhausted,
            TerminalReason::TimeBudgetExceeded => Self::TimeBudgetExceeded,
            TerminalReason::AgentFailure => Self::AgentFailure,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Generating => "generating",
            Self::Solving => "solving",
            Self::Reviewing => "reviewing",
            Self::Accepted => "accepted",
            Self::MaxIterationsExhausted => "max_iterations_exhausted",
            Self::TimeBudgetExceeded => "time_budget_exceeded",
            Self::AgentFailure => "agent_failure",
        };
        f.write_str(s)
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Mutable state of one session, owned by the coordinator.
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: Uuid,
    spec: ProblemSpec,
    status: SessionStatus,
    problem: Option<Problem>,
    history: Vec<IterationRecord>,
    rounds_attempted: u32,
    failure: Option<String>,
    started_at: DateTime<Utc>,
}

impl SessionState {
    /// Creates a new state in the `Starting` status with a fresh session id.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathreview_orchestrator::{Difficulty, ProblemSpec, SessionState, SessionStatus, Topic};
    ///
    /// let state = SessionState::new(ProblemSpec::new(Topic::Integers, Difficulty::Easy, 4));
    /// assert_eq!(state.status(), SessionStatus::Starting);
    /// assert_eq!(state.rounds_attempted(), 0);
    /// assert_eq!(state.next_iteration_index(), 1);
    /// ```
    #[must_use]
    pub fn new(spec: ProblemSpec) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            spec,
            status: SessionStatus::Starting,
            problem: None,
            history: Vec::new(),
            rounds_attempted: 0,
            failure: None,
            started_at: Utc::now(),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns the number of round slots consumed so far.
    #[must_use]
    pub const fn rounds_attempted(&self) -> u32 {
        self.rounds_attempted
    }

    /// Returns the completed pairs so far.
    #[must_use]
    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Returns the most recent completed pair.
    #[must_use]
    pub fn last_record(&self) -> Option<&IterationRecord> {
        self.history.last()
    }

    /// Returns the index the next solution must carry.
    #[must_use]
    pub fn next_iteration_index(&self) -> u32 {
        u32::try_from(self.history.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidStateTransition` if the protocol does not
    /// allow the move.
    pub fn transition(&mut self, next: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ReviewError::invalid_transition(self.status, next));
        }
        self.status = next;
        Ok(())
    }

    /// Stores the generated problem.
    pub fn set_problem(&mut self, problem: Problem) {
        self.problem = Some(problem);
    }

    /// Consumes the next round slot and moves to `Solving`.
    ///
    /// Returns the 1-based round number.
    pub fn begin_round(&mut self) -> Result<u32> {
        self.transition(SessionStatus::Solving)?;
        self.rounds_attempted += 1;
        Ok(self.rounds_attempted)
    }

    /// Appends a completed pair.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidStateTransition` if the record's index
    /// does not continue the history.
    pub fn record(&mut self, record: IterationRecord) -> Result<()> {
        let expected = self.next_iteration_index();
        if record.iteration_index != expected
            || record.solution.iteration_index != expected
            || record.verdict.iteration_index != expected
        {
            return Err(ReviewError::invalid_transition(
                format!("iteration {}", expected - 1),
                format!("iteration {}", record.iteration_index),
            ));
        }
        self.history.push(record);
        Ok(())
    }

    /// Records why an agent failed.
    pub fn set_failure(&mut self, failure: impl Into<String>) {
        self.failure = Some(failure.into());
    }

    /// Ends the session and produces its result.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidStateTransition` if the current status
    /// cannot end with `reason`, or if `reason` is `Accepted` but the last
    /// verdict is not an accept.
    pub fn finish(mut self, reason: TerminalReason, elapsed: Duration) -> Result<SessionResult> {
        self.transition(SessionStatus::from(reason))?;

        let last = self.history.last();
        if reason == TerminalReason::Accepted && !last.is_some_and(|r| r.verdict.is_accept()) {
            return Err(ReviewError::invalid_transition(
                "a session without an accepted verdict",
                reason,
            ));
        }
        let final_solution = last.map(|r| r.solution.clone());
        let final_verdict = last.map(|r| r.verdict.clone());

        Ok(SessionResult {
            session_id: self.session_id,
            spec: self.spec,
            problem: self.problem,
            final_solution,
            final_verdict,
            iterations_used: u32::try_from(self.history.len()).unwrap_or(u32::MAX),
            rounds_attempted: self.rounds_attempted,
            elapsed_time: elapsed,
            terminal_reason: reason,
            history: self.history,
            failure: self.failure,
            started_at: self.started_at,
            ended_at: Utc::now(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Answer, Difficulty, Solution, Topic, Verdict};

    fn spec() -> ProblemSpec {
        ProblemSpec::new(Topic::Equations, Difficulty::Intermediate, 7)
    }

    fn record(index: u32, round: u32, accept: bool) -> IterationRecord {
        let verdict = if accept {
            Verdict::accept("Correct.", index)
        } else {
            Verdict::reject("Too low.", index)
        };
        IterationRecord {
            iteration_index: index,
            round,
            solution: Solution::new(Answer::Integer(i64::from(index)), "x = 1\nAnswer: 1", index),
            verdict,
            started_at: Utc::now(),
            ended_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(SessionStatus::Accepted.is_terminal());
        assert!(SessionStatus::MaxIterationsExhausted.is_terminal());
        assert!(SessionStatus::TimeBudgetExceeded.is_terminal());
        assert!(SessionStatus::AgentFailure.is_terminal());

        assert!(!SessionStatus::Starting.is_terminal());
        assert!(!SessionStatus::Generating.is_terminal());
        assert!(!SessionStatus::Solving.is_terminal());
        assert!(!SessionStatus::Reviewing.is_terminal());
    }

    #[test]
    fn test_terminal_reason_round_trips_through_status() {
        for reason in TerminalReason::ALL {
            assert_eq!(SessionStatus::from(reason).terminal_reason(), Some(reason));
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Reviewing).unwrap(),
            r#""reviewing""#
        );
        assert_eq!(SessionStatus::TimeBudgetExceeded.to_string(), "time_budget_exceeded");
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut state = SessionState::new(spec());
        let err = state.transition(SessionStatus::Solving).unwrap_err();
        assert!(matches!(
            err,
            ReviewError::InvalidStateTransition { ref from, ref to } if from == "starting" && to == "solving"
        ));

        state.transition(SessionStatus::Generating).unwrap();
        assert!(state.transition(SessionStatus::Accepted).is_err());
        assert!(state.transition(SessionStatus::MaxIterationsExhausted).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for status in [
            SessionStatus::Accepted,
            SessionStatus::MaxIterationsExhausted,
            SessionStatus::TimeBudgetExceeded,
            SessionStatus::AgentFailure,
        ] {
            assert!(!status.can_transition_to(SessionStatus::Solving));
            assert!(!status.can_transition_to(SessionStatus::AgentFailure));
        }
    }

    #[test]
    fn test_rounds_and_history() {
        let mut state = SessionState::new(spec());
        state.transition(SessionStatus::Generating).unwrap();

        assert_eq!(state.begin_round().unwrap(), 1);
        // Round 1 timed out; round 2 starts from Solving.
        assert_eq!(state.begin_round().unwrap(), 2);
        state.transition(SessionStatus::Reviewing).unwrap();
        state.record(record(1, 2, false)).unwrap();

        assert_eq!(state.rounds_attempted(), 2);
        assert_eq!(state.next_iteration_index(), 2);
        assert_eq!(state.last_record().unwrap().round, 2);
    }

    #[test]
    fn test_record_rejects_index_gap() {
        let mut state = SessionState::new(spec());
        let err = state.record(record(2, 1, false)).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidStateTransition { .. }));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_finish_builds_result() {
        let mut state = SessionState::new(spec());
        state.transition(SessionStatus::Generating).unwrap();
        state.begin_round().unwrap();
        state.transition(SessionStatus::Reviewing).unwrap();
        state.record(record(1, 1, false)).unwrap();
        state.begin_round().unwrap();
        state.transition(SessionStatus::Reviewing).unwrap();
        state.record(record(2, 2, true)).unwrap();

        let result = state
            .finish(TerminalReason::Accepted, Duration::from_secs(3))
            .unwrap();
        assert!(result.is_accepted());
        assert_eq!(result.iterations_used, 2);
        assert_eq!(result.rounds_attempted, 2);
        assert_eq!(result.history_indices(), vec![1, 2]);
        assert_eq!(result.final_solution.unwrap().iteration_index, 2);
        assert!(result.final_verdict.unwrap().is_accept());
        assert_eq!(result.elapsed_time, Duration::from_secs(3));
    }

    #[test]
    fn test_finish_accepted_requires_accept_verdict() {
        let mut state = SessionState::new(spec());
        state.transition(SessionStatus::Generating).unwrap();
        state.begin_round().unwrap();
        state.transition(SessionStatus::Reviewing).unwrap();
        state.record(record(1, 1, false)).unwrap();

        assert!(state.finish(TerminalReason::Accepted, Duration::ZERO).is_err());
    }

    #[test]
    fn test_finish_with_failure_keeps_text() {
        let mut state = SessionState::new(spec());
        state.transition(SessionStatus::Generating).unwrap();
        state.set_failure("teacher call 'generate' timed out after 30000ms");

        let result = state
            .finish(TerminalReason::AgentFailure, Duration::from_secs(30))
            .unwrap();
        assert_eq!(result.terminal_reason, TerminalReason::AgentFailure);
        assert!(result.problem.is_none());
        assert!(result.final_solution.is_none());
        assert_eq!(result.failure.as_deref(), Some("teacher call 'generate' timed out after 30000ms"));
    }
}
