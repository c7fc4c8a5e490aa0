//! The review coordinator.
//!
//! Drives one bounded exchange per session: the teacher generates a problem,
//! then the student attempts (and revises) while the teacher reviews, until a
//! solution is accepted or a limit is hit. Every agent call runs under a
//! deadline and every outcome, including agent failures, ends up in the
//! returned [`SessionResult`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mathreview_orchestrator::rules::{AnswerCheckReviewer, FormulationSolver, TemplateProblemSource};
//! use mathreview_orchestrator::{
//!     Difficulty, ProblemSpec, ReviewCoordinator, SessionConfig, StudentAgent, TeacherAgent, Topic,
//! };
//!
//! # async fn example() -> mathreview_orchestrator::Result<()> {
//! let teacher = TeacherAgent::new(TemplateProblemSource::new(7), AnswerCheckReviewer::new());
//! let student = StudentAgent::new(FormulationSolver::new());
//! let coordinator = ReviewCoordinator::new(Arc::new(teacher), Arc::new(student), SessionConfig::default());
//!
//! let result = coordinator
//!     .run_session(ProblemSpec::new(Topic::Equations, Difficulty::Hard, 8))
//!     .await?;
//! println!("{}", result.terminal_reason);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::SessionConfig;
use crate::error::{Result, ReviewError};
use crate::model::{
    IterationRecord, Problem, ProblemRequest, ProblemSpec, SessionResult, Solution,
    TerminalReason, Verdict,
};
use crate::session_state::{SessionState, SessionStatus};
use crate::student::Student;
use crate::teacher::Teacher;

/// The agent call a round is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Attempt,
    Revise,
    Review,
}

impl Pending {
    const fn agent(self) -> &'static str {
        match self {
            Self::Attempt | Self::Revise => "student",
            Self::Review => "teacher",
        }
    }

    const fn operation(self) -> &'static str {
        match self {
            Self::Attempt => "attempt",
            Self::Revise => "revise",
            Self::Review => "review",
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runs one review session.
///
/// The spec and config are validated before any agent is called; those are
/// the only errors a caller sees. Agent failures and timeouts are reported
/// through [`SessionResult::terminal_reason`].
///
/// # Errors
///
/// Returns `ReviewError::InvalidSpec` for an out-of-range grade level and
/// `ReviewError::ConfigValidationError` for zero limits.
pub async fn run_session(
    spec: ProblemSpec,
    teacher: &dyn Teacher,
    student: &dyn Student,
    config: &SessionConfig,
) -> Result<SessionResult> {
    spec.validate()?;
    config.validate()?;

    let state = SessionState::new(spec);
    let span = info_span!(
        "review_session",
        session_id = %state.session_id(),
        topic = %spec.topic,
        difficulty = %spec.difficulty,
        grade = spec.grade_level,
    );

    drive(state, spec, teacher, student, config)
        .instrument(span)
        .await
}

#[allow(clippy::too_many_lines)]
async fn drive(
    mut state: SessionState,
    spec: ProblemSpec,
    teacher: &dyn Teacher,
    student: &dyn Student,
    config: &SessionConfig,
) -> Result<SessionResult> {
    let clock = Instant::now();

    state.transition(SessionStatus::Generating)?;
    info!("Generating problem");
    let problem = match timeout(config.per_iteration_timeout, teacher.generate(&spec)).await {
        Ok(Ok(problem)) => problem,
        Ok(Err(e)) => {
            warn!(error = %e, "Problem generation failed");
            return fail(state, &e, clock);
        }
        Err(_) => {
            let e = ReviewError::agent_timeout("teacher", "generate", config.per_iteration_timeout);
            warn!(error = %e, "Problem generation timed out");
            return fail(state, &e, clock);
        }
    };
    info!(problem_id = %problem.id, "Problem ready");
    state.set_problem(problem.clone());

    for _ in 0..config.max_iterations {
        let elapsed = clock.elapsed();
        if elapsed >= config.total_time_budget {
            info!(
                elapsed_ms = millis(elapsed),
                rounds = state.rounds_attempted(),
                "Total time budget exhausted"
            );
            return finish(state, TerminalReason::TimeBudgetExceeded, clock);
        }

        let remaining = config.total_time_budget.saturating_sub(elapsed);
        let budget_bound = config.hard_budget_cancel && remaining < config.per_iteration_timeout;
        let deadline = if budget_bound {
            remaining
        } else {
            config.per_iteration_timeout
        };

        let round = state.begin_round()?;
        let started_at = Utc::now();
        let mut pending = Pending::Attempt;
        debug!(round, deadline_ms = millis(deadline), "Round started");

        let outcome = timeout(
            deadline,
            play_round(&problem, state.last_record(), teacher, student, &mut pending),
        )
        .await;

        match outcome {
            Ok(Ok((solution, verdict))) => {
                if let Err(e) = check_indices(&state, &solution, &verdict) {
                    warn!(round, error = %e, "Agent broke the iteration sequence");
                    return fail(state, &e, clock);
                }
                state.transition(SessionStatus::Reviewing)?;

                let accepted = verdict.is_accept();
                info!(
                    round,
                    iteration = solution.iteration_index,
                    value = %solution.value,
                    outcome = %verdict.outcome,
                    "Round complete"
                );
                if !accepted {
                    debug!(round, feedback = %verdict.feedback, "Solution rejected");
                }

                state.record(IterationRecord {
                    iteration_index: solution.iteration_index,
                    round,
                    solution,
                    verdict,
                    started_at,
                    ended_at: Utc::now(),
                })?;

                if accepted {
                    return finish(state, TerminalReason::Accepted, clock);
                }
            }
            Ok(Err(e)) => {
                warn!(
                    round,
                    call = pending.operation(),
                    expected = e.is_agent_failure(),
                    error = %e,
                    "Agent call failed"
                );
                return fail(state, &e, clock);
            }
            Err(_) => {
                let e = ReviewError::agent_timeout(pending.agent(), pending.operation(), deadline);
                warn!(round, budget_bound, error = %e, "Round timed out");
                if pending == Pending::Review {
                    state.transition(SessionStatus::Reviewing)?;
                }
                if budget_bound || round >= config.max_iterations {
                    return finish(state, TerminalReason::TimeBudgetExceeded, clock);
                }
            }
        }
    }

    // A rejected final round that overran the budget reports the overrun.
    let reason = if clock.elapsed() > config.total_time_budget {
        TerminalReason::TimeBudgetExceeded
    } else {
        TerminalReason::MaxIterationsExhausted
    };
    finish(state, reason, clock)
}

/// Student call, then teacher review. `pending` tracks which call is in
/// flight so a timeout can be attributed.
async fn play_round(
    problem: &Problem,
    previous: Option<&IterationRecord>,
    teacher: &dyn Teacher,
    student: &dyn Student,
    pending: &mut Pending,
) -> Result<(Solution, Verdict)> {
    let solution = match previous {
        None => {
            *pending = Pending::Attempt;
            student.attempt(problem).await?
        }
        Some(previous) => {
            *pending = Pending::Revise;
            student
                .revise(problem, &previous.solution, &previous.verdict.feedback)
                .await?
        }
    };

    *pending = Pending::Review;
    let verdict = teacher.review(problem, &solution).await?;
    Ok((solution, verdict))
}

/// Agents must continue the index sequence; the coordinator does not renumber.
fn check_indices(state: &SessionState, solution: &Solution, verdict: &Verdict) -> Result<()> {
    let expected = state.next_iteration_index();
    if solution.iteration_index != expected {
        return Err(ReviewError::solving(format!(
            "student returned iteration index {}, expected {expected}",
            solution.iteration_index
        )));
    }
    if verdict.iteration_index != solution.iteration_index {
        return Err(ReviewError::review(format!(
            "teacher returned iteration index {} for solution {}",
            verdict.iteration_index, solution.iteration_index
        )));
    }
    Ok(())
}

fn fail(mut state: SessionState, error: &ReviewError, clock: Instant) -> Result<SessionResult> {
    state.set_failure(error.to_string());
    finish(state, TerminalReason::AgentFailure, clock)
}

fn finish(state: SessionState, reason: TerminalReason, clock: Instant) -> Result<SessionResult> {
    let elapsed = clock.elapsed();
    let result = state.finish(reason, elapsed)?;
    info!(
        terminal_reason = %reason,
        iterations_used = result.iterations_used,
        rounds_attempted = result.rounds_attempted,
        elapsed_ms = millis(elapsed),
        "Session finished"
    );
    Ok(result)
}

// ============================================================================
// ReviewCoordinator
// ============================================================================

/// Shares one teacher and one student across any number of sessions.
#[derive(Clone)]
pub struct ReviewCoordinator {
    teacher: Arc<dyn Teacher>,
    student: Arc<dyn Student>,
    config: SessionConfig,
}

impl std::fmt::Debug for ReviewCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReviewCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(teacher: Arc<dyn Teacher>, student: Arc<dyn Student>, config: SessionConfig) -> Self {
        Self {
            teacher,
            student,
            config,
        }
    }

    /// Returns the session limits.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs one session for a validated spec.
    pub async fn run_session(&self, spec: ProblemSpec) -> Result<SessionResult> {
        run_session(spec, self.teacher.as_ref(), self.student.as_ref(), &self.config).await
    }

    /// Validates a raw request and runs one session for it.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidSpec` for an unknown topic or difficulty
    /// or an out-of-range grade, before any agent is called.
    pub async fn run_request(&self, request: &ProblemRequest) -> Result<SessionResult> {
        let spec = ProblemSpec::try_from(request)?;
        self.run_session(spec).await
    }

    /// Runs one session per spec concurrently and returns the results in
    /// input order.
    ///
    /// # Errors
    ///
    /// Fails before spawning anything if any spec or the config is invalid,
    /// and with `ReviewError::SessionTask` if a session task panics.
    pub async fn run_batch(&self, specs: &[ProblemSpec]) -> Result<Vec<SessionResult>> {
        self.config.validate()?;
        for spec in specs {
            spec.validate()?;
        }

        let mut tasks = JoinSet::new();
        for (index, spec) in specs.iter().copied().enumerate() {
            let teacher = Arc::clone(&self.teacher);
            let student = Arc::clone(&self.student);
            let config = self.config;
            tasks.spawn(async move {
                let result = run_session(spec, teacher.as_ref(), student.as_ref(), &config).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<SessionResult>> = specs.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| ReviewError::session_task(e.to_string()))?;
            if let Some(slot) = results.get_mut(index) {
                *slot = Some(result?);
            }
        }

        info!(sessions = specs.len(), "Batch finished");
        Ok(results.into_iter().flatten().collect())
    }
}
