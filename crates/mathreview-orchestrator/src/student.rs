//! The student agent: attempts and revises solutions.

use async_trait::async_trait;
use tracing::debug;

use crate::capability::{Candidate, Revision, SolutionEngine};
use crate::error::{Result, ReviewError};
use crate::model::{Problem, Solution};

/// Agent-level interface the coordinator talks to.
#[async_trait]
pub trait Student: Send + Sync {
    /// First attempt at `problem`; the solution has iteration index 1.
    async fn attempt(&self, problem: &Problem) -> Result<Solution>;

    /// Revises `previous` in light of `feedback`.
    ///
    /// Returns a new solution with index `previous.iteration_index + 1`;
    /// `previous` is left untouched.
    async fn revise(&self, problem: &Problem, previous: &Solution, feedback: &str)
        -> Result<Solution>;
}

/// A [`Student`] backed by a solving capability.
#[derive(Debug, Clone)]
pub struct StudentAgent<E> {
    engine: E,
}

impl<E: SolutionEngine> StudentAgent<E> {
    /// Creates a new student from its capability.
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }
}

/// Turns a candidate into a solution, refusing candidates with no usable value.
fn into_solution(candidate: Candidate, iteration_index: u32) -> Result<Solution> {
    if !candidate.value.as_f64().is_finite() {
        return Err(ReviewError::solving(format!(
            "engine produced a non-finite answer for iteration {iteration_index}"
        )));
    }
    Ok(Solution::new(candidate.value, candidate.explanation, iteration_index))
}

#[async_trait]
impl<E: SolutionEngine> Student for StudentAgent<E> {
    async fn attempt(&self, problem: &Problem) -> Result<Solution> {
        let candidate = self.engine.solve(problem, None).await?;
        debug!(problem_id = %problem.id, value = %candidate.value, "Attempt produced");
        into_solution(candidate, 1)
    }

    async fn revise(
        &self,
        problem: &Problem,
        previous: &Solution,
        feedback: &str,
    ) -> Result<Solution> {
        let revision = Revision { previous, feedback };
        let candidate = self.engine.solve(problem, Some(revision)).await?;
        debug!(
            problem_id = %problem.id,
            previous = %previous.value,
            value = %candidate.value,
            "Revision produced"
        );
        into_solution(candidate, previous.iteration_index + 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Answer, Difficulty, ProblemMetadata, ProblemSpec, Topic};

    /// Answers with the previous value plus one, or 10 on a first attempt.
    struct Counting;

    #[async_trait]
    impl SolutionEngine for Counting {
        async fn solve(&self, _problem: &Problem, revision: Option<Revision<'_>>) -> Result<Candidate> {
            let value = revision.map_or(10.0, |r| r.previous.value.as_f64() + 1.0);
            Ok(Candidate::new(Answer::Decimal(value), format!("Answer: {value}")))
        }
    }

    struct Broken;

    #[async_trait]
    impl SolutionEngine for Broken {
        async fn solve(&self, _problem: &Problem, _revision: Option<Revision<'_>>) -> Result<Candidate> {
            Ok(Candidate::new(Answer::Decimal(f64::NAN), "???"))
        }
    }

    fn problem() -> Problem {
        Problem {
            id: "p".to_string(),
            statement: "What is 5 + 5?".to_string(),
            formulation: "5 + 5".to_string(),
            expected_answer: Answer::Integer(10),
            metadata: ProblemMetadata::from(ProblemSpec::new(Topic::Integers, Difficulty::Easy, 3)),
        }
    }

    #[tokio::test]
    async fn test_attempt_has_index_one() {
        let student = StudentAgent::new(Counting);
        let solution = student.attempt(&problem()).await.unwrap();
        assert_eq!(solution.iteration_index, 1);
        assert_eq!(solution.value, Answer::Decimal(10.0));
    }

    #[tokio::test]
    async fn test_revise_increments_index_and_keeps_previous() {
        let student = StudentAgent::new(Counting);
        let previous = Solution::new(Answer::Decimal(10.0), "Answer: 10", 2);
        let revised = student.revise(&problem(), &previous, "too low").await.unwrap();

        assert_eq!(revised.iteration_index, 3);
        assert_eq!(revised.value, Answer::Decimal(11.0));
        assert_eq!(previous.iteration_index, 2);
    }

    #[test]
    fn test_agent_runs_outside_a_runtime() {
        let student = StudentAgent::new(Counting);
        let solution = tokio_test::block_on(student.attempt(&problem())).unwrap();
        assert_eq!(solution.iteration_index, 1);
    }

    #[tokio::test]
    async fn test_non_finite_candidate_is_solving_failure() {
        let student = StudentAgent::new(Broken);
        let err = student.attempt(&problem()).await.unwrap_err();
        assert!(matches!(err, ReviewError::SolvingFailure { .. }));
    }
}
