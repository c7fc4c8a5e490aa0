//! The teacher agent: generates problems and reviews solutions.

use async_trait::async_trait;
use tracing::debug;

use crate::capability::{ProblemSource, ReviewEngine};
use crate::error::{Result, ReviewError};
use crate::model::{Problem, ProblemSpec, Solution, Verdict, VerdictOutcome};

/// Agent-level interface the coordinator talks to.
#[async_trait]
pub trait Teacher: Send + Sync {
    /// Produces a problem consistent with `spec`.
    async fn generate(&self, spec: &ProblemSpec) -> Result<Problem>;

    /// Reviews `solution`. The verdict carries the solution's iteration index.
    async fn review(&self, problem: &Problem, solution: &Solution) -> Result<Verdict>;
}

/// A [`Teacher`] composed of a problem source and a review engine.
#[derive(Debug, Clone)]
pub struct TeacherAgent<S, R> {
    source: S,
    reviewer: R,
}

impl<S, R> TeacherAgent<S, R>
where
    S: ProblemSource,
    R: ReviewEngine,
{
    /// Creates a new teacher from its capabilities.
    pub const fn new(source: S, reviewer: R) -> Self {
        Self { source, reviewer }
    }
}

#[async_trait]
impl<S, R> Teacher for TeacherAgent<S, R>
where
    S: ProblemSource,
    R: ReviewEngine,
{
    async fn generate(&self, spec: &ProblemSpec) -> Result<Problem> {
        let problem = self.source.generate(spec).await?;

        // Problems must match the requested topic and difficulty.
        if problem.metadata.topic != spec.topic || problem.metadata.difficulty != spec.difficulty {
            return Err(ReviewError::generation(
                spec.topic,
                spec.difficulty,
                format!(
                    "source produced a {}/{} problem",
                    problem.metadata.topic, problem.metadata.difficulty
                ),
            ));
        }

        debug!(problem_id = %problem.id, "Problem generated");
        Ok(problem)
    }

    async fn review(&self, problem: &Problem, solution: &Solution) -> Result<Verdict> {
        let assessment = self.reviewer.assess(problem, solution).await?;
        let feedback = match assessment.outcome {
            VerdictOutcome::Reject if assessment.feedback.trim().is_empty() => {
                "The solution is not correct. Re-check every step.".to_string()
            }
            _ => assessment.feedback,
        };

        Ok(Verdict {
            outcome: assessment.outcome,
            feedback,
            iteration_index: solution.iteration_index,
        })
    }
}
