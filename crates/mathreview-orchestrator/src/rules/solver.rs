//! Deterministic solver working from a problem's formulation.

use async_trait::async_trait;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::capability::{Candidate, Revision, SolutionEngine};
use crate::error::{Result, ReviewError};
use crate::model::{Answer, Problem};
use crate::rules::expr::{self, Formulation};

/// [`SolutionEngine`] that parses `Problem::formulation` and solves it.
///
/// With a non-zero slip rate, first attempts occasionally carry an arithmetic
/// slip, the way a careless learner's would. Revisions are always derived
/// carefully.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulationSolver {
    slip_rate: f64,
    seed: u64,
}

impl FormulationSolver {
    /// Creates a solver that never slips.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slip_rate: 0.0,
            seed: 0,
        }
    }

    /// Creates a solver that slips on a first attempt with probability
    /// `slip_rate` (clamped to `0.0..=1.0`).
    #[must_use]
    pub fn with_slips(slip_rate: f64, seed: u64) -> Self {
        Self {
            slip_rate: slip_rate.clamp(0.0, 1.0),
            seed,
        }
    }

    /// Solves `problem`, revising `revision` if given.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::SolvingFailure` if the formulation cannot be
    /// parsed, is not linear, or has no unique solution.
    pub fn solve_problem(&self, problem: &Problem, revision: Option<Revision<'_>>) -> Result<Candidate> {
        let formulation = expr::parse(&problem.formulation).map_err(|e| {
            ReviewError::solving(format!("cannot read '{}': {e}", problem.formulation))
        })?;
        let exact = formulation.solve().map_err(|e| {
            ReviewError::solving(format!("cannot solve '{}': {e}", problem.formulation))
        })?;

        let mut lines = Vec::new();
        if let Some(revision) = revision {
            lines.push(format!(
                "Revisiting my previous answer of {}. Feedback: {}",
                revision.previous.value,
                revision.feedback.trim()
            ));
        }
        lines.extend(working(&problem.formulation, &formulation));

        let mut value = Answer::from_value(exact);
        match revision {
            Some(revision) => {
                if wants_whole_number(revision.feedback) && !value.is_whole() {
                    let rounded = Answer::from_value(value.as_f64().round());
                    lines.push(format!("Round {value} to the nearest whole number: {rounded}"));
                    value = rounded;
                }
            }
            None => {
                if let Some(slip) = self.slip(problem, exact) {
                    value = Answer::from_value(exact + slip);
                }
            }
        }

        lines.push(result_line(&formulation, value));
        lines.push(format!("Answer: {value}"));

        Ok(Candidate::new(value, lines.join("\n")))
    }

    /// Returns the offset of a slip on this problem, if one happens.
    ///
    /// The offset grows with the answer so it always falls outside the
    /// decimal answer tolerance.
    fn slip(&self, problem: &Problem, exact: f64) -> Option<f64> {
        if self.slip_rate <= 0.0 {
            return None;
        }

        let stream = problem
            .id
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        let mut rng = ChaCha8Rng::seed_from_u64(stream);

        if rng.random::<f64>() >= self.slip_rate {
            return None;
        }
        let scale = 1.0 + (exact.abs() / 100.0).floor();
        let magnitude = f64::from(rng.random_range(1..=3_u8)) * scale;
        Some(if rng.random::<bool>() { magnitude } else { -magnitude })
    }
}

#[async_trait]
impl SolutionEngine for FormulationSolver {
    async fn solve(&self, problem: &Problem, revision: Option<Revision<'_>>) -> Result<Candidate> {
        self.solve_problem(problem, revision)
    }
}

fn wants_whole_number(feedback: &str) -> bool {
    let feedback = feedback.to_lowercase();
    feedback.contains("whole number") || feedback.contains("integer")
}

/// The setup steps before the final value.
fn working(source: &str, formulation: &Formulation) -> Vec<String> {
    match formulation.collected() {
        None => vec![format!("Write the calculation: {}", source.trim())],
        Some((a, b)) => vec![
            format!("Write the equation: {}", source.trim()),
            format!(
                "Collect the x terms on the left and the numbers on the right: {}x = {}",
                Answer::from_value(a),
                Answer::from_value(b)
            ),
        ],
    }
}

fn result_line(formulation: &Formulation, value: Answer) -> String {
    match formulation.collected() {
        None => format!("Work through the operations in order to get {value}"),
        Some((a, _)) => format!(
            "Divide both sides by {}: x = {value}",
            Answer::from_value(a)
        ),
    }
}
