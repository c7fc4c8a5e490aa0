//! Answer and coherence checks for candidate solutions.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::capability::{Assessment, ReviewEngine};
use crate::error::{Result, ReviewError};
use crate::model::{Answer, Problem, Solution};

/// Minimum number of non-empty explanation lines accepted by default.
const DEFAULT_MIN_EXPLANATION_LINES: usize = 2;

/// Final `Answer: <n>` line of an explanation, optionally in rupees.
static ANSWER_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)answer\s*[:=]\s*(?:₹\s*)?(-?\d+(?:\.\d+)?)").ok()
});

/// [`ReviewEngine`] that checks the stated value against the expected answer
/// and the explanation against the stated value.
#[derive(Debug, Clone, Copy)]
pub struct AnswerCheckReviewer {
    min_explanation_lines: usize,
}

impl Default for AnswerCheckReviewer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerCheckReviewer {
    /// Creates a reviewer with the default explanation requirements.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_explanation_lines: DEFAULT_MIN_EXPLANATION_LINES,
        }
    }

    /// Sets how many lines of working an explanation must show.
    #[must_use]
    pub const fn with_min_explanation_lines(mut self, lines: usize) -> Self {
        self.min_explanation_lines = lines;
        self
    }

    /// Checks `solution` against `problem`.
    ///
    /// Checks run in order and the first failing one decides the feedback:
    /// explanation length, explanation/answer agreement, whole-number answers,
    /// then the value itself.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ReviewFailure` if the answer pattern cannot be
    /// compiled.
    pub fn check(&self, problem: &Problem, solution: &Solution) -> Result<Assessment> {
        let steps = solution
            .explanation
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count();
        if steps < self.min_explanation_lines {
            return Ok(Assessment::reject(format!(
                "The explanation is too brief. Show at least {} steps of working.",
                self.min_explanation_lines
            )));
        }

        let Some(concluded) = concluded_answer(&solution.explanation)? else {
            return Ok(Assessment::reject(
                "The explanation does not state a final answer. End it with 'Answer: <value>'.",
            ));
        };
        // Agreement is judged at the precision answers are written with.
        if Answer::from_value(concluded).to_string() != solution.value.to_string() {
            return Ok(Assessment::reject(format!(
                "The explanation concludes {} but the stated answer is {}. Make them agree.",
                Answer::from_value(concluded),
                solution.value
            )));
        }

        let expected = problem.expected_answer;
        if matches!(expected, Answer::Integer(_)) && !solution.value.is_whole() {
            return Ok(Assessment::reject(format!(
                "The answer {} is not a whole number, but this problem has a whole-number answer.",
                solution.value
            )));
        }

        if solution.value.matches(&expected) {
            return Ok(Assessment::accept(format!(
                "Correct. {} is the right answer and the working supports it.",
                solution.value
            )));
        }

        let direction = if solution.value.as_f64() > expected.as_f64() {
            "too high"
        } else {
            "too low"
        };
        Ok(Assessment::reject(format!(
            "The answer {} is {direction}. Re-check the arithmetic in each step.",
            solution.value
        )))
    }
}

#[async_trait]
impl ReviewEngine for AnswerCheckReviewer {
    async fn assess(&self, problem: &Problem, solution: &Solution) -> Result<Assessment> {
        self.check(problem, solution)
    }
}

/// Extracts the number in the last `Answer: <n>` line of an explanation.
fn concluded_answer(explanation: &str) -> Result<Option<f64>> {
    let Some(re) = ANSWER_PATTERN.as_ref() else {
        return Err(ReviewError::review("answer pattern failed to compile"));
    };

    Ok(re
        .captures_iter(explanation)
        .filter_map(|cap| cap.get(1))
        .last()
        .and_then(|m| m.as_str().parse::<f64>().ok()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, ProblemMetadata, ProblemSpec, Topic, VerdictOutcome};

    fn problem(expected: Answer) -> Problem {
        Problem {
            id: "r".to_string(),
            statement: "Solve 2x + 3 = 11".to_string(),
            formulation: "2*x + 3 = 11".to_string(),
            expected_answer: expected,
            metadata: ProblemMetadata::from(ProblemSpec::new(Topic::Equations, Difficulty::Easy, 7)),
        }
    }

    fn solution(value: Answer, explanation: &str) -> Solution {
        Solution::new(value, explanation, 1)
    }

    fn check(expected: Answer, value: Answer, explanation: &str) -> Assessment {
        AnswerCheckReviewer::new()
            .check(&problem(expected), &solution(value, explanation))
            .unwrap()
    }

    #[test]
    fn test_accepts_correct_solution() {
        let assessment = check(Answer::Integer(4), Answer::Integer(4), "2x = 8\nAnswer: 4");
        assert_eq!(assessment.outcome, VerdictOutcome::Accept);
    }

    #[test]
    fn test_reports_too_high_and_too_low() {
        let high = check(Answer::Integer(4), Answer::Integer(6), "2x = 12\nAnswer: 6");
        assert_eq!(high.outcome, VerdictOutcome::Reject);
        assert!(high.feedback.contains("too high"));

        let low = check(Answer::Integer(4), Answer::Integer(1), "2x = 2\nAnswer: 1");
        assert!(low.feedback.contains("too low"));
    }

    #[test]
    fn test_rejects_brief_explanation() {
        let assessment = check(Answer::Integer(4), Answer::Integer(4), "Answer: 4");
        assert_eq!(assessment.outcome, VerdictOutcome::Reject);
        assert!(assessment.feedback.contains("too brief"));
    }

    #[test]
    fn test_rejects_missing_conclusion() {
        let assessment = check(Answer::Integer(4), Answer::Integer(4), "2x = 8\nso x is four");
        assert!(assessment.feedback.contains("does not state a final answer"));
    }

    #[test]
    fn test_rejects_incoherent_explanation() {
        let assessment = check(Answer::Integer(4), Answer::Integer(4), "2x = 10\nAnswer: 5");
        assert_eq!(assessment.outcome, VerdictOutcome::Reject);
        assert!(assessment.feedback.contains("concludes 5"));
    }

    #[test]
    fn test_rejects_fraction_for_whole_number_problem() {
        let assessment = check(Answer::Integer(4), Answer::Decimal(4.2), "2x = 8.4\nAnswer: 4.2");
        assert!(assessment.feedback.contains("not a whole number"));
    }

    #[test]
    fn test_decimal_tolerance() {
        let expected = Answer::Decimal(13.333_333);
        let close = check(expected, Answer::Decimal(13.33), "80 / 6\nAnswer: 13.33");
        assert_eq!(close.outcome, VerdictOutcome::Accept);

        let far = check(expected, Answer::Decimal(13.5), "81 / 6\nAnswer: 13.5");
        assert_eq!(far.outcome, VerdictOutcome::Reject);
    }

    #[test]
    fn test_small_decimal_answer_written_to_two_places() {
        let third = Answer::Decimal(1.0 / 3.0);
        let accepted = check(third, third, "1 / 3\nAnswer: 0.33");
        assert_eq!(accepted.outcome, VerdictOutcome::Accept);

        let incoherent = check(third, third, "1 / 3\nAnswer: 0.34");
        assert!(incoherent.feedback.contains("concludes 0.34"));

        let wrong = check(third, Answer::Decimal(0.4), "2 / 5\nAnswer: 0.4");
        assert!(wrong.feedback.contains("too high"));
    }

    #[test]
    fn test_last_answer_line_wins() {
        let explanation = "First guess. Answer: 3\nRechecked the division.\nAnswer: 4";
        let assessment = check(Answer::Integer(4), Answer::Integer(4), explanation);
        assert_eq!(assessment.outcome, VerdictOutcome::Accept);
    }

    #[test]
    fn test_configurable_explanation_length() {
        let reviewer = AnswerCheckReviewer::new().with_min_explanation_lines(1);
        let assessment = reviewer
            .check(&problem(Answer::Integer(4)), &solution(Answer::Integer(4), "Answer: 4"))
            .unwrap();
        assert_eq!(assessment.outcome, VerdictOutcome::Accept);
    }
}
