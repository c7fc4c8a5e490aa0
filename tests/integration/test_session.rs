//! End-to-end review sessions with the rule-based engines.
//!
//! These run the full protocol: template generation, formulation solving and
//! answer-check review, under the coordinator's limits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mathreview_orchestrator::rules::{AnswerCheckReviewer, FormulationSolver, TemplateProblemSource};
use mathreview_orchestrator::{
    run_session, Config, Difficulty, Problem, ProblemRequest, ProblemSpec, ReviewCoordinator,
    ReviewError, SessionConfig, Solution, Student, StudentAgent, TeacherAgent, TerminalReason,
    Topic, VerdictOutcome,
};

type RuleTeacher = TeacherAgent<TemplateProblemSource, AnswerCheckReviewer>;
type RuleStudent = StudentAgent<FormulationSolver>;

fn teacher(seed: u64) -> RuleTeacher {
    TeacherAgent::new(TemplateProblemSource::new(seed), AnswerCheckReviewer::new())
}

fn careful_student() -> RuleStudent {
    StudentAgent::new(FormulationSolver::new())
}

fn coordinator(seed: u64, student: RuleStudent, config: SessionConfig) -> ReviewCoordinator {
    ReviewCoordinator::new(Arc::new(teacher(seed)), Arc::new(student), config)
}

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Tests that a careful student is accepted on the first round for every
/// topic and difficulty.
#[tokio::test]
async fn test_every_topic_accepted_on_first_round() {
    let teacher = teacher(17);
    let student = careful_student();
    let config = SessionConfig::default();

    for topic in Topic::ALL {
        for difficulty in Difficulty::ALL {
            let spec = ProblemSpec::new(topic, difficulty, 9);
            let result = run_session(spec, &teacher, &student, &config)
                .await
                .expect("valid spec");

            assert_eq!(
                result.terminal_reason,
                TerminalReason::Accepted,
                "{topic}/{difficulty}: {:?}",
                result.final_verdict
            );
            assert_eq!(result.iterations_used, 1);

            let problem = result.problem.as_ref().expect("problem generated");
            assert_eq!(problem.metadata.topic, topic);
            assert_eq!(problem.metadata.difficulty, difficulty);
            let solution = result.final_solution.as_ref().expect("solution recorded");
            assert!(solution.value.matches(&problem.expected_answer));
        }
    }
}

/// Tests that a student who slips on every first attempt is corrected by
/// feedback and accepted on the revision.
#[tokio::test]
async fn test_careless_student_recovers_after_feedback() {
    let coordinator = coordinator(
        5,
        StudentAgent::new(FormulationSolver::with_slips(1.0, 5)),
        SessionConfig::default(),
    );
    let specs: Vec<ProblemSpec> = Topic::ALL
        .into_iter()
        .map(|topic| ProblemSpec::new(topic, Difficulty::Intermediate, 8))
        .collect();

    let results = coordinator.run_batch(&specs).await.expect("valid specs");

    for result in &results {
        assert_eq!(result.terminal_reason, TerminalReason::Accepted);
        assert_eq!(result.iterations_used, 2);
        assert_eq!(result.history_indices(), vec![1, 2]);

        let first = &result.history[0];
        assert_eq!(first.verdict.outcome, VerdictOutcome::Reject);
        assert!(first.verdict.feedback.contains("too "), "{}", first.verdict.feedback);

        let second = &result.history[1];
        assert_ne!(second.solution.value, first.solution.value);
        assert!(second.solution.explanation.starts_with("Revisiting my previous answer"));
    }
}

/// Tests that a single allowed round leaves a careless student unaccepted.
#[tokio::test]
async fn test_single_round_exhausts_for_careless_student() {
    let coordinator = coordinator(
        5,
        StudentAgent::new(FormulationSolver::with_slips(1.0, 5)),
        SessionConfig::default().with_max_iterations(1),
    );

    let result = coordinator
        .run_session(ProblemSpec::new(Topic::Integers, Difficulty::Easy, 4))
        .await
        .expect("valid spec");

    assert_eq!(result.terminal_reason, TerminalReason::MaxIterationsExhausted);
    assert_eq!(result.iterations_used, 1);
    assert!(!result.final_verdict.expect("verdict recorded").is_accept());
}

/// Tests that a topic beyond the grade ends the session as an agent failure.
#[tokio::test]
async fn test_grade_gating_is_agent_failure() {
    let coordinator = coordinator(1, careful_student(), SessionConfig::default());

    let result = coordinator
        .run_session(ProblemSpec::new(Topic::Equations, Difficulty::Easy, 3))
        .await
        .expect("grade 3 is a valid spec");

    assert_eq!(result.terminal_reason, TerminalReason::AgentFailure);
    assert!(result.problem.is_none());
    assert_eq!(result.rounds_attempted, 0);
    assert!(result
        .failure
        .as_deref()
        .expect("failure recorded")
        .contains("below grade 6"));
}

/// Tests that unknown topics are rejected before any session starts.
#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let coordinator = coordinator(1, careful_student(), SessionConfig::default());

    let err = coordinator
        .run_request(&ProblemRequest::new("geometry", "easy", 7))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::InvalidSpec { .. }));
    assert!(err.is_caller_error());

    let err = coordinator
        .run_request(&ProblemRequest::new("integers", "easy", 13))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::InvalidSpec { .. }));
}

/// Tests that the config fixture loads and drives a session.
#[tokio::test]
async fn test_config_fixture_drives_session() {
    let config = Config::load_from_dir(&fixture_path()).expect("fixture loads");

    assert_eq!(config.max_iterations, 4);
    assert_eq!(config.session_config().per_iteration_timeout, Duration::from_secs(10));
    assert_eq!(config.seed, Some(2024));

    let spec = ProblemSpec::try_from(&config.problem_request()).expect("fixture spec is valid");
    assert_eq!(spec, ProblemSpec::new(Topic::WordProblem, Difficulty::Intermediate, 6));

    let coordinator = coordinator(
        config.seed.unwrap_or_default(),
        StudentAgent::new(FormulationSolver::with_slips(config.slip_rate, 2024)),
        config.session_config(),
    );
    let result = coordinator.run_session(spec).await.expect("valid spec");

    assert_eq!(result.terminal_reason, TerminalReason::Accepted);
    assert!(result.iterations_used <= 2);
}

/// Tests that concurrent sessions on shared agents each get their own problem.
#[tokio::test]
async fn test_concurrent_sessions_share_agents() {
    let teacher = teacher(99);
    let student = careful_student();
    let config = SessionConfig::default();
    let spec = ProblemSpec::new(Topic::RealLife, Difficulty::Hard, 10);

    let sessions = (0..8).map(|_| run_session(spec, &teacher, &student, &config));
    let results = futures::future::join_all(sessions).await;

    let mut ids: Vec<String> = results
        .into_iter()
        .map(|r| {
            let result = r.expect("valid spec");
            assert_eq!(result.terminal_reason, TerminalReason::Accepted);
            result.problem.expect("problem generated").id
        })
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

/// Tests that the same seed reproduces the same batch of problems.
#[tokio::test]
async fn test_same_seed_reproduces_problems() {
    let specs = vec![ProblemSpec::new(Topic::Equations, Difficulty::Hard, 8); 4];

    let mut runs = Vec::new();
    for _ in 0..2 {
        let results = coordinator(42, careful_student(), SessionConfig::default())
            .run_batch(&specs)
            .await
            .expect("valid specs");
        let mut statements: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.problem.map(|p| p.statement))
            .collect();
        statements.sort();
        runs.push(statements);
    }

    assert_eq!(runs[0].len(), 4);
    assert_eq!(runs[0], runs[1]);
}

/// Student that takes a fixed time before delegating.
struct Sluggish<S> {
    inner: S,
    delay: Duration,
}

#[async_trait]
impl<S: Student> Student for Sluggish<S> {
    async fn attempt(&self, problem: &Problem) -> mathreview_orchestrator::Result<Solution> {
        tokio::time::sleep(self.delay).await;
        self.inner.attempt(problem).await
    }

    async fn revise(
        &self,
        problem: &Problem,
        previous: &Solution,
        feedback: &str,
    ) -> mathreview_orchestrator::Result<Solution> {
        tokio::time::sleep(self.delay).await;
        self.inner.revise(problem, previous, feedback).await
    }
}

/// Tests that a student slower than the round deadline ends the session on
/// the time budget instead of hanging.
#[tokio::test(start_paused = true)]
async fn test_slow_student_hits_time_budget() {
    let student = Sluggish {
        inner: careful_student(),
        delay: Duration::from_secs(45),
    };
    let config = SessionConfig::default();

    let result = run_session(
        ProblemSpec::new(Topic::Integers, Difficulty::Easy, 5),
        &teacher(3),
        &student,
        &config,
    )
    .await
    .expect("valid spec");

    assert_eq!(result.terminal_reason, TerminalReason::TimeBudgetExceeded);
    assert_eq!(result.rounds_attempted, 3);
    assert_eq!(result.iterations_used, 0);
    assert!(result.problem.is_some());
}

/// Tests that a student within the deadline is unaffected by the budget.
#[tokio::test(start_paused = true)]
async fn test_student_within_deadline_is_accepted() {
    let student = Sluggish {
        inner: careful_student(),
        delay: Duration::from_secs(20),
    };

    let result = run_session(
        ProblemSpec::new(Topic::Integers, Difficulty::Easy, 5),
        &teacher(3),
        &student,
        &SessionConfig::default(),
    )
    .await
    .expect("valid spec");

    assert_eq!(result.terminal_reason, TerminalReason::Accepted);
    assert!(result.elapsed_time >= Duration::from_secs(20));
}
