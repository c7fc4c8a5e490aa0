//! Report generation from real review sessions.

use std::sync::Arc;

use mathreview_orchestrator::rules::{AnswerCheckReviewer, FormulationSolver, TemplateProblemSource};
use mathreview_orchestrator::{
    Difficulty, ProblemSpec, ReviewCoordinator, SessionConfig, SessionResult, StudentAgent,
    TeacherAgent, TerminalReason, Topic,
};
use mathreview_report::{json::JsonGenerator, MarkdownGenerator, Report, ReportGenerator};

/// Runs a mixed batch: three careless sessions and one beyond the grade.
async fn mixed_batch() -> Vec<SessionResult> {
    let teacher = TeacherAgent::new(TemplateProblemSource::new(8), AnswerCheckReviewer::new());
    let student = StudentAgent::new(FormulationSolver::with_slips(1.0, 8));
    let coordinator =
        ReviewCoordinator::new(Arc::new(teacher), Arc::new(student), SessionConfig::default());

    let specs = vec![
        ProblemSpec::new(Topic::Integers, Difficulty::Easy, 5),
        ProblemSpec::new(Topic::Equations, Difficulty::Intermediate, 7),
        ProblemSpec::new(Topic::RealLife, Difficulty::Easy, 6),
        ProblemSpec::new(Topic::WordProblem, Difficulty::Easy, 2),
    ];
    coordinator.run_batch(&specs).await.expect("valid specs")
}

/// Tests that the summary reflects the batch outcomes.
#[tokio::test]
async fn test_report_summary_from_batch() {
    let results = mixed_batch().await;
    let report = ReportGenerator::new("Mixed batch", &results).generate();

    assert_eq!(report.summary.total_sessions, 4);
    assert_eq!(report.summary.count(TerminalReason::Accepted), 3);
    assert_eq!(report.summary.count(TerminalReason::AgentFailure), 1);
    assert!((report.summary.acceptance_rate - 0.75).abs() < 1e-9);
    assert!((report.summary.average_iterations - 1.5).abs() < 1e-9);
    assert!(!report.all_accepted());

    let failed: Vec<_> = report.sessions_with(TerminalReason::AgentFailure).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].topic, "word_problem");
    assert!(failed[0].statement.is_none());
}

/// Tests that the Markdown report carries every session's transcript.
#[tokio::test]
async fn test_markdown_report_generation() {
    let results = mixed_batch().await;
    let report = ReportGenerator::new("Mixed batch", &results).generate();
    let markdown = MarkdownGenerator::new(&report).generate();

    assert!(markdown.starts_with("# Math Review Report: Mixed batch"));
    assert!(markdown.contains("| Sessions | 4 |"));
    assert!(markdown.contains("| Acceptance Rate | 75.0% |"));
    for number in 1..=4 {
        assert!(markdown.contains(&format!("Session {number}:")));
    }
    assert_eq!(markdown.matches("| reject |").count(), 3);
    assert_eq!(markdown.matches("| accept |").count(), 3);
    assert!(markdown.contains("below grade 3"));
}

/// Tests that the JSON report round-trips and keeps session order.
#[tokio::test]
async fn test_json_report_roundtrip() {
    let results = mixed_batch().await;
    let report = ReportGenerator::new("Mixed batch", &results).generate();

    let json = JsonGenerator::new(&report).generate_pretty().expect("serializes");
    let parsed: Report = serde_json::from_str(&json).expect("parses");

    assert_eq!(parsed.sessions, report.sessions);
    let topics: Vec<&str> = parsed.sessions.iter().map(|s| s.topic.as_str()).collect();
    assert_eq!(topics, ["integers", "equations", "real_life", "word_problem"]);

    let value: serde_json::Value = serde_json::from_str(&json).expect("parses");
    assert_eq!(value["sessions"][0]["terminal_reason"], "accepted");
    assert_eq!(value["sessions"][3]["terminal_reason"], "agent_failure");
}

/// Tests that both reports can be written to disk.
#[tokio::test]
async fn test_reports_written_to_directory() {
    let results = mixed_batch().await;
    let report = ReportGenerator::new("Mixed batch", &results).generate();

    let dir = std::env::temp_dir().join(format!("mathreview-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");

    let json_path = dir.join("mathreview-report.json");
    JsonGenerator::new(&report)
        .write_to_file(&json_path, true)
        .expect("writes json");
    let md_path = dir.join("mathreview-report.md");
    std::fs::write(&md_path, MarkdownGenerator::new(&report).generate()).expect("writes md");

    let written: Report =
        serde_json::from_str(&std::fs::read_to_string(&json_path).expect("reads json"))
            .expect("parses");
    assert_eq!(written.summary, report.summary);
    assert!(std::fs::read_to_string(&md_path)
        .expect("reads md")
        .contains("Mixed batch"));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}
