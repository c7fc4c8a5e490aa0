//! Markdown report generation.
//!
//! [`MarkdownGenerator`] renders a [`Report`] as a Markdown document with:
//!
//! - A summary table with counts per terminal reason
//! - One section per session with the problem and its transcript of rounds
//!
//! # Example
//!
//! ```rust
//! use mathreview_report::{MarkdownGenerator, ReportGenerator};
//!
//! let report = ReportGenerator::new("Warm-up", &[]).generate();
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("# Math Review Report: Warm-up"));
//! ```

use std::fmt::Write;

use chrono::{DateTime, Utc};
use mathreview_orchestrator::TerminalReason;

use crate::{Report, RoundEntry, SessionEntry};

/// Maximum length of feedback shown in the transcript table.
const MAX_FEEDBACK_DISPLAY_LENGTH: usize = 160;

/// Generates Markdown reports from review sessions.
pub struct MarkdownGenerator<'a> {
    report: &'a Report,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_sessions(&mut output);
        self.write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Math Review Report: {}\n",
            escape_markdown(&self.report.title)
        );
    }

    /// Writes the summary section with metrics table.
    fn write_summary(&self, output: &mut String) {
        let summary = &self.report.summary;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Sessions | {} |", summary.total_sessions);
        for reason in TerminalReason::ALL {
            let _ = writeln!(
                output,
                "| {} {} | {} |",
                reason_icon(reason),
                reason.description(),
                summary.count(reason)
            );
        }
        let _ = writeln!(
            output,
            "| Acceptance Rate | {:.1}% |",
            summary.acceptance_rate * 100.0
        );
        let _ = writeln!(
            output,
            "| Average Iterations | {:.2} |",
            summary.average_iterations
        );
        let _ = writeln!(
            output,
            "| Total Duration | {} |",
            format_duration_ms(summary.total_duration_ms)
        );
        let _ = writeln!(output);
    }

    fn write_sessions(&self, output: &mut String) {
        let _ = writeln!(output, "## Sessions\n");

        if self.report.sessions.is_empty() {
            let _ = writeln!(output, "*No sessions were run.*\n");
            return;
        }

        for (index, session) in self.report.sessions.iter().enumerate() {
            Self::write_session(output, index + 1, session);
        }
    }

    /// Writes one session: header, problem and transcript.
    fn write_session(output: &mut String, number: usize, session: &SessionEntry) {
        let reason = session.terminal_reason;
        let _ = writeln!(
            output,
            "### {} Session {number}: {} / {} / grade {}\n",
            reason_icon(reason),
            escape_markdown(&session.topic),
            escape_markdown(&session.difficulty),
            session.grade_level
        );

        let _ = writeln!(output, "**Outcome**: {}", reason.description());
        let _ = writeln!(
            output,
            "**Iterations**: {} completed in {} rounds ({})",
            session.iterations_used,
            session.rounds_attempted,
            format_duration_ms(session.duration_ms)
        );
        if let Some(statement) = &session.statement {
            let _ = writeln!(output, "**Problem**: {}", escape_markdown(statement));
        }
        if let Some(expected) = &session.expected_answer {
            let _ = writeln!(output, "**Expected Answer**: {}", escape_markdown(expected));
        }
        if let Some(answer) = &session.final_answer {
            let _ = writeln!(output, "**Final Answer**: {}", escape_markdown(answer));
        }
        if let Some(failure) = &session.failure {
            let _ = writeln!(output, "**Failure**: {}", escape_markdown(failure));
        }
        let _ = writeln!(output);

        if session.rounds.is_empty() {
            let _ = writeln!(output, "*No completed rounds.*\n");
            return;
        }

        let _ = writeln!(output, "| Iteration | Round | Answer | Verdict | Feedback |");
        let _ = writeln!(output, "|-----------|-------|--------|---------|----------|");
        for round in &session.rounds {
            Self::write_round(output, round);
        }
        let _ = writeln!(output);
    }

    fn write_round(output: &mut String, round: &RoundEntry) {
        let verdict = if round.accepted { "accept" } else { "reject" };
        let feedback = escape_markdown(&truncate(&round.feedback, MAX_FEEDBACK_DISPLAY_LENGTH));
        let _ = writeln!(
            output,
            "| #{} | {} | {} | {verdict} | {feedback} |",
            round.iteration,
            round.round,
            escape_markdown(&round.answer)
        );
    }

    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&self.report.generated_at);
        let _ = writeln!(output, "*Generated by mathreview at {timestamp}*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Formats a millisecond duration.
///
/// Examples:
/// - 450 -> "450ms"
/// - 65_000 -> "1m 5s"
/// - 3_661_000 -> "1h 1m 1s"
fn format_duration_ms(millis: u64) -> String {
    if millis < 1000 {
        return format!("{millis}ms");
    }

    let seconds = millis / 1000;
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }

    parts.join(" ")
}

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// HTML entity for the status marker of a terminal reason.
const fn reason_icon(reason: TerminalReason) -> &'static str {
    match reason {
        TerminalReason::Accepted => "&#9989;",
        TerminalReason::MaxIterationsExhausted => "&#128993;",
        TerminalReason::TimeBudgetExceeded => "&#128992;",
        TerminalReason::AgentFailure => "&#128308;",
    }
}

/// Escapes special Markdown characters in text.
///
/// Newlines become `<br>` so text stays inside table cells.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}

/// Truncates `text` to at most `max_length` bytes on a char boundary.
fn truncate(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .take_while(|(idx, c)| idx + c.len_utf8() <= max_length)
        .last()
        .map_or(0, |(idx, c)| idx + c.len_utf8());
    format!("{}...", &text[..cut])
}

// ============================================================================
// Tests
// ============================================================================
