//! JSON report generation.
//!
//! [`JsonGenerator`] serializes a [`Report`] as compact single-line JSON or
//! pretty-printed for human readability.
//!
//! # Example
//!
//! ```rust
//! use mathreview_report::{json::JsonGenerator, ReportGenerator};
//!
//! let report = ReportGenerator::new("Warm-up", &[]).generate();
//! let generator = JsonGenerator::new(&report);
//!
//! let compact = generator.generate().unwrap();
//! assert!(!compact.contains('\n'));
//!
//! let pretty = generator.generate_pretty().unwrap();
//! assert!(pretty.contains("\"total_sessions\": 0"));
//!
//! // generator.write_to_file(Path::new("mathreview-report.json"), true).unwrap();
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{Report, ReportError, Result};

/// JSON report generator.
pub struct JsonGenerator<'a> {
    report: &'a Report,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates compact JSON output (single line, no extra whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.report).map_err(ReportError::from)
    }

    /// Generates pretty-printed JSON output with indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(ReportError::from)
    }

    /// Writes the JSON report to `path`, creating or overwriting it.
    ///
    /// Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    /// Returns [`ReportError::Io`] if file creation or writing fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::{accepted_result, failed_result};
    use crate::ReportGenerator;

    fn sample_report() -> Report {
        ReportGenerator::new("Grade 7 practice", &[accepted_result(), failed_result()]).generate()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("mathreview-report-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_generate_compact_json() {
        let report = sample_report();
        let json = JsonGenerator::new(&report).generate().unwrap();

        assert!(!json.contains('\n'));
        assert!(json.contains(r#""title":"Grade 7 practice""#));
        assert!(json.contains(r#""terminal_reason":"accepted""#));
        assert!(json.contains(r#""terminal_reason":"agent_failure""#));
    }

    #[test]
    fn test_generate_pretty_json() {
        let report = sample_report();
        let json = JsonGenerator::new(&report).generate_pretty().unwrap();

        assert!(json.contains('\n'));
        assert!(json.contains(r#""total_sessions": 2"#));
        assert!(json.contains(r#""accepted": 1"#));
    }

    #[test]
    fn test_json_contains_transcript() {
        let report = sample_report();
        let value: serde_json::Value =
            serde_json::from_str(&JsonGenerator::new(&report).generate().unwrap()).unwrap();

        let rounds = &value["sessions"][0]["rounds"];
        assert_eq!(rounds.as_array().unwrap().len(), 2);
        assert_eq!(rounds[0]["accepted"], false);
        assert_eq!(rounds[1]["feedback"], "Correct. 4 is the right answer.");
        assert!(value["sessions"][1]["statement"].is_null());
    }

    #[test]
    fn test_json_roundtrip() {
        let report = sample_report();
        let json = JsonGenerator::new(&report).generate_pretty().unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.title, report.title);
        assert_eq!(parsed.summary, report.summary);
        assert_eq!(parsed.sessions, report.sessions);
    }

    #[test]
    fn test_write_to_file() {
        let report = sample_report();
        let path = temp_path("pretty.json");

        JsonGenerator::new(&report).write_to_file(&path, true).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Grade 7 practice"));
        assert!(written.contains('\n'));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_to_file_invalid_path() {
        let report = sample_report();
        let path = Path::new("/nonexistent/directory/mathreview-report.json");

        let err = JsonGenerator::new(&report).write_to_file(path, true).unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
