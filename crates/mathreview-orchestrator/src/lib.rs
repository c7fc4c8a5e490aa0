//! Math Review Orchestrator
//!
//! Runs bounded Teacher/Student review sessions over grade-appropriate math
//! problems: the teacher generates and reviews, the student attempts and
//! revises, and the coordinator enforces iteration and time limits.

pub mod capability;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod rules;
pub mod session_state;
pub mod student;
pub mod teacher;

pub use capability::{Assessment, Candidate, ProblemSource, ReviewEngine, Revision, SolutionEngine};
pub use config::{Config, SessionConfig, CONFIG_FILE_NAME};
pub use coordinator::{run_session, ReviewCoordinator};
pub use error::{Result, ReviewError};
pub use model::{
    Answer, Difficulty, IterationRecord, Problem, ProblemMetadata, ProblemRequest, ProblemSpec,
    SessionResult, Solution, TerminalReason, Topic, Verdict, VerdictOutcome,
    DECIMAL_RELATIVE_TOLERANCE, DECIMAL_ZERO_TOLERANCE, MAX_GRADE_LEVEL, MIN_GRADE_LEVEL,
};
pub use session_state::{SessionState, SessionStatus};
pub use student::{Student, StudentAgent};
pub use teacher::{Teacher, TeacherAgent};
