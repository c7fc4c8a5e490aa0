//! Rule-based capabilities.
//!
//! These let the whole protocol run without a model backend: problems come
//! from seeded templates, solutions from parsing the problem's formulation,
//! and reviews from comparing answers.

pub mod expr;
pub mod generator;
pub mod reviewer;
pub mod solver;

pub use generator::TemplateProblemSource;
pub use reviewer::AnswerCheckReviewer;
pub use solver::FormulationSolver;
