//! hm2eval-core: answer equivalence engine, batch driver and statistics.
//!
//! The engine grades a model's free-form answer against the reference
//! solution of a parametrized problem. Numeric, symbolic and functional
//! answers are compared mathematically after the problem's parameters have
//! been substituted. See [`evaluate_solution`] for the entry point.

pub mod batch;
pub mod binder;
pub mod checker;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod extract;
pub mod lexer;
pub mod model;
pub mod params;
pub mod parser;
pub mod rational;
pub mod report;
pub mod result;
pub mod simplify;
pub mod statistics;

pub use config::EvalConfig;
pub use engine::{
    detect_kind, evaluate_functional_solution, evaluate_numeric_solution, evaluate_solution,
    evaluate_symbolic_solution, Evaluator,
};
pub use error::{EvalError, ParseError};
pub use expr::{AnswerKind, ParsedAnswer};
pub use parser::parse_numeric_solution;
pub use result::{EvaluationResult, FailureKind};
