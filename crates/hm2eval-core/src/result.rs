//! The outcome of a single evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// The pipeline stage an unsuccessful evaluation stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFailure,
    ParseFailure,
    UnboundParameterFailure,
    DomainFailure,
    IndeterminateEquivalence,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::ExtractionFailure,
        FailureKind::ParseFailure,
        FailureKind::UnboundParameterFailure,
        FailureKind::DomainFailure,
        FailureKind::IndeterminateEquivalence,
    ];
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ExtractionFailure => "extraction_failure",
            FailureKind::ParseFailure => "parse_failure",
            FailureKind::UnboundParameterFailure => "unbound_parameter_failure",
            FailureKind::DomainFailure => "domain_failure",
            FailureKind::IndeterminateEquivalence => "indeterminate_equivalence",
        };
        write!(f, "{s}")
    }
}

/// Result of evaluating one `(response, solution, parameters)` triple.
///
/// `success` is false exactly when `is_equivalent` is `None` and an error
/// message is present. The two constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    success: bool,
    is_equivalent: Option<bool>,
    error_message: Option<String>,
    failure: Option<FailureKind>,
}

impl EvaluationResult {
    /// Both answers were understood and compared.
    pub fn equivalence(equivalent: bool) -> Self {
        Self {
            success: true,
            is_equivalent: Some(equivalent),
            error_message: None,
            failure: None,
        }
    }

    /// The pipeline stopped before a decision.
    pub fn failure(error: &EvalError) -> Self {
        Self {
            success: false,
            is_equivalent: None,
            error_message: Some(error.to_string()),
            failure: Some(error.kind()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn is_equivalent(&self) -> Option<bool> {
        self.is_equivalent
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }
}

impl From<Result<bool, EvalError>> for EvaluationResult {
    fn from(outcome: Result<bool, EvalError>) -> Self {
        match outcome {
            Ok(equivalent) => Self::equivalence(equivalent),
            Err(e) => Self::failure(&e),
        }
    }
}
