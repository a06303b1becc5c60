//! Engine error types.
//!
//! Every stage of the evaluation pipeline reports its own failure type. The
//! engine never lets one of these escape its public entry points: they are
//! folded into an [`EvaluationResult`](crate::result::EvaluationResult) by the
//! result reporter.

use std::fmt;

use thiserror::Error;

use crate::result::FailureKind;

/// Errors produced while turning text into an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Nothing left to parse after trimming.
    #[error("empty input")]
    EmptyInput,

    /// An opening or closing delimiter has no partner.
    #[error("unbalanced delimiters: {0}")]
    UnbalancedDelimiters(String),

    /// An identifier that is neither declared nor a known constant.
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// A numeral that does not follow the numeric grammar.
    #[error("malformed numeral '{0}'")]
    MalformedNumeral(String),

    /// A call to a function outside the elementary-function whitelist.
    #[error("disallowed function '{0}'")]
    DisallowedFunction(String),

    /// A token that cannot appear at this position.
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    /// The input ended in the middle of an expression.
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// Nesting exceeded the parser's recursion bound.
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),

    /// The input has more tokens than the parser accepts.
    #[error("expression has {tokens} tokens, limit is {limit}")]
    TooLong { tokens: usize, limit: usize },
}

/// The response extractor found nothing that looks like an answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error("no candidate answer found in response")]
    NoCandidate,

    #[error("response is empty")]
    EmptyResponse,

    /// The query layer reported an error instead of a response.
    #[error("model query failed: {0}")]
    QueryFailed(String),
}

/// Errors from parsing or resolving parameter bindings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// A `name = value` pair could not be split or its name is not an identifier.
    #[error("malformed parameter binding '{0}'")]
    MalformedPair(String),

    /// The same name is bound twice.
    #[error("parameter '{0}' is bound more than once")]
    DuplicateName(String),

    /// A parameter value failed to parse.
    #[error("value of parameter '{name}': {source}")]
    Value {
        name: String,
        #[source]
        source: ParseError,
    },

    /// The bindings were given as JSON but are not a flat object.
    #[error("invalid JSON parameters: {0}")]
    Json(String),

    /// An expression references a name that has no binding.
    #[error("unbound parameter '{0}'")]
    Unbound(String),

    /// Parameter values reference each other in a loop.
    #[error("parameter '{0}' is defined in terms of itself")]
    Cycle(String),
}

/// Points where an expression has no real value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("logarithm of non-positive value {0}")]
    LogOfNonPositive(f64),

    #[error("square root of negative value {0}")]
    SqrtOfNegative(f64),

    #[error("{function} is undefined at {value}")]
    OutOfDomain { function: &'static str, value: f64 },

    #[error("negative base {base} raised to non-integer power {exponent}")]
    NegativeBasePower { base: f64, exponent: f64 },

    #[error("result is not a finite number")]
    NonFinite,
}

/// Which input of an evaluation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Candidate,
    Reference,
    Parameters,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Candidate => write!(f, "candidate"),
            Side::Reference => write!(f, "reference"),
            Side::Parameters => write!(f, "parameters"),
        }
    }
}

/// A failure anywhere in the evaluation pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("extraction failure: {0}")]
    Extraction(#[from] ExtractError),

    #[error("parse failure ({side}): {source}")]
    Parse {
        side: Side,
        #[source]
        source: ParseError,
    },

    #[error("parameter failure: {0}")]
    Parameters(BindingError),

    #[error("unbound parameter failure ({side}): {name}")]
    Unbound { side: Side, name: String },

    #[error("domain failure ({side}): {source}")]
    Domain {
        side: Side,
        #[source]
        source: DomainError,
    },

    #[error("indeterminate equivalence: {0}")]
    Indeterminate(String),
}

impl EvalError {
    pub fn parse(side: Side, source: ParseError) -> Self {
        EvalError::Parse { side, source }
    }

    pub fn domain(side: Side, source: DomainError) -> Self {
        EvalError::Domain { side, source }
    }

    /// The failure category reported to callers.
    pub fn kind(&self) -> FailureKind {
        match self {
            EvalError::Extraction(_) => FailureKind::ExtractionFailure,
            EvalError::Parse { .. } => FailureKind::ParseFailure,
            EvalError::Parameters(BindingError::Unbound(_) | BindingError::Cycle(_)) => {
                FailureKind::UnboundParameterFailure
            }
            EvalError::Parameters(_) => FailureKind::ParseFailure,
            EvalError::Unbound { .. } => FailureKind::UnboundParameterFailure,
            EvalError::Domain { .. } => FailureKind::DomainFailure,
            EvalError::Indeterminate(_) => FailureKind::IndeterminateEquivalence,
        }
    }
}

impl From<BindingError> for EvalError {
    fn from(e: BindingError) -> Self {
        EvalError::Parameters(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds() {
        let e = EvalError::parse(Side::Candidate, ParseError::UnknownIdentifier("blah".into()));
        assert_eq!(e.kind(), FailureKind::ParseFailure);
        assert_eq!(
            e.to_string(),
            "parse failure (candidate): unknown identifier 'blah'"
        );

        let e: EvalError = BindingError::Unbound("k".into()).into();
        assert_eq!(e.kind(), FailureKind::UnboundParameterFailure);

        let e: EvalError = BindingError::DuplicateName("m".into()).into();
        assert_eq!(e.kind(), FailureKind::ParseFailure);

        let e = EvalError::domain(Side::Reference, DomainError::DivisionByZero);
        assert_eq!(e.kind(), FailureKind::DomainFailure);
        assert_eq!(e.to_string(), "domain failure (reference): division by zero");
    }

    #[test]
    fn extraction_converts() {
        let e: EvalError = ExtractError::NoCandidate.into();
        assert_eq!(e.kind(), FailureKind::ExtractionFailure);
        assert!(e.to_string().contains("no candidate answer"));
    }
}
