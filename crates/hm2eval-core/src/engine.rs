//! The answer equivalence engine.
//!
//! One pipeline serves all three answer kinds:
//! extract the candidate from the response, resolve the parameters, parse
//! the reference and the candidate, bind parameters into both, and compare
//! under the rule of the answer kind. Every failure along the way is folded
//! into the returned [`EvaluationResult`].

use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::binder::{bind, BoundAnswer};
use crate::checker::{check_functional, check_numeric, check_symbolic};
use crate::config::EvalConfig;
use crate::error::{EvalError, Side};
use crate::expr::{AnswerKind, FunctionalAnswer, ParsedAnswer};
use crate::extract::extract_answer;
use crate::params::{Bindings, ResolvedBindings};
use crate::parser::{
    detect_function_header, parse_answer, parse_numeric_solution, Scope,
};
use crate::result::EvaluationResult;

/// Evaluates responses against reference solutions under one policy.
///
/// Holds no mutable state; share it freely across threads.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate with the answer kind detected from the reference.
    pub fn evaluate_solution(
        &self,
        response: &str,
        solution: &str,
        parameters: &str,
    ) -> EvaluationResult {
        self.evaluate(None, response, solution, parameters)
    }

    pub fn evaluate_numeric_solution(
        &self,
        response: &str,
        solution: &str,
        parameters: &str,
    ) -> EvaluationResult {
        self.evaluate(Some(AnswerKind::Numeric), response, solution, parameters)
    }

    pub fn evaluate_symbolic_solution(
        &self,
        response: &str,
        solution: &str,
        parameters: &str,
    ) -> EvaluationResult {
        self.evaluate(Some(AnswerKind::Symbolic), response, solution, parameters)
    }

    pub fn evaluate_functional_solution(
        &self,
        response: &str,
        solution: &str,
        parameters: &str,
    ) -> EvaluationResult {
        self.evaluate(Some(AnswerKind::Functional), response, solution, parameters)
    }

    /// Evaluate one triple. `kind` forces the comparison rule; `None`
    /// detects it from the reference.
    pub fn evaluate(
        &self,
        kind: Option<AnswerKind>,
        response: &str,
        solution: &str,
        parameters: &str,
    ) -> EvaluationResult {
        let outcome = self.run(kind, response, solution, parameters);
        if let Err(e) = &outcome {
            tracing::debug!(kind = %e.kind(), "evaluation failed: {e}");
        }
        outcome.into()
    }

    fn run(
        &self,
        kind: Option<AnswerKind>,
        response: &str,
        solution: &str,
        parameters: &str,
    ) -> Result<bool, EvalError> {
        let extraction = extract_answer(response, &self.config.extraction)?;
        let bindings = Bindings::parse(parameters)?.resolve()?;
        let kind = kind.unwrap_or_else(|| detect_kind(solution, &bindings));
        tracing::debug!(%kind, parameters = bindings.len(), "evaluating");

        let reference = parse_reference(solution, kind, &bindings)?;
        let variables = match &reference {
            ParsedAnswer::Functional(f) => f.variables.clone(),
            _ => Vec::new(),
        };

        let mut declared: BTreeSet<String> = bindings.names().map(str::to_string).collect();
        declared.extend(variables.iter().cloned());
        declared.extend(reference.symbols());
        let candidate_scope = Scope::strict(declared);
        let candidate = parse_answer(&extraction.text, kind, &candidate_scope, &variables)
            .map_err(|e| EvalError::parse(Side::Candidate, e))?;

        let candidate = match align_variables(candidate, &variables) {
            Some(candidate) => candidate,
            None => {
                tracing::debug!("candidate function takes a different number of variables");
                return Ok(false);
            }
        };

        let reference = bind(&reference, &bindings, Side::Reference)?;
        let candidate = bind(&candidate, &bindings, Side::Candidate)?;
        compare(kind, &candidate, &reference, &self.config)
    }
}

fn compare(
    kind: AnswerKind,
    candidate: &BoundAnswer,
    reference: &BoundAnswer,
    config: &EvalConfig,
) -> Result<bool, EvalError> {
    match kind {
        AnswerKind::Numeric => check_numeric(candidate, reference, &config.tolerance),
        AnswerKind::Symbolic => {
            check_symbolic(candidate, reference, &config.simplify, &config.tolerance)
        }
        AnswerKind::Functional => {
            check_functional(candidate, reference, &config.sampling, &config.tolerance)
        }
    }
}

/// Parse the reference permissively: names that are neither parameters nor
/// variables stay symbols and are reported as unbound by the binder.
fn parse_reference(
    solution: &str,
    kind: AnswerKind,
    bindings: &ResolvedBindings,
) -> Result<ParsedAnswer, EvalError> {
    let scope = Scope::permissive(bindings.names()).with_exact_decimals();
    let fail = |e| EvalError::parse(Side::Reference, e);

    if kind != AnswerKind::Functional || detect_function_header(solution).is_some() {
        return parse_answer(solution, kind, &scope, &[]).map_err(fail);
    }
    // No header: the variables are whatever the body uses beyond the parameters.
    let body = parse_answer(solution, AnswerKind::Symbolic, &scope, &[]).map_err(fail)?;
    let variables: Vec<String> = body
        .symbols()
        .into_iter()
        .filter(|s| !bindings.contains(s))
        .collect();
    parse_answer(solution, kind, &scope, &variables).map_err(fail)
}

/// Give a functional candidate the reference's variable names, matched by
/// position. `None` when the arities differ.
fn align_variables(candidate: ParsedAnswer, variables: &[String]) -> Option<ParsedAnswer> {
    let ParsedAnswer::Functional(f) = candidate else {
        return Some(candidate);
    };
    if f.variables == variables {
        return Some(ParsedAnswer::Functional(f));
    }
    if f.variables.len() != variables.len() {
        // A closed body is a constant function of any arity.
        return f
            .body
            .symbols()
            .iter()
            .all(|s| !f.variables.contains(s))
            .then(|| {
                ParsedAnswer::Functional(FunctionalAnswer {
                    name: f.name.clone(),
                    variables: variables.to_vec(),
                    body: f.body.clone(),
                })
            });
    }
    let renames: Vec<(String, String)> = f
        .variables
        .iter()
        .cloned()
        .zip(variables.iter().cloned())
        .collect();
    Some(ParsedAnswer::Functional(FunctionalAnswer {
        name: f.name,
        variables: variables.to_vec(),
        body: f.body.rename(&renames),
    }))
}

/// The comparison rule implied by a reference solution.
///
/// A `f(x) = ...` header means functional. A plain numeral, optionally with
/// a unit that names no parameter, means numeric. Everything else is
/// symbolic.
pub fn detect_kind(solution: &str, bindings: &ResolvedBindings) -> AnswerKind {
    if detect_function_header(solution).is_some() {
        return AnswerKind::Functional;
    }
    match parse_numeric_solution(solution) {
        Ok(ParsedAnswer::Numeric(n)) => {
            let unit_is_parameter = n.unit.as_deref().is_some_and(|unit| {
                unit.split(|c: char| !c.is_alphanumeric() && c != '_')
                    .any(|word| bindings.contains(word))
            });
            if unit_is_parameter {
                AnswerKind::Symbolic
            } else {
                AnswerKind::Numeric
            }
        }
        _ => AnswerKind::Symbolic,
    }
}

fn default_evaluator() -> &'static Evaluator {
    static DEFAULT: OnceLock<Evaluator> = OnceLock::new();
    DEFAULT.get_or_init(Evaluator::default)
}

/// Evaluate `response` against `solution`, detecting the answer kind.
pub fn evaluate_solution(response: &str, solution: &str, parameters: &str) -> EvaluationResult {
    default_evaluator().evaluate_solution(response, solution, parameters)
}

/// Evaluate with the numeric tolerance rule.
pub fn evaluate_numeric_solution(
    response: &str,
    solution: &str,
    parameters: &str,
) -> EvaluationResult {
    default_evaluator().evaluate_numeric_solution(response, solution, parameters)
}

/// Evaluate with exact simplification and numeric fallback.
pub fn evaluate_symbolic_solution(
    response: &str,
    solution: &str,
    parameters: &str,
) -> EvaluationResult {
    default_evaluator().evaluate_symbolic_solution(response, solution, parameters)
}

/// Evaluate by sampling the answers as functions.
pub fn evaluate_functional_solution(
    response: &str,
    solution: &str,
    parameters: &str,
) -> EvaluationResult {
    default_evaluator().evaluate_functional_solution(response, solution, parameters)
}
