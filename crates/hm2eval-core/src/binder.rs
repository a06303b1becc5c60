//! Substituting resolved parameters into parsed answers.

use crate::error::{EvalError, Side};
use crate::expr::{Expr, ParsedAnswer};
use crate::params::ResolvedBindings;

/// An answer with every parameter replaced by its value.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundAnswer {
    /// A literal number.
    Value { value: f64, unit: Option<String> },
    /// A closed expression: no symbols remain.
    Expr(Expr),
    /// A function body in which only `variables` remain free.
    Function { variables: Vec<String>, body: Expr },
}

/// Replace every parameter in `answer` by its bound value.
///
/// Functional variables shadow parameters of the same name. Any other name
/// without a binding is an unbound-parameter failure attributed to `side`.
pub fn bind(
    answer: &ParsedAnswer,
    bindings: &ResolvedBindings,
    side: Side,
) -> Result<BoundAnswer, EvalError> {
    match answer {
        ParsedAnswer::Numeric(n) => Ok(BoundAnswer::Value {
            value: n.value,
            unit: n.unit.clone(),
        }),
        ParsedAnswer::Symbolic(expr) => substitute(expr, bindings, &[], side).map(BoundAnswer::Expr),
        ParsedAnswer::Functional(f) => Ok(BoundAnswer::Function {
            variables: f.variables.clone(),
            body: substitute(&f.body, bindings, &f.variables, side)?,
        }),
    }
}

fn substitute(
    expr: &Expr,
    bindings: &ResolvedBindings,
    free: &[String],
    side: Side,
) -> Result<Expr, EvalError> {
    expr.try_substitute(&mut |name: &str| {
        if free.iter().any(|v| v == name) {
            return Ok(None);
        }
        match bindings.get(name) {
            Some(value) => Ok(Some(value.clone())),
            None => Err(EvalError::Unbound {
                side,
                name: name.to_string(),
            }),
        }
    })
}
