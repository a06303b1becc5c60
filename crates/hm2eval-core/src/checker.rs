//! Comparison rules for the three answer kinds.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::binder::BoundAnswer;
use crate::error::{EvalError, Side};
use crate::eval::{evaluate, EvalFault};
use crate::expr::{BinaryOp, Expr};
use crate::simplify::{prove_zero, SimplifyConfig, ZeroTest};

/// Numeric agreement: `|c - r| <= max(relative * |r|, absolute)`.
///
/// The boundary is closed. The absolute floor keeps references near zero
/// from demanding exact agreement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    #[serde(default = "default_relative")]
    pub relative: f64,
    #[serde(default = "default_absolute")]
    pub absolute: f64,
}

fn default_relative() -> f64 {
    1e-3
}
fn default_absolute() -> f64 {
    1e-9
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            relative: default_relative(),
            absolute: default_absolute(),
        }
    }
}

impl Tolerance {
    pub fn matches(&self, candidate: f64, reference: f64) -> bool {
        let allowed = (self.relative * reference.abs()).max(self.absolute);
        (candidate - reference).abs() <= allowed
    }
}

/// Where functional answers are sampled.
///
/// Variable `j` at sample `i` takes `points[(i + j * stride) % points.len()]`,
/// so multi-variable functions are not only probed along the diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_points")]
    pub points: Vec<f64>,
    /// Number of sample assignments tried.
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// Defined points required before declaring equivalence.
    #[serde(default = "default_min_points")]
    pub min_points: usize,
}

fn default_points() -> Vec<f64> {
    vec![
        0.37, 1.13, 2.71, 0.61, 1.79, 3.17, 0.83, 2.23, 1.41, -0.53, -1.27,
    ]
}
fn default_samples() -> usize {
    8
}
fn default_stride() -> usize {
    3
}
fn default_min_points() -> usize {
    3
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            points: default_points(),
            samples: default_samples(),
            stride: default_stride(),
            min_points: default_min_points(),
        }
    }
}

impl SamplingConfig {
    /// The assignment of `variables` at sample `i`.
    pub fn assignment(&self, i: usize, variables: &[String]) -> HashMap<String, f64> {
        let len = self.points.len().max(1);
        variables
            .iter()
            .enumerate()
            .map(|(j, v)| {
                let idx = (i + j * self.stride) % len;
                (v.clone(), self.points.get(idx).copied().unwrap_or(0.0))
            })
            .collect()
    }
}

fn fault(side: Side, fault: EvalFault) -> EvalError {
    match fault {
        EvalFault::Domain(e) => EvalError::domain(side, e),
        EvalFault::Unbound(name) => EvalError::Unbound { side, name },
    }
}

/// The value of an answer with no free variables.
fn closed_value(answer: &BoundAnswer, side: Side) -> Result<f64, EvalError> {
    let env = HashMap::new();
    match answer {
        BoundAnswer::Value { value, .. } => {
            if value.is_finite() {
                Ok(*value)
            } else {
                Err(EvalError::domain(side, crate::error::DomainError::NonFinite))
            }
        }
        BoundAnswer::Expr(expr) => evaluate(expr, &env).map_err(|f| fault(side, f)),
        BoundAnswer::Function { body, .. } => evaluate(body, &env).map_err(|f| fault(side, f)),
    }
}

/// Compare two answers as numbers.
pub fn check_numeric(
    candidate: &BoundAnswer,
    reference: &BoundAnswer,
    tolerance: &Tolerance,
) -> Result<bool, EvalError> {
    let r = closed_value(reference, Side::Reference)?;
    let c = closed_value(candidate, Side::Candidate)?;
    let equivalent = tolerance.matches(c, r);
    tracing::debug!(candidate = c, reference = r, equivalent, "numeric comparison");
    Ok(equivalent)
}

/// Compare two closed expressions exactly, falling back to numbers.
///
/// Both sides are evaluated first so that a singular answer is reported as a
/// domain failure even when the algebra would cancel it.
pub fn check_symbolic(
    candidate: &BoundAnswer,
    reference: &BoundAnswer,
    simplify: &SimplifyConfig,
    tolerance: &Tolerance,
) -> Result<bool, EvalError> {
    let r = closed_value(reference, Side::Reference)?;
    let c = closed_value(candidate, Side::Candidate)?;

    let (BoundAnswer::Expr(ce), BoundAnswer::Expr(re)) = (candidate, reference) else {
        return Ok(tolerance.matches(c, r));
    };
    let difference = Expr::binary(BinaryOp::Sub, ce.clone(), re.clone());
    match prove_zero(&difference, simplify) {
        ZeroTest::Zero => {
            tracing::debug!("symbolic difference is zero");
            Ok(true)
        }
        ZeroTest::NonZeroConstant(d) => {
            tracing::debug!(difference = %d, "symbolic difference is a nonzero constant");
            Ok(false)
        }
        ZeroTest::Inconclusive(reason) => {
            let equivalent = tolerance.matches(c, r);
            tracing::debug!(%reason, candidate = c, reference = r, equivalent, "numeric fallback");
            Ok(equivalent)
        }
    }
}

/// Compare two functions by sampling.
///
/// The candidate's variables must already carry the reference's names.
/// Points where the reference is undefined are skipped. A point where the
/// reference is defined and the candidate is not, or where the two disagree,
/// makes the answers different. Fewer than `min_points` defined points is
/// indeterminate.
pub fn check_functional(
    candidate: &BoundAnswer,
    reference: &BoundAnswer,
    sampling: &SamplingConfig,
    tolerance: &Tolerance,
) -> Result<bool, EvalError> {
    let (variables, reference_body) = match reference {
        BoundAnswer::Function { variables, body } if !variables.is_empty() => (variables, body),
        _ => return check_numeric(candidate, reference, tolerance),
    };
    let candidate_body = match candidate {
        BoundAnswer::Function { body, .. } | BoundAnswer::Expr(body) => body.clone(),
        BoundAnswer::Value { value, .. } => Expr::Float(*value),
    };

    let mut used: BTreeSet<Vec<u64>> = BTreeSet::new();
    let mut skipped = 0usize;
    for i in 0..sampling.samples {
        let env = sampling.assignment(i, variables);
        let key: Vec<u64> = variables.iter().map(|v| env[v].to_bits()).collect();
        if used.contains(&key) {
            continue;
        }

        let r = match evaluate(reference_body, &env) {
            Ok(r) => r,
            Err(EvalFault::Domain(_)) => {
                skipped += 1;
                continue;
            }
            Err(f) => return Err(fault(Side::Reference, f)),
        };
        let c = match evaluate(&candidate_body, &env) {
            Ok(c) => c,
            Err(EvalFault::Domain(e)) => {
                tracing::debug!(sample = i, reference = r, "candidate undefined: {e}");
                return Ok(false);
            }
            Err(f) => return Err(fault(Side::Candidate, f)),
        };

        if !tolerance.matches(c, r) {
            tracing::debug!(sample = i, candidate = c, reference = r, "functional mismatch");
            return Ok(false);
        }
        used.insert(key);
    }

    if used.len() < sampling.min_points {
        return Err(EvalError::Indeterminate(format!(
            "only {} sample points were defined for both answers ({} skipped, {} required)",
            used.len(),
            skipped,
            sampling.min_points
        )));
    }
    tracing::debug!(points = used.len(), skipped, "functional answers agree");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::parser::{parse_expression, Scope};

    fn function(text: &str, vars: &[&str]) -> BoundAnswer {
        let scope = Scope::strict(vars.iter().copied());
        BoundAnswer::Function {
            variables: vars.iter().map(|v| v.to_string()).collect(),
            body: parse_expression(text, &scope).unwrap(),
        }
    }

    fn closed(text: &str) -> BoundAnswer {
        BoundAnswer::Expr(parse_expression(text, &Scope::default()).unwrap())
    }

    fn value(v: f64) -> BoundAnswer {
        BoundAnswer::Value {
            value: v,
            unit: None,
        }
    }

    #[test]
    fn tolerance_boundary_is_closed() {
        let tol = Tolerance {
            relative: 1e-3,
            absolute: 0.0,
        };
        assert!(tol.matches(100.09, 100.0));
        assert!(!tol.matches(100.2, 100.0));
        let exact = Tolerance {
            relative: 0.0,
            absolute: 0.5,
        };
        assert!(exact.matches(1.5, 1.0));
    }

    #[test]
    fn numeric_rule() {
        let tol = Tolerance::default();
        assert!(check_numeric(&value(42.0), &value(42.0), &tol).unwrap());
        assert!(!check_numeric(&value(41.0), &value(42.0), &tol).unwrap());
        assert!(check_numeric(&closed("1/2"), &value(0.5), &tol).unwrap());
    }

    #[test]
    fn symbolic_exact_and_fallback() {
        let tol = Tolerance::default();
        let cfg = SimplifyConfig::default();
        assert!(check_symbolic(&closed("3 + 1"), &closed("1 + 3"), &cfg, &tol).unwrap());
        assert!(!check_symbolic(&closed("1/3"), &closed("1/2"), &cfg, &tol).unwrap());
        // sin(pi/6) is opaque to the normal form; numbers decide.
        assert!(check_symbolic(&closed(r"\sin(\pi/6)"), &closed("1/2"), &cfg, &tol).unwrap());
    }

    #[test]
    fn symbolic_domain_failure_wins_over_algebra() {
        let err = check_symbolic(
            &closed("1/(2-2)"),
            &closed("1"),
            &SimplifyConfig::default(),
            &Tolerance::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EvalError::domain(Side::Candidate, DomainError::DivisionByZero)
        );
    }

    #[test]
    fn functional_agreement() {
        let sampling = SamplingConfig::default();
        let tol = Tolerance::default();
        assert!(check_functional(
            &function("x*x", &["x"]),
            &function("x^2", &["x"]),
            &sampling,
            &tol
        )
        .unwrap());
        assert!(!check_functional(
            &function("x^3", &["x"]),
            &function("x^2", &["x"]),
            &sampling,
            &tol
        )
        .unwrap());
    }

    #[test]
    fn functional_skips_undefined_points() {
        // ln is undefined at the negative sample points; the rest suffice.
        assert!(check_functional(
            &function("ln(x^2) / 2", &["x"]),
            &function("ln(x)", &["x"]),
            &SamplingConfig::default(),
            &Tolerance::default()
        )
        .unwrap());
    }

    #[test]
    fn candidate_undefined_where_reference_is_defined() {
        assert!(!check_functional(
            &function("sqrt(-1 - x^2)", &["x"]),
            &function("x", &["x"]),
            &SamplingConfig::default(),
            &Tolerance::default()
        )
        .unwrap());
    }

    #[test]
    fn functional_indeterminate_when_nothing_defined() {
        let err = check_functional(
            &function("sqrt(-x*x - 1)", &["x"]),
            &function("sqrt(-x*x - 1)", &["x"]),
            &SamplingConfig::default(),
            &Tolerance::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::Indeterminate(_)));
    }

    #[test]
    fn multi_variable_sampling_is_off_diagonal() {
        let sampling = SamplingConfig::default();
        let vars = vec!["x".to_string(), "y".to_string()];
        let a = sampling.assignment(0, &vars);
        assert_ne!(a["x"], a["y"]);
        // x*y and x^2 agree on the diagonal only.
        assert!(!check_functional(
            &function("x*y", &["x", "y"]),
            &function("x^2", &["x", "y"]),
            &sampling,
            &Tolerance::default()
        )
        .unwrap());
    }
}
