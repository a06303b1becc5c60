//! Floating-point evaluation of expressions with real-domain checks.

use std::collections::HashMap;

use crate::error::DomainError;
use crate::expr::{BinaryOp, Expr, Function};
use crate::rational::Rational;

/// Why an expression could not be evaluated at a point.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalFault {
    Domain(DomainError),
    /// A symbol with no value in the environment.
    Unbound(String),
}

impl From<DomainError> for EvalFault {
    fn from(e: DomainError) -> Self {
        EvalFault::Domain(e)
    }
}

/// Evaluate a closed expression.
pub fn evaluate_closed(expr: &Expr) -> Result<f64, EvalFault> {
    evaluate(expr, &HashMap::new())
}

/// Evaluate `expr` with symbols looked up in `env`.
pub fn evaluate(expr: &Expr, env: &HashMap<String, f64>) -> Result<f64, EvalFault> {
    let value = match expr {
        Expr::Rational(r) => r.to_f64(),
        Expr::Float(x) => *x,
        Expr::Constant(c) => c.value(),
        Expr::Symbol(name) => *env
            .get(name)
            .ok_or_else(|| EvalFault::Unbound(name.clone()))?,
        Expr::Neg(e) => -evaluate(e, env)?,
        Expr::Binary { op, left, right } => {
            let a = evaluate(left, env)?;
            let b = evaluate(right, env)?;
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(DomainError::DivisionByZero.into());
                    }
                    a / b
                }
                BinaryOp::Pow => power(a, b, right)?,
            }
        }
        Expr::Call { func, arg } => apply(*func, evaluate(arg, env)?)?,
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DomainError::NonFinite.into())
    }
}

fn power(base: f64, exponent: f64, exponent_expr: &Expr) -> Result<f64, DomainError> {
    if base == 0.0 && exponent < 0.0 {
        return Err(DomainError::DivisionByZero);
    }
    if base < 0.0 && exponent.fract() != 0.0 {
        // Odd roots of negatives are real: (-8)^(1/3) = -2.
        return match literal_rational(exponent_expr) {
            Some(q) if q.denom() % 2 == 1 => {
                let magnitude = (-base).powf(exponent);
                Ok(if q.numer() % 2 == 0 { magnitude } else { -magnitude })
            }
            _ => Err(DomainError::NegativeBasePower { base, exponent }),
        };
    }
    Ok(base.powf(exponent))
}

/// The exact value of an exponent written as a literal fraction.
fn literal_rational(expr: &Expr) -> Option<Rational> {
    match expr {
        Expr::Rational(r) => Some(*r),
        Expr::Neg(e) => literal_rational(e)?.checked_neg(),
        Expr::Binary {
            op: BinaryOp::Div,
            left,
            right,
        } => literal_rational(left)?.checked_div(&literal_rational(right)?),
        _ => None,
    }
}

fn apply(func: Function, x: f64) -> Result<f64, DomainError> {
    const EDGE: f64 = 1e-12;
    Ok(match func {
        Function::Sin => x.sin(),
        Function::Cos => x.cos(),
        Function::Tan => x.tan(),
        Function::Sec => reciprocal(x.cos())?,
        Function::Csc => reciprocal(x.sin())?,
        Function::Cot => reciprocal(x.tan())?,
        Function::Sinh => x.sinh(),
        Function::Cosh => x.cosh(),
        Function::Tanh => x.tanh(),
        Function::Asin | Function::Acos => {
            if x.abs() > 1.0 + EDGE {
                return Err(DomainError::OutOfDomain {
                    function: func.name(),
                    value: x,
                });
            }
            let x = x.clamp(-1.0, 1.0);
            if func == Function::Asin {
                x.asin()
            } else {
                x.acos()
            }
        }
        Function::Atan => x.atan(),
        Function::Exp => x.exp(),
        Function::Ln => {
            if x <= 0.0 {
                return Err(DomainError::LogOfNonPositive(x));
            }
            x.ln()
        }
        Function::Sqrt => {
            if x < 0.0 {
                return Err(DomainError::SqrtOfNegative(x));
            }
            x.sqrt()
        }
        Function::Abs => x.abs(),
    })
}

fn reciprocal(x: f64) -> Result<f64, DomainError> {
    if x == 0.0 {
        Err(DomainError::DivisionByZero)
    } else {
        Ok(1.0 / x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, Scope};

    fn eval(text: &str, vars: &[(&str, f64)]) -> Result<f64, EvalFault> {
        let scope = Scope::strict(vars.iter().map(|(n, _)| n.to_string()));
        let expr = parse_expression(text, &scope).unwrap();
        let env = vars.iter().map(|(n, v)| (n.to_string(), *v)).collect();
        evaluate(&expr, &env)
    }

    #[test]
    fn arithmetic_and_functions() {
        assert_eq!(eval("1 + 2 * 3", &[]).unwrap(), 7.0);
        assert!((eval(r"\sin(\pi / 2)", &[]).unwrap() - 1.0).abs() < 1e-12);
        assert!((eval("ln(e^2)", &[]).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(eval("x^2", &[("x", 3.0)]).unwrap(), 9.0);
    }

    #[test]
    fn domain_errors() {
        assert_eq!(
            eval("1/(x-2)", &[("x", 2.0)]),
            Err(EvalFault::Domain(DomainError::DivisionByZero))
        );
        assert!(matches!(
            eval("ln(0)", &[]),
            Err(EvalFault::Domain(DomainError::LogOfNonPositive(_)))
        ));
        assert!(matches!(
            eval("sqrt(-1)", &[]),
            Err(EvalFault::Domain(DomainError::SqrtOfNegative(_)))
        ));
        assert!(matches!(
            eval("arcsin(2)", &[]),
            Err(EvalFault::Domain(DomainError::OutOfDomain { .. }))
        ));
        assert!(matches!(
            eval("(-2)^x", &[("x", 0.5)]),
            Err(EvalFault::Domain(DomainError::NegativeBasePower { .. }))
        ));
    }

    #[test]
    fn odd_roots_of_negatives() {
        assert!((eval("(-8)^(1/3)", &[]).unwrap() + 2.0).abs() < 1e-12);
    }

    #[test]
    fn unbound_symbol() {
        let expr = Expr::symbol("k");
        assert_eq!(evaluate_closed(&expr), Err(EvalFault::Unbound("k".into())));
    }
}
