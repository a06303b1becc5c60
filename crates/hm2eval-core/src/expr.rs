//! Expression trees and typed answers.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rational::Rational;

/// Named mathematical constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Pi => write!(f, "pi"),
            Constant::E => write!(f, "e"),
        }
    }
}

/// The elementary functions an answer may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Sinh,
    Cosh,
    Tanh,
    Asin,
    Acos,
    Atan,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

impl Function {
    /// Look up a whitelisted function by any of its spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "sec" => Function::Sec,
            "csc" | "cosec" => Function::Csc,
            "cot" | "cotan" => Function::Cot,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "arcsin" | "asin" => Function::Asin,
            "arccos" | "acos" => Function::Acos,
            "arctan" | "atan" => Function::Atan,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            _ => return None,
        })
    }

    /// The inverse written as `f^{-1}`, for the trigonometric functions.
    pub fn inverse(self) -> Option<Self> {
        match self {
            Function::Sin => Some(Function::Asin),
            Function::Cos => Some(Function::Acos),
            Function::Tan => Some(Function::Atan),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Sec => "sec",
            Function::Csc => "csc",
            Function::Cot => "cot",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Asin => "arcsin",
            Function::Acos => "arccos",
            Function::Atan => "arctan",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

/// An expression over numbers, constants and named symbols.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// An exact value: integer literals and exactly-bound parameters.
    Rational(Rational),
    /// A decimal literal written in an answer, treated as approximate.
    Float(f64),
    Constant(Constant),
    /// A parameter or free variable.
    Symbol(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: Function,
        arg: Box<Expr>,
    },
}

impl Expr {
    pub fn integer(n: i128) -> Self {
        Expr::Rational(Rational::integer(n))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(func: Function, arg: Expr) -> Self {
        Expr::Call {
            func,
            arg: Box::new(arg),
        }
    }

    pub fn neg(expr: Expr) -> Self {
        Expr::Neg(Box::new(expr))
    }

    /// All symbol names occurring in the expression.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(e) | Expr::Call { arg: e, .. } => e.collect_symbols(out),
            Expr::Binary { left, right, .. } => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            Expr::Rational(_) | Expr::Float(_) | Expr::Constant(_) => {}
        }
    }

    /// Replace symbols for which `lookup` returns an expression.
    ///
    /// Symbols left untouched by `lookup` stay in place; `Err` aborts the
    /// substitution.
    pub fn try_substitute<E>(
        &self,
        lookup: &mut impl FnMut(&str) -> Result<Option<Expr>, E>,
    ) -> Result<Expr, E> {
        Ok(match self {
            Expr::Symbol(name) => match lookup(name)? {
                Some(value) => value,
                None => self.clone(),
            },
            Expr::Neg(e) => Expr::neg(e.try_substitute(lookup)?),
            Expr::Call { func, arg } => Expr::call(*func, arg.try_substitute(lookup)?),
            Expr::Binary { op, left, right } => Expr::binary(
                *op,
                left.try_substitute(lookup)?,
                right.try_substitute(lookup)?,
            ),
            Expr::Rational(_) | Expr::Float(_) | Expr::Constant(_) => self.clone(),
        })
    }

    /// Rename symbols according to `renames`, leaving others alone.
    pub fn rename(&self, renames: &[(String, String)]) -> Expr {
        let mut lookup = |name: &str| -> Result<Option<Expr>, std::convert::Infallible> {
            Ok(renames
                .iter()
                .find(|(from, _)| from == name)
                .map(|(_, to)| Expr::symbol(to.clone())))
        };
        match self.try_substitute(&mut lookup) {
            Ok(expr) => expr,
            Err(never) => match never {},
        }
    }

    /// True when a decimal literal occurs anywhere in the tree.
    pub fn has_float(&self) -> bool {
        match self {
            Expr::Float(_) => true,
            Expr::Neg(e) | Expr::Call { arg: e, .. } => e.has_float(),
            Expr::Binary { left, right, .. } => left.has_float() || right.has_float(),
            Expr::Rational(_) | Expr::Constant(_) | Expr::Symbol(_) => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Rational(r) if r.is_integer() => write!(f, "{r}"),
            Expr::Rational(r) => write!(f, "({r})"),
            Expr::Float(x) => write!(f, "{x}"),
            Expr::Constant(c) => write!(f, "{c}"),
            Expr::Symbol(name) => f.write_str(name),
            Expr::Neg(e) => write!(f, "-({e})"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Call { func, arg } => write!(f, "{func}({arg})"),
        }
    }
}

/// The three answer kinds and their comparison rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Numeric,
    Symbolic,
    Functional,
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerKind::Numeric => write!(f, "numeric"),
            AnswerKind::Symbolic => write!(f, "symbolic"),
            AnswerKind::Functional => write!(f, "functional"),
        }
    }
}

impl std::str::FromStr for AnswerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numeric" | "number" | "numerical" => Ok(AnswerKind::Numeric),
            "symbolic" | "expression" => Ok(AnswerKind::Symbolic),
            "functional" | "function" => Ok(AnswerKind::Functional),
            other => Err(format!("unknown answer kind: {other}")),
        }
    }
}

/// A literal number with an optional unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericAnswer {
    pub value: f64,
    /// Unit text as written; recorded, never validated.
    pub unit: Option<String>,
}

/// A function of declared free variables.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalAnswer {
    /// The function's name when written with a header such as `y(x) = ...`.
    pub name: Option<String>,
    pub variables: Vec<String>,
    pub body: Expr,
}

/// A parsed candidate or reference answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAnswer {
    Numeric(NumericAnswer),
    Symbolic(Expr),
    Functional(FunctionalAnswer),
}

impl ParsedAnswer {
    /// The expression carried by this answer, if any.
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            ParsedAnswer::Numeric(_) => None,
            ParsedAnswer::Symbolic(e) => Some(e),
            ParsedAnswer::Functional(f) => Some(&f.body),
        }
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        self.expr().map(Expr::symbols).unwrap_or_default()
    }
}
