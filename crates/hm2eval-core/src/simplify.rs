//! Bounded algebraic normal form.
//!
//! An expression is rewritten as a sum of monomials with exact rational
//! coefficients. A monomial is a product of atoms raised to rational powers.
//! Atoms are symbols, the constants `pi` and `e`, radicals of positive
//! rationals (`2^(1/2)`), and opaque function applications keyed by the
//! normal form of their argument (`sin(1 + x)` and `sin(x + 1)` are the same
//! atom).
//!
//! The normal form is canonical for polynomial identities, which is enough to
//! prove `x + 1 = 1 + x` or `(a + b)^2 = a^2 + 2ab + b^2` exactly. Everything
//! it cannot decide is reported as inconclusive and left to the numeric
//! fallback.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{BinaryOp, Constant, Expr, Function};
use crate::rational::Rational;

/// Effort bounds for normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifyConfig {
    /// Maximum number of terms in any intermediate polynomial.
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
    /// Maximum number of rewriting steps for one expression.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Largest integer power of a sum that is expanded.
    #[serde(default = "default_max_expand_power")]
    pub max_expand_power: u32,
}

fn default_max_terms() -> usize {
    256
}
fn default_max_steps() -> usize {
    20_000
}
fn default_max_expand_power() -> u32 {
    8
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            max_terms: default_max_terms(),
            max_steps: default_max_steps(),
            max_expand_power: default_max_expand_power(),
        }
    }
}

/// Recursion bound while walking an expression.
const MAX_DEPTH: usize = 512;

/// Outcome of trying to prove an expression is zero.
#[derive(Debug, Clone, PartialEq)]
pub enum ZeroTest {
    Zero,
    /// The expression normalizes to this nonzero exact number.
    NonZeroConstant(Rational),
    /// Atoms remain or normalization gave up.
    Inconclusive(Undecided),
}

/// Why normalization could not decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undecided {
    /// A decimal literal makes exact reasoning meaningless.
    ApproximateLiteral,
    /// Step, term or depth budget exhausted.
    Budget,
    /// Coefficient arithmetic overflowed.
    Overflow,
    /// Division by zero or a similar singularity.
    Singular,
    /// The normal form still contains atoms.
    AtomsRemain,
}

impl fmt::Display for Undecided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Undecided::ApproximateLiteral => "decimal literal present",
            Undecided::Budget => "simplification budget exhausted",
            Undecided::Overflow => "coefficient overflow",
            Undecided::Singular => "singular subexpression",
            Undecided::AtomsRemain => "irreducible terms remain",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Atom {
    Constant(Constant),
    Symbol(String),
    /// A positive rational base other than one, with a non-integer power.
    Radical(Rational),
    Opaque(String),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Constant(c) => write!(f, "{c}"),
            Atom::Symbol(s) => f.write_str(s),
            Atom::Radical(r) => write!(f, "({r})"),
            Atom::Opaque(s) => f.write_str(s),
        }
    }
}

type Monomial = BTreeMap<Atom, Rational>;

/// A sum of monomials with rational coefficients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, Rational>,
}

impl Polynomial {
    fn constant(r: Rational) -> Self {
        let mut terms = BTreeMap::new();
        if !r.is_zero() {
            terms.insert(Monomial::new(), r);
        }
        Self { terms }
    }

    fn atom(atom: Atom, power: Rational) -> Self {
        let mut mono = Monomial::new();
        mono.insert(atom, power);
        let mut terms = BTreeMap::new();
        terms.insert(mono, Rational::ONE);
        Self { terms }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// The value if this polynomial is a bare number.
    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::ZERO),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(mono, _)| mono.is_empty())
                .map(|(_, c)| *c),
            _ => None,
        }
    }

    fn single_term(&self) -> Option<(&Monomial, Rational)> {
        if self.terms.len() == 1 {
            self.terms.iter().next().map(|(m, c)| (m, *c))
        } else {
            None
        }
    }

    fn add_term(&mut self, mono: Monomial, coef: Rational) -> Result<(), Undecided> {
        let updated = match self.terms.get(&mono) {
            Some(existing) => existing.checked_add(&coef).ok_or(Undecided::Overflow)?,
            None => coef,
        };
        if updated.is_zero() {
            self.terms.remove(&mono);
        } else {
            self.terms.insert(mono, updated);
        }
        Ok(())
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        for (i, (mono, coef)) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            if mono.is_empty() {
                write!(f, "{coef}")?;
                continue;
            }
            if *coef != Rational::ONE {
                write!(f, "{coef}*")?;
            }
            for (j, (atom, power)) in mono.iter().enumerate() {
                if j > 0 {
                    f.write_str("*")?;
                }
                if *power == Rational::ONE {
                    write!(f, "{atom}")?;
                } else {
                    write!(f, "{atom}^({power})")?;
                }
            }
        }
        Ok(())
    }
}

/// Normal form of `expr`, or why none was found.
pub fn normalize(expr: &Expr, config: &SimplifyConfig) -> Result<Polynomial, Undecided> {
    Normalizer {
        config,
        steps: 0,
        depth: 0,
    }
    .expr(expr)
}

/// Decide whether `expr` is identically zero.
pub fn prove_zero(expr: &Expr, config: &SimplifyConfig) -> ZeroTest {
    match normalize(expr, config) {
        Ok(poly) if poly.is_zero() => ZeroTest::Zero,
        Ok(poly) => match poly.as_constant() {
            Some(c) => ZeroTest::NonZeroConstant(c),
            None => ZeroTest::Inconclusive(Undecided::AtomsRemain),
        },
        Err(reason) => ZeroTest::Inconclusive(reason),
    }
}

struct Normalizer<'a> {
    config: &'a SimplifyConfig,
    steps: usize,
    depth: usize,
}

type Step<T> = Result<T, Undecided>;

impl Normalizer<'_> {
    fn tick(&mut self, cost: usize) -> Step<()> {
        self.steps = self.steps.saturating_add(cost);
        if self.steps > self.config.max_steps {
            Err(Undecided::Budget)
        } else {
            Ok(())
        }
    }

    fn check_size(&self, poly: Polynomial) -> Step<Polynomial> {
        if poly.term_count() > self.config.max_terms {
            Err(Undecided::Budget)
        } else {
            Ok(poly)
        }
    }

    fn expr(&mut self, expr: &Expr) -> Step<Polynomial> {
        if self.depth >= MAX_DEPTH {
            return Err(Undecided::Budget);
        }
        self.depth += 1;
        let result = self.expr_inner(expr);
        self.depth -= 1;
        result
    }

    fn expr_inner(&mut self, expr: &Expr) -> Step<Polynomial> {
        self.tick(1)?;
        match expr {
            Expr::Rational(r) => Ok(Polynomial::constant(*r)),
            Expr::Float(_) => Err(Undecided::ApproximateLiteral),
            Expr::Constant(c) => Ok(Polynomial::atom(Atom::Constant(*c), Rational::ONE)),
            Expr::Symbol(s) => Ok(Polynomial::atom(Atom::Symbol(s.clone()), Rational::ONE)),
            Expr::Neg(e) => {
                let p = self.expr(e)?;
                self.scale(&p, Rational::integer(-1))
            }
            Expr::Binary { op, left, right } => {
                let a = self.expr(left)?;
                let b = self.expr(right)?;
                match op {
                    BinaryOp::Add => self.add(&a, &b),
                    BinaryOp::Sub => {
                        let neg = self.scale(&b, Rational::integer(-1))?;
                        self.add(&a, &neg)
                    }
                    BinaryOp::Mul => self.mul(&a, &b),
                    BinaryOp::Div => {
                        let inv = self.reciprocal(&b)?;
                        self.mul(&a, &inv)
                    }
                    BinaryOp::Pow => self.pow(&a, &b),
                }
            }
            Expr::Call { func, arg } => {
                let a = self.expr(arg)?;
                self.call(*func, &a)
            }
        }
    }

    fn scale(&mut self, p: &Polynomial, factor: Rational) -> Step<Polynomial> {
        self.tick(p.term_count())?;
        let mut out = Polynomial::default();
        for (mono, coef) in &p.terms {
            let c = coef.checked_mul(&factor).ok_or(Undecided::Overflow)?;
            out.add_term(mono.clone(), c)?;
        }
        Ok(out)
    }

    fn add(&mut self, a: &Polynomial, b: &Polynomial) -> Step<Polynomial> {
        self.tick(b.term_count())?;
        let mut out = a.clone();
        for (mono, coef) in &b.terms {
            out.add_term(mono.clone(), *coef)?;
        }
        self.check_size(out)
    }

    fn mul(&mut self, a: &Polynomial, b: &Polynomial) -> Step<Polynomial> {
        self.tick(a.term_count().saturating_mul(b.term_count()))?;
        let mut out = Polynomial::default();
        for (ma, ca) in &a.terms {
            for (mb, cb) in &b.terms {
                let (factor, mono) = multiply_monomials(ma, mb)?;
                let coef = ca
                    .checked_mul(cb)
                    .and_then(|c| c.checked_mul(&factor))
                    .ok_or(Undecided::Overflow)?;
                out.add_term(mono, coef)?;
            }
        }
        self.check_size(out)
    }

    fn reciprocal(&mut self, p: &Polynomial) -> Step<Polynomial> {
        if p.is_zero() {
            return Err(Undecided::Singular);
        }
        match p.single_term() {
            Some((mono, coef)) => {
                let inv = coef.checked_recip().ok_or(Undecided::Singular)?;
                let mono: Monomial = mono
                    .iter()
                    .map(|(a, e)| Ok((a.clone(), e.checked_neg().ok_or(Undecided::Overflow)?)))
                    .collect::<Step<_>>()?;
                let (factor, mono) = normalize_monomial(mono)?;
                let mut out = Polynomial::default();
                out.add_term(mono, inv.checked_mul(&factor).ok_or(Undecided::Overflow)?)?;
                Ok(out)
            }
            None => Ok(Polynomial::atom(
                Atom::Opaque(format!("({p})")),
                Rational::integer(-1),
            )),
        }
    }

    fn pow(&mut self, base: &Polynomial, exponent: &Polynomial) -> Step<Polynomial> {
        let Some(q) = exponent.as_constant() else {
            return Ok(self.opaque_pow(base, exponent));
        };
        if q.is_zero() {
            if base.is_zero() {
                return Err(Undecided::Singular);
            }
            return Ok(Polynomial::constant(Rational::ONE));
        }
        if base.is_zero() {
            return if q.is_negative() {
                Err(Undecided::Singular)
            } else {
                Ok(Polynomial::default())
            };
        }

        // Sums are expanded only for small positive integer powers.
        if base.term_count() > 1 {
            let n = q.numer();
            if q.is_integer() && n > 0 && n <= i128::from(self.config.max_expand_power) {
                let mut out = base.clone();
                for _ in 1..n {
                    out = self.mul(&out, base)?;
                }
                return Ok(out);
            }
            if q.is_integer() && n < 0 && -n <= i128::from(self.config.max_expand_power) {
                let inv = self.reciprocal(base)?;
                return self.pow(&inv, &Polynomial::constant(Rational::integer(-n)));
            }
            return Ok(self.opaque_pow(base, exponent));
        }

        let Some((mono, coef)) = base.single_term() else {
            return Ok(self.opaque_pow(base, exponent));
        };
        self.tick(mono.len() + 1)?;
        if !q.is_integer() && !monomial_is_positive(mono) {
            return Ok(self.opaque_pow(base, exponent));
        }

        let (coef_factor, mut out_mono) = rational_power(coef, q)
            .map(|(c, atom)| {
                let mut m = Monomial::new();
                if let Some((a, p)) = atom {
                    m.insert(a, p);
                }
                (c, m)
            })
            .ok_or(Undecided::Overflow)?;
        if coef.is_negative() && !q.is_integer() {
            return Ok(self.opaque_pow(base, exponent));
        }
        for (atom, power) in mono {
            let p = power.checked_mul(&q).ok_or(Undecided::Overflow)?;
            let entry = out_mono.entry(atom.clone()).or_insert(Rational::ZERO);
            *entry = entry.checked_add(&p).ok_or(Undecided::Overflow)?;
        }
        let (factor, out_mono) = normalize_monomial(out_mono)?;
        let mut out = Polynomial::default();
        out.add_term(
            out_mono,
            coef_factor.checked_mul(&factor).ok_or(Undecided::Overflow)?,
        )?;
        Ok(out)
    }

    fn opaque_pow(&self, base: &Polynomial, exponent: &Polynomial) -> Polynomial {
        Polynomial::atom(
            Atom::Opaque(format!("({base})^({exponent})")),
            Rational::ONE,
        )
    }

    fn call(&mut self, func: Function, arg: &Polynomial) -> Step<Polynomial> {
        match func {
            Function::Sqrt => self.pow(arg, &Polynomial::constant(half())),
            Function::Exp => self.pow(
                &Polynomial::atom(Atom::Constant(Constant::E), Rational::ONE),
                arg,
            ),
            Function::Abs => match arg.as_constant() {
                Some(c) if c.is_negative() => Ok(Polynomial::constant(
                    c.checked_neg().ok_or(Undecided::Overflow)?,
                )),
                Some(c) => Ok(Polynomial::constant(c)),
                None => Ok(opaque_call(func, arg)),
            },
            Function::Ln => {
                if arg.as_constant() == Some(Rational::ONE) {
                    return Ok(Polynomial::default());
                }
                // ln(e^q) = q
                if let Some((mono, coef)) = arg.single_term() {
                    if coef == Rational::ONE && mono.len() == 1 {
                        if let Some(q) = mono.get(&Atom::Constant(Constant::E)) {
                            return Ok(Polynomial::constant(*q));
                        }
                    }
                }
                Ok(opaque_call(func, arg))
            }
            _ => match arg.as_constant() {
                Some(c) if c.is_zero() => Ok(match func {
                    Function::Cos | Function::Cosh | Function::Sec => {
                        Polynomial::constant(Rational::ONE)
                    }
                    Function::Sin
                    | Function::Tan
                    | Function::Sinh
                    | Function::Tanh
                    | Function::Asin
                    | Function::Atan => Polynomial::default(),
                    _ => opaque_call(func, arg),
                }),
                _ => Ok(opaque_call(func, arg)),
            },
        }
    }
}

fn half() -> Rational {
    Rational::new(1, 2).unwrap_or(Rational::ONE)
}

fn opaque_call(func: Function, arg: &Polynomial) -> Polynomial {
    Polynomial::atom(Atom::Opaque(format!("{func}({arg})")), Rational::ONE)
}

/// Atoms known to be positive reals.
fn monomial_is_positive(mono: &Monomial) -> bool {
    mono.keys()
        .all(|a| matches!(a, Atom::Constant(_) | Atom::Radical(_)))
}

/// `c^q` as an exact coefficient times an optional radical atom.
fn rational_power(c: Rational, q: Rational) -> Option<(Rational, Option<(Atom, Rational)>)> {
    if q.is_integer() {
        let n = i64::try_from(q.numer()).ok()?;
        return Some((c.checked_pow(n)?, None));
    }
    if c.is_negative() {
        // Caller turns this into an opaque atom.
        return Some((Rational::ONE, None));
    }
    if c == Rational::ONE {
        return Some((Rational::ONE, None));
    }
    let root = u32::try_from(q.denom()).ok()?;
    if let Some(r) = c.exact_root(root) {
        let n = i64::try_from(q.numer()).ok()?;
        return Some((r.checked_pow(n)?, None));
    }
    Some((Rational::ONE, Some((Atom::Radical(c), q))))
}

fn multiply_monomials(a: &Monomial, b: &Monomial) -> Step<(Rational, Monomial)> {
    let mut out = a.clone();
    for (atom, power) in b {
        let entry = out.entry(atom.clone()).or_insert(Rational::ZERO);
        *entry = entry.checked_add(power).ok_or(Undecided::Overflow)?;
    }
    normalize_monomial(out)
}

/// Drop zero powers and fold whole powers of radicals into the coefficient.
fn normalize_monomial(mono: Monomial) -> Step<(Rational, Monomial)> {
    let mut factor = Rational::ONE;
    let mut out = Monomial::new();
    for (atom, power) in mono {
        if power.is_zero() {
            continue;
        }
        if let Atom::Radical(base) = &atom {
            let whole = power.numer().div_euclid(power.denom());
            let rest = power
                .checked_sub(&Rational::integer(whole))
                .ok_or(Undecided::Overflow)?;
            let whole = i64::try_from(whole).map_err(|_| Undecided::Overflow)?;
            let lifted = base.checked_pow(whole).ok_or(Undecided::Overflow)?;
            factor = factor.checked_mul(&lifted).ok_or(Undecided::Overflow)?;
            if !rest.is_zero() {
                out.insert(atom, rest);
            }
            continue;
        }
        out.insert(atom, power);
    }
    Ok((factor, out))
}
