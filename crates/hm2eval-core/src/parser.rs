//! Expression and answer parsing.
//!
//! Recursive descent over the lexer's tokens. The grammar, lowest
//! precedence first:
//!
//! ```text
//! expression     := additive
//! additive       := multiplicative (("+" | "-") multiplicative)*
//! multiplicative := unary (("*" | "/") unary | implicit_factor)*
//! unary          := ("-" | "+") unary | power
//! power          := primary ("^" unary)?
//! primary        := number | identifier | constant | function | frac | sqrt
//!                 | "(" expression ")" | "{" expression "}" | "[" expression "]"
//!                 | "|" expression "|"
//! ```
//!
//! `implicit_factor` is a `power` that starts right after another factor
//! with no operator in between (`2x`, `m g`, `(a)(b)`).

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseError;
use crate::expr::{
    AnswerKind, BinaryOp, Constant, Expr, Function, FunctionalAnswer, NumericAnswer, ParsedAnswer,
};
use crate::lexer::{tokenize, Token};
use crate::rational::Rational;

/// Maximum nesting of groups, negations and function calls.
pub const MAX_DEPTH: usize = 128;

/// Maximum number of tokens in one expression.
pub const MAX_TOKENS: usize = 2048;

/// Identifiers that name functions outside the whitelist.
const DISALLOWED_FUNCTIONS: &[&str] = &[
    "erf", "erfc", "gamma", "Gamma", "beta", "zeta", "floor", "ceil", "max", "min", "sum", "prod",
    "int", "integrate", "diff", "lim", "mod", "sign", "sgn", "factorial", "binom", "besselj",
    "lambertw", "W", "Ai", "Bi", "Li", "Si", "Ci", "Ei", "re", "im", "arg",
];

/// LaTeX commands for operators the engine does not evaluate.
const DISALLOWED_COMMANDS: &[&str] = &[
    "int", "iint", "iiint", "oint", "sum", "prod", "lim", "partial", "nabla", "max", "min", "det",
    "arg", "erf", "binom", "lfloor", "rfloor", "lceil", "rceil", "sup", "inf", "liminf", "limsup",
];

/// The names an expression may refer to.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    names: BTreeSet<String>,
    allow_free: bool,
    exact_decimals: bool,
}

impl Scope {
    /// Only declared names are accepted; anything else is an unknown identifier.
    pub fn strict<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            allow_free: false,
            exact_decimals: false,
        }
    }

    /// Undeclared names become free symbols for a later stage to reject.
    pub fn permissive<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_free: true,
            ..Self::strict(names)
        }
    }

    /// Read decimal literals as exact rationals instead of approximations.
    pub fn with_exact_decimals(mut self) -> Self {
        self.exact_decimals = true;
        self
    }

    pub fn declare(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }
}

/// A `name(v1, v2, ...)` prefix on a functional answer.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionHeader {
    pub name: String,
    pub variables: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Tokenize `text`, dropping prose tokens, and enforce the size limit.
fn prepare(text: &str) -> Result<Vec<Token>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let tokens: Vec<Token> = tokenize(text)?
        .into_iter()
        .filter(|t| !matches!(t, Token::Text(_)))
        .collect();
    if tokens.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    if tokens.len() > MAX_TOKENS {
        return Err(ParseError::TooLong {
            tokens: tokens.len(),
            limit: MAX_TOKENS,
        });
    }
    Ok(tokens)
}

/// Parse a whole string as one expression (no equation handling).
pub fn parse_expression(text: &str, scope: &Scope) -> Result<Expr, ParseError> {
    let tokens = prepare(text)?;
    parse_tokens(&tokens, scope)
}

/// Parse an answer of the given kind.
///
/// Equations are reduced to their last right-hand side (`E = mc^2 = 9e16`
/// yields `9e16`). For functional answers a leading `f(x, y) =` header
/// declares the free variables; without one, `default_variables` are used.
pub fn parse_answer(
    text: &str,
    kind: AnswerKind,
    scope: &Scope,
    default_variables: &[String],
) -> Result<ParsedAnswer, ParseError> {
    match kind {
        AnswerKind::Numeric => parse_numeric_answer(text, scope),
        AnswerKind::Symbolic => {
            let tokens = prepare(text)?;
            match parse_tokens(last_segment(&tokens)?, scope) {
                Ok(expr) => Ok(ParsedAnswer::Symbolic(expr)),
                // A bare number with units is still a usable symbolic answer.
                Err(err) => parse_numeric_solution(text).map_err(|_| err),
            }
        }
        AnswerKind::Functional => {
            parse_functional(text, scope, default_variables).map(ParsedAnswer::Functional)
        }
    }
}

fn parse_numeric_answer(text: &str, scope: &Scope) -> Result<ParsedAnswer, ParseError> {
    let as_expression = || -> Result<ParsedAnswer, ParseError> {
        let tokens = prepare(text)?;
        parse_tokens(last_segment(&tokens)?, scope).map(ParsedAnswer::Symbolic)
    };
    match parse_numeric_solution(text) {
        Ok(ParsedAnswer::Numeric(answer)) if unit_mentions_declared(&answer, scope) => {
            as_expression().or(Ok(ParsedAnswer::Numeric(answer)))
        }
        Ok(answer) => Ok(answer),
        Err(_) => as_expression(),
    }
}

/// A trailing "unit" such as the `x` in `2 x` is really a factor when `x`
/// is a declared name.
fn unit_mentions_declared(answer: &NumericAnswer, scope: &Scope) -> bool {
    let Some(unit) = &answer.unit else {
        return false;
    };
    tokenize(unit)
        .map(|tokens| {
            tokens
                .iter()
                .any(|t| matches!(t, Token::Ident(name) if scope.is_declared(name)))
        })
        .unwrap_or(false)
}

/// Parse a functional answer, with or without a `name(vars) =` header.
pub fn parse_functional(
    text: &str,
    scope: &Scope,
    default_variables: &[String],
) -> Result<FunctionalAnswer, ParseError> {
    let tokens = prepare(text)?;
    let segments = split_equation(&tokens);
    let header = match segments.as_slice() {
        [first, _, ..] => function_header(first),
        _ => None,
    };

    let (name, variables) = match header {
        Some(h) => (Some(h.name), h.variables),
        None => (None, default_variables.to_vec()),
    };

    let mut body_scope = scope.clone();
    for v in &variables {
        body_scope.declare(v.clone());
    }
    let body = parse_tokens(last_segment(&tokens)?, &body_scope)?;

    Ok(FunctionalAnswer {
        name,
        variables,
        body,
    })
}

/// The header of `text` if it is written as `f(x, ...) = ...`.
pub fn detect_function_header(text: &str) -> Option<FunctionHeader> {
    let tokens = prepare(text).ok()?;
    match split_equation(&tokens).as_slice() {
        [first, _, ..] => function_header(first),
        _ => None,
    }
}

fn function_header(tokens: &[Token]) -> Option<FunctionHeader> {
    let (Token::Ident(name), Token::LParen) = (tokens.first()?, tokens.get(1)?) else {
        return None;
    };
    if tokens.last()? != &Token::RParen {
        return None;
    }
    let inner = &tokens[2..tokens.len() - 1];
    let mut variables = Vec::new();
    for (i, tok) in inner.iter().enumerate() {
        match (i % 2, tok) {
            (0, Token::Ident(v)) => variables.push(v.clone()),
            (1, Token::Comma) => {}
            _ => return None,
        }
    }
    if variables.is_empty() || inner.len() % 2 == 0 {
        return None;
    }
    Some(FunctionHeader {
        name: name.clone(),
        variables,
    })
}

/// Split tokens at top-level `=` signs.
fn split_equation(tokens: &[Token]) -> Vec<&[Token]> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::LParen | Token::LBrace | Token::LBracket => depth += 1,
            Token::RParen | Token::RBrace | Token::RBracket => depth -= 1,
            Token::Equals if depth == 0 => {
                segments.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&tokens[start..]);
    segments
}

fn last_segment(tokens: &[Token]) -> Result<&[Token], ParseError> {
    split_equation(tokens)
        .into_iter()
        .rev()
        .find(|s| !s.is_empty())
        .ok_or(ParseError::EmptyInput)
}

fn parse_tokens(tokens: &[Token], scope: &Scope) -> Result<Expr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        scope,
        depth: 0,
        abs_depth: 0,
    };
    let expr = parser.expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok @ (Token::RParen | Token::RBrace | Token::RBracket)) => Err(
            ParseError::UnbalancedDelimiters(format!("unmatched '{tok}'")),
        ),
        Some(tok) => Err(ParseError::UnexpectedToken(tok.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Recursive descent
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    scope: &'a Scope,
    depth: usize,
    abs_depth: usize,
}

type ParseResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested(|p| p.additive())
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    left = Expr::binary(BinaryOp::Mul, left, right);
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let right = self.unary()?;
                    left = Expr::binary(BinaryOp::Div, left, right);
                }
                _ if self.starts_factor() => {
                    let right = self.power()?;
                    left = Expr::binary(BinaryOp::Mul, left, right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.nested(|p| p.unary())?;
                Ok(Expr::neg(operand))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(|p| p.unary())
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> ParseResult<Expr> {
        let base = self.primary()?;
        if self.eat(&Token::Caret) {
            let exponent = self.nested(|p| p.unary())?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    /// Whether the next token can begin an implicitly multiplied factor.
    fn starts_factor(&self) -> bool {
        match self.peek() {
            Some(
                Token::Number(_)
                | Token::Ident(_)
                | Token::Const(_)
                | Token::Func(_)
                | Token::Frac
                | Token::Sqrt
                | Token::Command(_)
                | Token::LParen
                | Token::LBrace
                | Token::LBracket,
            ) => true,
            Some(Token::Pipe) => self.abs_depth == 0,
            _ => false,
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let Some(tok) = self.next() else {
            return Err(ParseError::UnexpectedEnd);
        };
        match tok {
            Token::Number(text) => self.number(text),
            Token::Const(c) => Ok(Expr::Constant(*c)),
            Token::Ident(name) => self.identifier(name),
            Token::Func(func) => self.nested(|p| p.function_call(*func)),
            Token::Frac => self.nested(|p| p.frac()),
            Token::Sqrt => self.nested(|p| p.sqrt()),
            Token::LParen => self.group(Token::RParen),
            Token::LBrace => self.group(Token::RBrace),
            Token::LBracket => self.group(Token::RBracket),
            Token::Pipe => {
                self.abs_depth += 1;
                let inner = self.expression();
                self.abs_depth -= 1;
                let inner = inner?;
                if !self.eat(&Token::Pipe) {
                    return Err(ParseError::UnbalancedDelimiters("unclosed '|'".into()));
                }
                Ok(Expr::call(Function::Abs, inner))
            }
            Token::Command(name) => {
                if DISALLOWED_COMMANDS.contains(&name.as_str()) {
                    Err(ParseError::DisallowedFunction(format!("\\{name}")))
                } else {
                    Err(ParseError::UnknownIdentifier(format!("\\{name}")))
                }
            }
            Token::RParen | Token::RBrace | Token::RBracket => Err(
                ParseError::UnbalancedDelimiters(format!("unexpected '{tok}'")),
            ),
            other => Err(ParseError::UnexpectedToken(other.to_string())),
        }
    }

    fn number(&self, text: &str) -> ParseResult<Expr> {
        let is_decimal = text.contains(['.', 'e', 'E']);
        if !is_decimal || self.scope.exact_decimals {
            if let Some(r) = Rational::from_decimal_str(text) {
                return Ok(Expr::Rational(r));
            }
        }
        text.parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(Expr::Float)
            .ok_or_else(|| ParseError::MalformedNumeral(text.to_string()))
    }

    fn identifier(&mut self, name: &str) -> ParseResult<Expr> {
        if self.scope.is_declared(name) {
            return Ok(Expr::symbol(name));
        }
        match name {
            "e" => return Ok(Expr::Constant(Constant::E)),
            "pi" => return Ok(Expr::Constant(Constant::Pi)),
            _ => {}
        }
        let called = self.peek() == Some(&Token::LParen);
        if called && DISALLOWED_FUNCTIONS.contains(&name) {
            return Err(ParseError::DisallowedFunction(name.to_string()));
        }
        // LaTeX writes products of single-letter names without operators: `mgh`.
        if name.len() > 1
            && name.chars().all(|c| c.is_ascii_alphabetic())
            && name.chars().all(|c| self.scope.is_declared(&c.to_string()))
        {
            let mut letters = name.chars().map(|c| Expr::symbol(c.to_string()));
            let first = letters.next().ok_or(ParseError::EmptyInput)?;
            return Ok(letters.fold(first, |acc, s| Expr::binary(BinaryOp::Mul, acc, s)));
        }
        if self.scope.allow_free {
            return Ok(Expr::symbol(name));
        }
        Err(ParseError::UnknownIdentifier(name.to_string()))
    }

    fn group(&mut self, close: Token) -> ParseResult<Expr> {
        let inner = self.expression()?;
        match self.next() {
            Some(tok) if *tok == close => Ok(inner),
            Some(tok) => Err(ParseError::UnbalancedDelimiters(format!(
                "expected '{close}' but found '{tok}'"
            ))),
            None => Err(ParseError::UnbalancedDelimiters(format!(
                "missing '{close}'"
            ))),
        }
    }

    /// A single atom used as a LaTeX argument: a group or one primary,
    /// optionally negated (`^-1`).
    fn script_operand(&mut self) -> ParseResult<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::neg(self.primary()?));
        }
        self.primary()
    }

    fn frac(&mut self) -> ParseResult<Expr> {
        // `\frac12` is one half.
        if let Some(Token::Number(text)) = self.peek() {
            if text.len() == 2 && text.chars().all(|c| c.is_ascii_digit()) {
                self.pos += 1;
                let digit = |i: usize| -> i128 {
                    text.as_bytes().get(i).map(|b| i128::from(b - b'0')).unwrap_or(0)
                };
                return Ok(Expr::binary(
                    BinaryOp::Div,
                    Expr::integer(digit(0)),
                    Expr::integer(digit(1)),
                ));
            }
        }
        let numerator = self.script_operand()?;
        let denominator = self.script_operand()?;
        Ok(Expr::binary(BinaryOp::Div, numerator, denominator))
    }

    fn sqrt(&mut self) -> ParseResult<Expr> {
        let index = if self.eat(&Token::LBracket) {
            Some(self.group(Token::RBracket)?)
        } else {
            None
        };
        let radicand = self.script_operand()?;
        Ok(match index {
            None => Expr::call(Function::Sqrt, radicand),
            Some(n) => Expr::binary(
                BinaryOp::Pow,
                radicand,
                Expr::binary(BinaryOp::Div, Expr::integer(1), n),
            ),
        })
    }

    fn function_call(&mut self, mut func: Function) -> ParseResult<Expr> {
        let base = if self.eat(&Token::Underscore) {
            if func != Function::Ln {
                return Err(ParseError::UnexpectedToken("_".into()));
            }
            Some(self.script_operand()?)
        } else {
            None
        };

        let mut power = None;
        if self.eat(&Token::Caret) {
            let exponent = self.script_operand()?;
            match (is_minus_one(&exponent), func.inverse()) {
                (true, Some(inverse)) => func = inverse,
                _ => power = Some(exponent),
            }
        }

        let arg = match self.peek() {
            Some(Token::LParen | Token::LBrace | Token::LBracket) => self.primary()?,
            // `\sin 2x` applies to the whole implicit product.
            Some(_) => {
                let mut arg = self.power()?;
                while self.starts_factor() && !matches!(self.peek(), Some(Token::Func(_))) {
                    let next = self.power()?;
                    arg = Expr::binary(BinaryOp::Mul, arg, next);
                }
                arg
            }
            None => return Err(ParseError::UnexpectedEnd),
        };

        let mut call = match base {
            Some(base) => Expr::binary(
                BinaryOp::Div,
                Expr::call(Function::Ln, arg),
                Expr::call(Function::Ln, base),
            ),
            None => Expr::call(func, arg),
        };
        if let Some(exponent) = power {
            call = Expr::binary(BinaryOp::Pow, call, exponent);
        }
        Ok(call)
    }
}

fn is_minus_one(expr: &Expr) -> bool {
    match expr {
        Expr::Neg(inner) => matches!(**inner, Expr::Rational(r) if r == Rational::ONE),
        Expr::Rational(r) => *r == Rational::integer(-1),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Numeric grammar
// ---------------------------------------------------------------------------

fn numeral_regex() -> &'static Regex {
    static NUMERAL: OnceLock<Regex> = OnceLock::new();
    NUMERAL.get_or_init(|| {
        Regex::new(
            r"(?x)^
            (?P<sign>[+-])?\s*
            (?P<mantissa>(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d*)?|\.\d+)
            (?:[eE](?P<exp>[+-]?\d+))?
            (?:\s*/\s*(?P<den>\d+(?:\.\d+)?(?:[eE][+-]?\d+)?))?
            (?:\s*(?:\*|x|×|·|\\times|\\cdot)\s*10\s*(?:\^|\*\*)\s*\{?\s*(?P<scale>[+-]?\d+)\s*\}?)?
            \s*(?P<rest>.*)$",
        )
        .expect("numeral pattern is valid")
    })
}

fn unit_regex() -> &'static Regex {
    static UNIT: OnceLock<Regex> = OnceLock::new();
    UNIT.get_or_init(|| {
        Regex::new(r"^[A-Za-zµμΩ°%][A-Za-z0-9µμΩ°%/^·*\s.\-]*$").expect("unit pattern is valid")
    })
}

/// `pi`, `e` and whitelisted functions after a numeral are factors, not units.
fn unit_is_math(unit: &str) -> bool {
    tokenize(unit).is_ok_and(|tokens| {
        tokens.iter().any(|t| match t {
            Token::Const(_) | Token::Func(_) => true,
            Token::Ident(name) => name == "e" || name == "pi",
            _ => false,
        })
    })
}

/// Strip math delimiters, thin spaces and equation prefixes from a numeral.
fn normalize_numeral_text(text: &str) -> String {
    let mut s = text
        .replace("{,}", ".")
        .replace("\\left", "")
        .replace("\\right", "")
        .replace(['$', '~'], "")
        .replace(['\n', '\r', '\t'], " ")
        .replace(['−', '–'], "-");
    for spacing in ["\\,", "\\;", "\\!", "\\:", "\\ "] {
        s = s.replace(spacing, "");
    }
    for eq in ["\\approx", "≈", "="] {
        if let Some(i) = s.rfind(eq) {
            s = s[i + eq.len()..].to_string();
        }
    }
    s.trim().to_string()
}

/// Strip `\text{...}` and similar wrappers from a unit.
fn normalize_unit(rest: &str) -> String {
    let mut s = rest.to_string();
    for wrapper in ["\\text", "\\mathrm", "\\textrm", "\\mbox", "\\rm"] {
        s = s.replace(wrapper, "");
    }
    s.replace(['{', '}'], "").trim().to_string()
}

/// Parse `text` with the numeric grammar alone.
///
/// Accepts an optional sign, digits with optional thousands separators, a
/// decimal point, an exponent, an `a/b` fraction, a `× 10^k` scale and a
/// trailing unit, which is recorded but not validated.
pub fn parse_numeric_solution(text: &str) -> Result<ParsedAnswer, ParseError> {
    let s = normalize_numeral_text(text);
    if s.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let malformed = || ParseError::MalformedNumeral(text.trim().to_string());
    let caps = numeral_regex().captures(&s).ok_or_else(malformed)?;

    let mantissa = caps
        .name("mantissa")
        .ok_or_else(malformed)?
        .as_str()
        .replace(',', "");
    let power_of_ten = |group: &str| -> Result<i32, ParseError> {
        caps.name(group)
            .map(|m| m.as_str().parse::<i32>())
            .transpose()
            .map(|p| p.unwrap_or(0))
            .map_err(|_| malformed())
    };
    let exponent = power_of_ten("exp")?
        .checked_add(power_of_ten("scale")?)
        .ok_or_else(malformed)?;
    // One literal so `6.02e23` reads exactly as Rust would read it.
    let mut value: f64 = format!("{mantissa}e{exponent}")
        .parse()
        .map_err(|_| malformed())?;
    if let Some(den) = caps.name("den") {
        let den: f64 = den.as_str().parse().map_err(|_| malformed())?;
        if den == 0.0 {
            return Err(malformed());
        }
        value /= den;
    }
    if caps.name("sign").is_some_and(|m| m.as_str() == "-") {
        value = -value;
    }
    if !value.is_finite() {
        return Err(malformed());
    }

    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
    let unit = normalize_unit(rest);
    let unit = if unit.is_empty() {
        None
    } else if unit_regex().is_match(&unit) && !unit_is_math(&unit) {
        Some(unit)
    } else {
        return Err(malformed());
    };

    Ok(ParsedAnswer::Numeric(NumericAnswer { value, unit }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict(names: &[&str]) -> Scope {
        Scope::strict(names.iter().copied())
    }

    fn show(text: &str, names: &[&str]) -> String {
        parse_expression(text, &strict(names)).unwrap().to_string()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(show("1 + 2 * 3", &[]), "(1 + (2 * 3))");
        assert_eq!(show("2^3^2", &[]), "(2 ^ (3 ^ 2))");
        assert_eq!(show("-x^2", &["x"]), "-((x ^ 2))");
        assert_eq!(show("a - b - c", &["a", "b", "c"]), "((a - b) - c)");
        assert_eq!(show("2**x", &["x"]), "(2 ^ x)");
    }

    #[test]
    fn implicit_multiplication() {
        assert_eq!(show("2x", &["x"]), "(2 * x)");
        assert_eq!(show("m g h", &["m", "g", "h"]), "((m * g) * h)");
        assert_eq!(show("mgh", &["m", "g", "h"]), "((m * g) * h)");
        assert_eq!(show("(a+1)(a-1)", &["a"]), "((a + 1) * (a - 1))");
        assert_eq!(show("2\\pi r", &["r"]), "((2 * pi) * r)");
    }

    #[test]
    fn latex_fractions_and_roots() {
        assert_eq!(show(r"\frac{m g}{k}", &["m", "g", "k"]), "((m * g) / k)");
        assert_eq!(show(r"\frac12", &[]), "(1 / 2)");
        assert_eq!(show(r"\sqrt{\frac{g}{L}}", &["g", "L"]), "sqrt((g / L))");
        assert_eq!(show(r"\sqrt[3]{x}", &["x"]), "(x ^ (1 / 3))");
        assert_eq!(show(r"\dfrac{1}{2} m v^2", &["m", "v"]), "(((1 / 2) * m) * (v ^ 2))");
    }

    #[test]
    fn function_forms() {
        assert_eq!(show(r"\sin x", &["x"]), "sin(x)");
        assert_eq!(show(r"\sin 2x", &["x"]), "sin((2 * x))");
        assert_eq!(show(r"\sin^2(x)", &["x"]), "(sin(x) ^ 2)");
        assert_eq!(show(r"\sin^{-1}(x)", &["x"]), "arcsin(x)");
        assert_eq!(show(r"\log_{2}(x)", &["x"]), "(ln(x) / ln(2))");
        assert_eq!(show("exp(-t)", &["t"]), "exp(-(t))");
        assert_eq!(show("|x - 1|", &["x"]), "abs((x - 1))");
        assert_eq!(show(r"e^{-x}", &["x"]), "(e ^ -(x))");
    }

    #[test]
    fn decimals_are_approximate_unless_exact() {
        assert_eq!(
            parse_expression("2.5", &Scope::default()).unwrap(),
            Expr::Float(2.5)
        );
        let exact = Scope::default().with_exact_decimals();
        assert_eq!(
            parse_expression("2.5", &exact).unwrap(),
            Expr::Rational(Rational::new(5, 2).unwrap())
        );
    }

    #[test]
    fn error_kinds() {
        let s = strict(&["x"]);
        assert_eq!(parse_expression("   ", &s), Err(ParseError::EmptyInput));
        assert!(matches!(
            parse_expression("(x + 1", &s),
            Err(ParseError::UnbalancedDelimiters(_))
        ));
        assert!(matches!(
            parse_expression("x + 1)", &s),
            Err(ParseError::UnbalancedDelimiters(_))
        ));
        assert_eq!(
            parse_expression("blah", &s),
            Err(ParseError::UnknownIdentifier("blah".into()))
        );
        assert_eq!(
            parse_expression("1.2.3", &s),
            Err(ParseError::MalformedNumeral("1.2.3".into()))
        );
        assert_eq!(
            parse_expression("erf(x)", &s),
            Err(ParseError::DisallowedFunction("erf".into()))
        );
        assert_eq!(
            parse_expression(r"\int x", &s),
            Err(ParseError::DisallowedFunction("\\int".into()))
        );
        assert_eq!(parse_expression("x +", &s), Err(ParseError::UnexpectedEnd));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}x{}", "(".repeat(500), ")".repeat(500));
        assert_eq!(
            parse_expression(&deep, &strict(&["x"])),
            Err(ParseError::TooDeep(MAX_DEPTH))
        );
    }

    #[test]
    fn permissive_scope_keeps_free_symbols() {
        let expr = parse_expression("k x", &Scope::permissive(["x"])).unwrap();
        assert_eq!(expr.symbols().into_iter().collect::<Vec<_>>(), vec!["k", "x"]);
    }

    #[test]
    fn functional_headers() {
        let f = parse_functional("f(x) = x^2", &Scope::default(), &[]).unwrap();
        assert_eq!(f.name.as_deref(), Some("f"));
        assert_eq!(f.variables, vec!["x"]);

        let g = parse_functional("u(x, t) = x t", &Scope::default(), &[]).unwrap();
        assert_eq!(g.variables, vec!["x", "t"]);

        let bare = parse_functional("x^2 + 1", &Scope::default(), &["x".to_string()]).unwrap();
        assert_eq!(bare.name, None);
        assert_eq!(bare.variables, vec!["x"]);

        assert!(detect_function_header("y(x) = 3").is_some());
        assert!(detect_function_header("2(x) = 3").is_none());
        assert!(detect_function_header("x^2").is_none());
    }

    #[test]
    fn equations_take_last_side() {
        let s = strict(&["m", "c"]);
        let a = parse_answer("E = m c^2", AnswerKind::Symbolic, &s, &[]).unwrap();
        assert_eq!(a, ParsedAnswer::Symbolic(parse_expression("m c^2", &s).unwrap()));
    }

    #[test]
    fn numeric_grammar() {
        let value = |t: &str| match parse_numeric_solution(t).unwrap() {
            ParsedAnswer::Numeric(n) => (n.value, n.unit),
            other => panic!("expected numeric, got {other:?}"),
        };
        assert_eq!(value("42"), (42.0, None));
        assert_eq!(value("-3.5"), (-3.5, None));
        assert_eq!(value("1,234.5"), (1234.5, None));
        assert_eq!(value("6.02e23").0, 6.02e23);
        assert_eq!(value("3/4"), (0.75, None));
        assert_eq!(value(r"3 \times 10^{8} \text{ m/s}"), (3e8, Some("m/s".to_string())));
        assert_eq!(value("2.5×10^-3").0, 2.5e-3);
        assert_eq!(value("$x = 12.5$ kg"), (12.5, Some("kg".to_string())));
        assert_eq!(value("3{,}14").0, 3.14);
        assert_eq!(value("1/2e3"), (5e-4, None));
        assert_eq!(value("2 eV"), (2.0, Some("eV".to_string())));
    }

    #[test]
    fn constants_and_functions_are_not_units() {
        for text in ["2 pi", "5 e", "3 sin x", "4 ln 2", "2e"] {
            assert!(
                matches!(parse_numeric_solution(text), Err(ParseError::MalformedNumeral(_))),
                "{text}"
            );
        }
        let answer = parse_answer("2 pi", AnswerKind::Numeric, &Scope::default(), &[]).unwrap();
        assert_eq!(
            answer,
            ParsedAnswer::Symbolic(parse_expression("2 pi", &Scope::default()).unwrap())
        );
    }

    #[test]
    fn numeric_grammar_rejects() {
        assert_eq!(parse_numeric_solution(""), Err(ParseError::EmptyInput));
        assert!(matches!(
            parse_numeric_solution("1.2.3"),
            Err(ParseError::MalformedNumeral(_))
        ));
        assert!(matches!(
            parse_numeric_solution("1/0"),
            Err(ParseError::MalformedNumeral(_))
        ));
        assert!(matches!(
            parse_numeric_solution("about five"),
            Err(ParseError::MalformedNumeral(_))
        ));
    }

    #[test]
    fn numeric_answer_falls_back_to_expressions() {
        let s = strict(&["x"]);
        let a = parse_answer(r"\frac{\sqrt{3}}{2}", AnswerKind::Numeric, &s, &[]).unwrap();
        assert!(matches!(a, ParsedAnswer::Symbolic(_)));

        // `2 x` is a product when x is declared, not 2 with unit x.
        let a = parse_answer("2 x", AnswerKind::Numeric, &s, &[]).unwrap();
        assert!(matches!(a, ParsedAnswer::Symbolic(_)));
    }
}
