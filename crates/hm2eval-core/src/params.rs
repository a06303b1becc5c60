//! Parameter bindings.
//!
//! A problem instance comes with a string such as
//! `m = 2, g = 9.81, k = 2 m` or a JSON object `{"m": 2, "g": "9.81"}`.
//! Values may refer to other parameters; [`Bindings::resolve`] closes them
//! so every resolved value is an expression with no symbols left.

use std::collections::{BTreeMap, HashMap};

use crate::error::{BindingError, ParseError};
use crate::expr::{Expr, ParsedAnswer};
use crate::lexer::{tokenize, Token};
use crate::parser::{parse_expression, parse_numeric_solution, Scope};
use crate::rational::Rational;

/// Parsed but unresolved bindings, in the order they were written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Vec<(String, Expr)>,
}

/// Bindings whose values no longer reference other parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedBindings {
    values: BTreeMap<String, Expr>,
}

impl Bindings {
    /// Parse a bindings string. Empty input (or `None` / `null`) yields no
    /// bindings.
    pub fn parse(text: &str) -> Result<Self, BindingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() || matches!(trimmed, "None" | "null" | "{}") {
            return Ok(Self::default());
        }
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Ok(map) =
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(trimmed)
            {
                return Self::from_json(map);
            }
        }

        let raw_pairs = split_pairs(&trimmed.replace('$', ""))?;
        let names: Vec<String> = raw_pairs
            .iter()
            .map(|(name, _)| normalize_name(name))
            .collect::<Result<_, _>>()?;

        let mut bindings = Self::default();
        for (name, (_, value)) in names.iter().zip(&raw_pairs) {
            let expr = parse_value(name, value, &names)?;
            bindings.insert(name.clone(), expr)?;
        }
        Ok(bindings)
    }

    fn from_json(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, BindingError> {
        let mut raw = Vec::with_capacity(map.len());
        for (key, value) in map {
            let text = match value {
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::String(s) => s,
                other => {
                    return Err(BindingError::Json(format!(
                        "value of '{key}' must be a number or string, got {other}"
                    )))
                }
            };
            raw.push((normalize_name(&key)?, text));
        }
        let names: Vec<String> = raw.iter().map(|(n, _)| n.clone()).collect();
        let mut bindings = Self::default();
        for (name, text) in raw {
            let expr = parse_value(&name, &text, &names)?;
            bindings.insert(name, expr)?;
        }
        Ok(bindings)
    }

    fn insert(&mut self, name: String, expr: Expr) -> Result<(), BindingError> {
        if self.entries.iter().any(|(n, _)| *n == name) {
            return Err(BindingError::DuplicateName(name));
        }
        self.entries.push((name, expr));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// Substitute parameters into each other until every value is closed.
    pub fn resolve(&self) -> Result<ResolvedBindings, BindingError> {
        let raw: HashMap<&str, &Expr> = self.entries.iter().map(|(n, e)| (n.as_str(), e)).collect();
        let mut resolver = Resolver {
            raw,
            done: BTreeMap::new(),
            visiting: Vec::new(),
        };
        for (name, _) in &self.entries {
            resolver.resolve(name)?;
        }
        Ok(ResolvedBindings {
            values: resolver.done,
        })
    }
}

struct Resolver<'a> {
    raw: HashMap<&'a str, &'a Expr>,
    done: BTreeMap<String, Expr>,
    visiting: Vec<String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Expr, BindingError> {
        if let Some(value) = self.done.get(name) {
            return Ok(value.clone());
        }
        if self.visiting.iter().any(|n| n == name) {
            return Err(BindingError::Cycle(name.to_string()));
        }
        let expr = *self
            .raw
            .get(name)
            .ok_or_else(|| BindingError::Unbound(name.to_string()))?;

        self.visiting.push(name.to_string());
        let resolved = expr.try_substitute(&mut |sym: &str| self.resolve(sym).map(Some));
        self.visiting.pop();

        let resolved = resolved?;
        self.done.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }
}

impl ResolvedBindings {
    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.values.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Split `a = 1, b = 2; c = 3 and d = 4` into raw `(name, value)` pairs.
fn split_pairs(text: &str) -> Result<Vec<(String, String)>, BindingError> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth -= 1,
            _ => {}
        }
        if depth == 0 && matches!(c, ',' | ';' | '\n') {
            segments.push(std::mem::take(&mut current));
            i += 1;
            continue;
        }
        if depth == 0 && c.is_whitespace() && is_and_at(&chars, i + 1) {
            segments.push(std::mem::take(&mut current));
            i += 4;
            continue;
        }
        current.push(c);
        i += 1;
    }
    segments.push(current);

    let mut pairs: Vec<(String, String)> = Vec::new();
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match split_assignment(segment) {
            Some((name, value)) => pairs.push((name.to_string(), value.to_string())),
            // `m = 1,000`: a bare digit group continues the previous value.
            None if segment.chars().all(|c| c.is_ascii_digit()) && !pairs.is_empty() => {
                if let Some((_, value)) = pairs.last_mut() {
                    value.push_str(segment);
                }
            }
            None => return Err(BindingError::MalformedPair(segment.to_string())),
        }
    }
    Ok(pairs)
}

fn is_and_at(chars: &[char], i: usize) -> bool {
    let word: String = chars.iter().skip(i).take(3).collect();
    word.eq_ignore_ascii_case("and") && chars.get(i + 3).is_some_and(|c| c.is_whitespace())
}

fn split_assignment(segment: &str) -> Option<(&str, &str)> {
    let (name, value) = segment
        .split_once('=')
        .or_else(|| segment.split_once(':'))?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Canonical form of a parameter name: the identifier the lexer produces
/// for it, so `v_{max}`, `v_max` and `\omega` match answers.
fn normalize_name(name: &str) -> Result<String, BindingError> {
    let malformed = || BindingError::MalformedPair(name.to_string());
    match tokenize(name.trim()).map_err(|_| malformed())?.as_slice() {
        [Token::Ident(ident)] => Ok(ident.clone()),
        _ => Err(malformed()),
    }
}

/// Parse one value. Decimals are exact. A value that only parses once its
/// trailing unit is dropped (`9.81 m/s^2`) becomes an approximate number.
fn parse_value(name: &str, text: &str, names: &[String]) -> Result<Expr, BindingError> {
    let strict = Scope::strict(names.iter().cloned()).with_exact_decimals();
    let strict_err = match parse_expression(text, &strict) {
        Ok(expr) => return Ok(expr),
        Err(e) => e,
    };
    if let Ok(ParsedAnswer::Numeric(n)) = parse_numeric_solution(text) {
        return Ok(exact_or_float(n.value));
    }
    // Let resolution report references to unknown parameters as unbound.
    if matches!(strict_err, ParseError::UnknownIdentifier(_)) {
        let permissive = Scope::permissive(names.iter().cloned()).with_exact_decimals();
        if let Ok(expr) = parse_expression(text, &permissive) {
            return Ok(expr);
        }
    }
    Err(BindingError::Value {
        name: name.to_string(),
        source: strict_err,
    })
}

fn exact_or_float(value: f64) -> Expr {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Expr::Rational(Rational::integer(value as i128))
    } else {
        Expr::Float(value)
    }
}
