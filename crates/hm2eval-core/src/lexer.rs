//! Tokenizer for plain-text and LaTeX math.
//!
//! Model answers arrive in every notation between `sqrt(g/L)` and
//! `\sqrt{\frac{g}{L}}`. The lexer folds both into a single token stream:
//! LaTeX commands are interpreted here (Greek letters become identifiers,
//! `\frac` and `\sqrt` become structural tokens, spacing commands vanish),
//! so the parser sees one grammar.

use std::fmt;

use crate::error::ParseError;
use crate::expr::{Constant, Function};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeral text as written, e.g. `6.02e23`.
    Number(String),
    /// An identifier, with any subscript folded in (`v_max`).
    Ident(String),
    Func(Function),
    Const(Constant),
    Frac,
    Sqrt,
    /// Content of `\text{...}` and friends.
    Text(String),
    /// A LaTeX command the lexer does not interpret (`\int`, `\infty`).
    Command(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Underscore,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Pipe,
    Comma,
    Equals,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(s) | Token::Ident(s) => f.write_str(s),
            Token::Func(func) => write!(f, "{func}"),
            Token::Const(c) => write!(f, "{c}"),
            Token::Frac => f.write_str("\\frac"),
            Token::Sqrt => f.write_str("\\sqrt"),
            Token::Text(s) => write!(f, "\\text{{{s}}}"),
            Token::Command(s) => write!(f, "\\{s}"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::Underscore => f.write_str("_"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Pipe => f.write_str("|"),
            Token::Comma => f.write_str(","),
            Token::Equals => f.write_str("="),
        }
    }
}

/// LaTeX commands that only affect layout.
const IGNORED_COMMANDS: &[&str] = &[
    "left", "right", "big", "Big", "bigg", "Bigg", "bigl", "bigr", "Bigl", "Bigr", "biggl",
    "biggr", "Biggl", "Biggr", "displaystyle", "textstyle", "limits", "nonumber", "quad",
    "qquad", "rm", ",", ";", ":", "!", " ",
];

fn greek_name(command: &str) -> Option<&'static str> {
    Some(match command {
        "alpha" => "alpha",
        "beta" => "beta",
        "gamma" => "gamma",
        "delta" => "delta",
        "epsilon" | "varepsilon" => "epsilon",
        "zeta" => "zeta",
        "eta" => "eta",
        "theta" | "vartheta" => "theta",
        "iota" => "iota",
        "kappa" => "kappa",
        "lambda" => "lambda",
        "mu" => "mu",
        "nu" => "nu",
        "xi" => "xi",
        "rho" | "varrho" => "rho",
        "sigma" => "sigma",
        "tau" => "tau",
        "upsilon" => "upsilon",
        "phi" | "varphi" => "phi",
        "chi" => "chi",
        "psi" => "psi",
        "omega" => "omega",
        "Gamma" => "Gamma",
        "Delta" => "Delta",
        "Theta" => "Theta",
        "Lambda" => "Lambda",
        "Xi" => "Xi",
        "Sigma" => "Sigma",
        "Phi" => "Phi",
        "Psi" => "Psi",
        "Omega" => "Omega",
        "hbar" => "hbar",
        "ell" => "ell",
        _ => return None,
    })
}

fn greek_char(c: char) -> Option<&'static str> {
    Some(match c {
        'α' => "alpha",
        'β' => "beta",
        'γ' => "gamma",
        'δ' => "delta",
        'ε' | 'ϵ' => "epsilon",
        'θ' => "theta",
        'κ' => "kappa",
        'λ' => "lambda",
        'μ' => "mu",
        'ν' => "nu",
        'ρ' => "rho",
        'σ' => "sigma",
        'τ' => "tau",
        'φ' | 'ϕ' => "phi",
        'ω' => "omega",
        'Δ' => "Delta",
        'Ω' => "Omega",
        'ħ' => "hbar",
        _ => return None,
    })
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

/// Split `input` into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '$' | '&' | '~') {
                self.pos += 1;
                continue;
            }
            if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
            {
                self.number()?;
                continue;
            }
            if c.is_ascii_alphabetic() {
                let word = self.word();
                self.identifier(word);
                continue;
            }
            if let Some(name) = greek_char(c) {
                self.pos += 1;
                self.identifier(name.to_string());
                continue;
            }
            if c == '\\' {
                self.command()?;
                continue;
            }
            self.pos += 1;
            let token = match c {
                '+' => Token::Plus,
                '-' | '−' | '–' => Token::Minus,
                '*' if self.peek() == Some('*') => {
                    self.pos += 1;
                    Token::Caret
                }
                '*' | '×' | '·' | '⋅' | '∙' => Token::Star,
                '/' | '÷' => Token::Slash,
                '^' => Token::Caret,
                '_' => Token::Underscore,
                '(' => Token::LParen,
                ')' => Token::RParen,
                '{' => Token::LBrace,
                '}' => Token::RBrace,
                '[' => Token::LBracket,
                ']' => Token::RBracket,
                '|' => Token::Pipe,
                ',' => Token::Comma,
                '=' | '≈' | '≃' | '∼' => Token::Equals,
                'π' => Token::Const(Constant::Pi),
                '√' => Token::Sqrt,
                '∞' => Token::Command("infty".into()),
                '²' | '³' => {
                    self.tokens.push(Token::Caret);
                    Token::Number(if c == '²' { "2" } else { "3" }.into())
                }
                other => return Err(ParseError::UnexpectedToken(other.to_string())),
            };
            self.tokens.push(token);
        }
        Ok(())
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        self.digits();
        if self.peek() == Some('.') {
            self.pos += 1;
            self.digits();
        }
        let has_exponent = matches!(self.peek(), Some('e' | 'E'))
            && match self.peek_at(1) {
                Some(d) if d.is_ascii_digit() => true,
                Some('+' | '-') => self.peek_at(2).is_some_and(|d| d.is_ascii_digit()),
                _ => false,
            };
        if has_exponent {
            self.pos += 2;
            self.digits();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
            self.pos += 1;
            self.digits();
            let text: String = self.chars[start..self.pos].iter().collect();
            return Err(ParseError::MalformedNumeral(text));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token::Number(text));
        Ok(())
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Emit an identifier-like word, folding in a trailing subscript.
    fn identifier(&mut self, word: String) {
        if let Some(func) = Function::from_name(&word) {
            self.tokens.push(Token::Func(func));
            return;
        }
        let name = match self.subscript() {
            Some(sub) if !sub.is_empty() => format!("{word}_{sub}"),
            _ => word,
        };
        self.tokens.push(Token::Ident(name));
    }

    /// Consume `_x` or `_{...}` and return its normalized text.
    fn subscript(&mut self) -> Option<String> {
        if self.peek() != Some('_') {
            return None;
        }
        self.pos += 1;
        let raw = match self.peek() {
            Some('{') => self.brace_group().unwrap_or_default(),
            Some('\\') => {
                self.pos += 1;
                self.word()
            }
            Some(c) if c.is_ascii_alphanumeric() => {
                self.pos += 1;
                c.to_string()
            }
            _ => String::new(),
        };
        Some(normalize_subscript(&raw))
    }

    /// Read a `{...}` group starting at the current `{`, returning its inner
    /// text. Returns `None` (consuming nothing) when not at a brace.
    fn brace_group(&mut self) -> Option<String> {
        if self.peek() != Some('{') {
            return None;
        }
        let start = self.pos + 1;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(self.chars[start..self.pos - 1].iter().collect());
                    }
                }
                _ => {}
            }
        }
        // Unclosed group: take the rest.
        Some(self.chars[start..].iter().collect())
    }

    fn command(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        let name = match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                    self.pos += 1;
                }
                self.chars[start..self.pos].iter().collect::<String>()
            }
            Some(c) => {
                self.pos += 1;
                c.to_string()
            }
            None => return Err(ParseError::UnexpectedEnd),
        };

        if IGNORED_COMMANDS.contains(&name.as_str()) {
            if matches!(name.as_str(), "left" | "right") && self.peek() == Some('.') {
                self.pos += 1;
            }
            return Ok(());
        }

        let token = match name.as_str() {
            "frac" | "dfrac" | "tfrac" | "cfrac" => Token::Frac,
            "sqrt" => Token::Sqrt,
            "cdot" | "times" | "ast" => Token::Star,
            "div" => Token::Slash,
            "pi" => Token::Const(Constant::Pi),
            "approx" | "simeq" | "sim" | "equiv" => Token::Equals,
            "{" => Token::LBrace,
            "}" => Token::RBrace,
            "|" => Token::Pipe,
            "text" | "textrm" | "textit" | "textbf" | "mbox" => {
                Token::Text(self.brace_group().unwrap_or_default())
            }
            "mathrm" | "mathit" | "mathbf" | "mathsf" | "operatorname" => {
                let content = self.brace_group().unwrap_or_default();
                let content = content.trim();
                if let Some(func) = Function::from_name(content) {
                    Token::Func(func)
                } else if content == "e" {
                    Token::Const(Constant::E)
                } else if !content.is_empty()
                    && content.chars().all(|c| c.is_ascii_alphanumeric())
                {
                    self.identifier(content.to_string());
                    return Ok(());
                } else {
                    Token::Text(content.to_string())
                }
            }
            other => {
                if let Some(func) = Function::from_name(other) {
                    Token::Func(func)
                } else if let Some(greek) = greek_name(other) {
                    self.identifier(greek.to_string());
                    return Ok(());
                } else {
                    Token::Command(other.to_string())
                }
            }
        };
        self.tokens.push(token);
        Ok(())
    }
}

fn normalize_subscript(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}
