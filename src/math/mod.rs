//! Symbolic math-answer equivalence.
//!
//! The scorer only depends on the [`MathEquivalence`] contract: parse two answers into a
//! comparable form, then decide whether they are the same value. [`LatexMath`] is the
//! built-in implementation: it normalises the LaTeX presentation, parses each answer
//! element into an [`Expr`] tree and compares trees numerically at fixed sample points,
//! so `7+8` and `15` or `\frac{1}{2}` and `0.5` are equivalent while `-1` and `15` are not.

mod lexer;
mod parser;


use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub use parser::{Expr, Func};

use crate::constants::BOXED_MARKER;

/// Relative tolerance used when comparing evaluated expressions.
pub const EQUIVALENCE_TOLERANCE: f64 = 1e-6;

const SAMPLE_VALUES: [f64; 10] = [
    0.5377, 1.8339, -2.2588, 0.8622, 0.3188, -1.3077, -0.4336, 0.3426, 3.5784, 2.7694,
];
const SAMPLE_TRIALS: usize = 3;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct MathError(pub String);

/// Contract of a math-equivalence backend.
pub trait MathEquivalence: Send + Sync {
    /// Parses an answer into its comparable form; `None` if nothing usable remains.
    fn parse(&self, text: &str) -> Option<ParsedAnswer>;

    /// Returns `true` if both answers denote the same mathematical value.
    fn verify(&self, gold: &ParsedAnswer, prediction: &ParsedAnswer) -> bool;
}

/// One element of an answer (answers like `(1, 2)` have several).
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerElement {
    /// Normalised text with whitespace removed.
    pub text: String,
    /// Parsed tree, absent when the element is not an expression we understand.
    pub expr: Option<Expr>,
}

/// Normal form of a parsed answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnswer {
    pub elements: Vec<AnswerElement>,
    /// Enclosing brackets of a tuple or interval, e.g. `('(', ']')`.
    pub delimiters: Option<(char, char)>,
}

/// Built-in LaTeX-subset backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexMath;

impl MathEquivalence for LatexMath {
    fn parse(&self, text: &str) -> Option<ParsedAnswer> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }

        let (body, delimiters) = split_delimiters(&normalized);
        let elements = split_top_level(body, ',')
            .into_iter()
            .map(|part| {
                let part = part.trim();
                AnswerElement {
                    text: part.chars().filter(|c| !c.is_whitespace()).collect(),
                    expr: lexer::tokenize(part)
                        .and_then(parser::parse_expression)
                        .ok(),
                }
            })
            .filter(|element| !element.text.is_empty())
            .collect::<Vec<_>>();

        if elements.is_empty() {
            return None;
        }

        Some(ParsedAnswer {
            elements,
            delimiters,
        })
    }

    fn verify(&self, gold: &ParsedAnswer, prediction: &ParsedAnswer) -> bool {
        if gold.elements.len() != prediction.elements.len() {
            return false;
        }
        if gold.elements.len() > 1 && gold.delimiters != prediction.delimiters {
            return false;
        }

        gold.elements
            .iter()
            .zip(&prediction.elements)
            .all(|(g, p)| elements_equivalent(g, p))
    }
}

fn elements_equivalent(gold: &AnswerElement, prediction: &AnswerElement) -> bool {
    if gold.text == prediction.text {
        return true;
    }
    match (&gold.expr, &prediction.expr) {
        (Some(g), Some(p)) => expressions_equivalent(g, p),
        _ => false,
    }
}

/// Compares two trees at deterministic sample points.
///
/// Both sides share one binding per variable name. A trial where both sides are
/// undefined is skipped; at least one defined trial must agree and none may disagree.
pub fn expressions_equivalent(a: &Expr, b: &Expr) -> bool {
    let mut variables = a.variables();
    variables.extend(b.variables());

    let trials = if variables.is_empty() { 1 } else { SAMPLE_TRIALS };
    let mut agreed = 0;

    for trial in 0..trials {
        let env: HashMap<String, f64> = variables
            .iter()
            .enumerate()
            .map(|(j, name)| {
                (
                    name.clone(),
                    SAMPLE_VALUES[(trial * 3 + j) % SAMPLE_VALUES.len()],
                )
            })
            .collect();

        let (x, y) = (a.eval(&env), b.eval(&env));
        match (x.is_nan(), y.is_nan()) {
            (true, true) => continue,
            (false, false) if approx_eq(x, y) => agreed += 1,
            _ => return false,
        }
    }

    agreed > 0
}

fn approx_eq(a: f64, b: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= EQUIVALENCE_TOLERANCE * scale
}

static TEXT_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:text|textbf|textrm|mathrm|mbox|operatorname)\s*\{([^{}]*)\}")
        .expect("text group pattern is valid")
});

static THOUSANDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d{1,3}(?:,\d{3})+(?:\.\d+)?$").expect("thousands pattern is valid")
});

/// Strips presentation-only LaTeX and reduces an equation to its right-hand side.
pub fn normalize(text: &str) -> String {
    let mut s = unwrap_boxed(text.trim()).to_string();

    for (from, to) in [
        ("\\dfrac", "\\frac"),
        ("\\tfrac", "\\frac"),
        ("\\left", ""),
        ("\\right", ""),
        ("^{\\circ}", ""),
        ("^\\circ", ""),
        ("\\circ", ""),
        ("\\%", ""),
        ("%", ""),
        ("\\$", ""),
        ("$", ""),
        ("\\!", ""),
        ("\\,", ""),
        ("\\;", ""),
        ("\\:", ""),
        ("\\ ", " "),
        ("~", " "),
    ] {
        s = s.replace(from, to);
    }

    // Text groups after a value are units; a bare text group is the answer itself.
    let without_text = TEXT_GROUP.replace_all(&s, "").trim().to_string();
    s = if without_text.is_empty() {
        TEXT_GROUP.replace_all(&s, "$1").into_owned()
    } else {
        without_text
    };

    if let Some((_, rhs)) = s.rsplit_once('=') {
        s = rhs.to_string();
    }

    let s = s.trim().trim_end_matches('.').trim();
    if THOUSANDS.is_match(s) {
        return s.replace(',', "");
    }
    s.to_string()
}

fn unwrap_boxed(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(BOXED_MARKER) else {
        return text;
    };
    let rest = rest.trim_start();
    match rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        Some(inner) => inner,
        None => rest,
    }
}

fn split_delimiters(s: &str) -> (&str, Option<(char, char)>) {
    let mut chars = s.chars();
    let (Some(open), Some(close)) = (chars.next(), chars.next_back()) else {
        return (s, None);
    };
    if !matches!(open, '(' | '[') || !matches!(close, ')' | ']') {
        return (s, None);
    }
    let inner = &s[open.len_utf8()..s.len() - close.len_utf8()];
    if split_top_level(inner, ',').len() < 2 || !is_balanced(inner) {
        return (s, None);
    }
    (inner, Some((open, close)))
}

fn is_balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn split_top_level(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}
