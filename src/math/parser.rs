use std::collections::{BTreeSet, HashMap};

use super::MathError;
use super::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Ln,
    Exp,
}

impl Func {
    fn from_command(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            "ln" | "log" => Some(Func::Ln),
            "exp" => Some(Func::Exp),
            _ => None,
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Ln => x.ln(),
            Func::Exp => x.exp(),
        }
    }
}

/// Parsed math expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Root(Box<Expr>, Box<Expr>),
    Factorial(Box<Expr>),
    Call(Func, Box<Expr>),
}

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "rho", "sigma", "tau", "phi",
    "varphi", "chi", "psi", "omega",
];

impl Expr {
    /// Evaluates with `env` bindings; unbound variables and domain errors yield NaN.
    pub fn eval(&self, env: &HashMap<String, f64>) -> f64 {
        match self {
            Expr::Num(v) => *v,
            Expr::Var(name) => env.get(name).copied().unwrap_or(f64::NAN),
            Expr::Neg(inner) => -inner.eval(env),
            Expr::Add(l, r) => l.eval(env) + r.eval(env),
            Expr::Sub(l, r) => l.eval(env) - r.eval(env),
            Expr::Mul(l, r) => l.eval(env) * r.eval(env),
            Expr::Div(l, r) => {
                let denominator = r.eval(env);
                if denominator == 0.0 {
                    return f64::NAN;
                }
                l.eval(env) / denominator
            }
            Expr::Pow(base, exponent) => base.eval(env).powf(exponent.eval(env)),
            Expr::Root(index, radicand) => {
                let n = index.eval(env);
                let x = radicand.eval(env);
                if n == 2.0 {
                    x.sqrt()
                } else if x < 0.0 && n.fract() == 0.0 && (n as i64) % 2 == 1 {
                    -(-x).powf(1.0 / n)
                } else {
                    x.powf(1.0 / n)
                }
            }
            Expr::Factorial(inner) => factorial(inner.eval(env)),
            Expr::Call(func, arg) => func.apply(arg.eval(env)),
        }
    }

    /// Names of every free variable.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                vars.insert(name.clone());
            }
            Expr::Neg(inner) | Expr::Factorial(inner) | Expr::Call(_, inner) => {
                inner.collect_variables(vars)
            }
            Expr::Add(l, r)
            | Expr::Sub(l, r)
            | Expr::Mul(l, r)
            | Expr::Div(l, r)
            | Expr::Pow(l, r)
            | Expr::Root(l, r) => {
                l.collect_variables(vars);
                r.collect_variables(vars);
            }
        }
    }
}

fn factorial(n: f64) -> f64 {
    if n < 0.0 || n.fract() != 0.0 || n > 170.0 {
        return f64::NAN;
    }
    (1..=n as u64).fold(1.0, |acc, k| acc * k as f64)
}

/// Deepest recursion the parser accepts before giving up on an answer.
pub(crate) const MAX_NESTING: usize = 256;

/// Longest token stream accepted; bounds the height of left-associative chains.
pub(crate) const MAX_TOKENS: usize = 1024;

pub(crate) fn parse_expression(tokens: Vec<Token>) -> Result<Expr, MathError> {
    if tokens.len() > MAX_TOKENS {
        return Err(MathError("expression too long".to_string()));
    }
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    if !parser.is_done() {
        return Err(MathError("unexpected trailing tokens".to_string()));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), MathError> {
        if self.match_token(expected) {
            Ok(())
        } else {
            Err(MathError(format!(
                "expected {:?}, got {:?}",
                expected,
                self.peek()
            )))
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, MathError>,
    ) -> Result<T, MathError> {
        if self.depth >= MAX_NESTING {
            return Err(MathError("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn match_command(&mut self, names: &[&str]) -> bool {
        match self.peek() {
            Some(Token::Command(name)) if names.contains(&name.as_str()) => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, MathError> {
        let mut expr = self.parse_term()?;
        loop {
            if self.match_token(&Token::Plus) {
                let rhs = self.parse_term()?;
                expr = Expr::Add(Box::new(expr), Box::new(rhs));
            } else if self.match_token(&Token::Minus) {
                let rhs = self.parse_term()?;
                expr = Expr::Sub(Box::new(expr), Box::new(rhs));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_term(&mut self) -> Result<Expr, MathError> {
        let mut expr = self.parse_unary()?;
        loop {
            if self.match_token(&Token::Star) || self.match_command(&["cdot", "times", "ast"]) {
                let rhs = self.parse_unary()?;
                expr = Expr::Mul(Box::new(expr), Box::new(rhs));
            } else if self.match_token(&Token::Slash) || self.match_command(&["div"]) {
                let rhs = self.parse_unary()?;
                expr = Expr::Div(Box::new(expr), Box::new(rhs));
            } else if self.starts_primary() {
                let rhs = self.parse_power()?;
                expr = Expr::Mul(Box::new(expr), Box::new(rhs));
            } else {
                return Ok(expr);
            }
        }
    }

    fn starts_primary(&self) -> bool {
        match self.peek() {
            Some(Token::Number(_))
            | Some(Token::Ident(_))
            | Some(Token::LParen)
            | Some(Token::LBrace) => true,
            Some(Token::Command(name)) => {
                matches!(name.as_str(), "frac" | "sqrt" | "pi" | "infty")
                    || Func::from_command(name).is_some()
                    || GREEK.contains(&name.as_str())
            }
            _ => false,
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, MathError> {
        self.nested(|parser| {
            if parser.match_token(&Token::Minus) {
                let inner = parser.parse_unary()?;
                return Ok(Expr::Neg(Box::new(inner)));
            }
            if parser.match_token(&Token::Plus) {
                return parser.parse_unary();
            }
            parser.parse_power()
        })
    }

    fn parse_power(&mut self) -> Result<Expr, MathError> {
        let base = self.parse_postfix()?;
        if self.match_token(&Token::Caret) {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, MathError> {
        let mut expr = self.parse_primary()?;
        while self.match_token(&Token::Bang) {
            expr = Expr::Factorial(Box::new(expr));
        }
        Ok(expr)
    }

    /// Argument of `\frac`, `\sqrt` or `^`: a braced group or a single primary.
    fn parse_group(&mut self) -> Result<Expr, MathError> {
        if self.match_token(&Token::LBrace) {
            let expr = self.parse_expr()?;
            self.expect_token(&Token::RBrace)?;
            return Ok(expr);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, MathError> {
        self.nested(Self::parse_primary_token)
    }

    fn parse_primary_token(&mut self) -> Result<Expr, MathError> {
        match self.next_token() {
            Some(Token::Number(value)) => Ok(Expr::Num(value)),
            Some(Token::Ident(name)) => self.parse_variable(name),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect_token(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBrace) => {
                let expr = self.parse_expr()?;
                self.expect_token(&Token::RBrace)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                let expr = self.parse_expr()?;
                self.expect_token(&Token::RBracket)?;
                Ok(expr)
            }
            Some(Token::Command(name)) => self.parse_command(&name),
            other => Err(MathError(format!("unexpected token {:?}", other))),
        }
    }

    fn parse_variable(&mut self, name: char) -> Result<Expr, MathError> {
        if self.match_token(&Token::Underscore) {
            let subscript = match self.next_token() {
                Some(Token::Number(n)) => format!("{n}"),
                Some(Token::Ident(c)) => c.to_string(),
                other => {
                    return Err(MathError(format!("unsupported subscript {:?}", other)));
                }
            };
            return Ok(Expr::Var(format!("{name}_{subscript}")));
        }
        if name == 'e' {
            return Ok(Expr::Num(std::f64::consts::E));
        }
        Ok(Expr::Var(name.to_string()))
    }

    fn parse_command(&mut self, name: &str) -> Result<Expr, MathError> {
        match name {
            "frac" => {
                let numerator = self.parse_group()?;
                let denominator = self.parse_group()?;
                Ok(Expr::Div(Box::new(numerator), Box::new(denominator)))
            }
            "sqrt" => {
                let index = if self.match_token(&Token::LBracket) {
                    let index = self.parse_expr()?;
                    self.expect_token(&Token::RBracket)?;
                    index
                } else {
                    Expr::Num(2.0)
                };
                let radicand = self.parse_group()?;
                Ok(Expr::Root(Box::new(index), Box::new(radicand)))
            }
            "pi" => Ok(Expr::Num(std::f64::consts::PI)),
            "infty" => Ok(Expr::Num(f64::INFINITY)),
            other => {
                if let Some(func) = Func::from_command(other) {
                    let arg = self.parse_power()?;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                if GREEK.contains(&other) {
                    return Ok(Expr::Var(other.to_string()));
                }
                Err(MathError(format!("unsupported command '\\{other}'")))
            }
        }
    }
}
