use super::MathError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(char),
    Command(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Bang,
    Underscore,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, MathError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                let mut seen_dot = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || (chars[i] == '.' && !seen_dot)) {
                    if chars[i] == '.' {
                        seen_dot = true;
                    }
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| MathError(format!("invalid number literal '{raw}'")))?;
                tokens.push(Token::Number(value));
            }
            '\\' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                if start == i {
                    // Escaped symbol such as `\{` or `\}`.
                    let escaped = chars
                        .get(i)
                        .copied()
                        .ok_or_else(|| MathError("dangling backslash".to_string()))?;
                    i += 1;
                    tokens.push(match escaped {
                        '{' => Token::LBrace,
                        '}' => Token::RBrace,
                        other => return Err(MathError(format!("unsupported escape '\\{other}'"))),
                    });
                    continue;
                }
                let name: String = chars[start..i].iter().collect();
                let is_frac = name == "frac";
                tokens.push(Token::Command(name));

                // `\frac12` shorthand: each following digit is its own argument.
                if is_frac {
                    let mut taken = 0;
                    while taken < 2 && i < chars.len() && chars[i].is_ascii_digit() {
                        let digit = chars[i].to_digit(10).unwrap_or(0);
                        tokens.push(Token::Number(f64::from(digit)));
                        i += 1;
                        taken += 1;
                    }
                }
            }
            'a'..='z' | 'A'..='Z' => {
                tokens.push(Token::Ident(c));
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' | '−' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' | '×' | '·' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' | '÷' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '_' => {
                tokens.push(Token::Underscore);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            other => return Err(MathError(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}
