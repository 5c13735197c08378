//! Grammar-restricted arithmetic evaluator.
//!
//! Accepts decimal numbers, `+ - * /`, unary sign and parentheses. Nothing
//! else is tokenized, so identifiers, attribute access and assignment can
//! never reach evaluation.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('+' | '-') factor | number | '(' expr ')'
//! ```

use thiserror::Error;

/// Nesting bound for parentheses and unary signs.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArithmeticError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}'")]
    InvalidChar(char),
    #[error("malformed number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {0}")]
    Unexpected(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(n) => format!("number {n}"),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ArithmeticError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ArithmeticError::InvalidNumber(literal.to_string()))?;
                tokens.push(Token::Num(value));
            }
            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    other => return Err(ArithmeticError::InvalidChar(other)),
                };
                tokens.push(token);
                chars.next();
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), ArithmeticError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ArithmeticError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, ArithmeticError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ArithmeticError> {
        let mut value = self.factor()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == Token::Star {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(ArithmeticError::DivisionByZero);
                }
                value / rhs
            };
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, ArithmeticError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Minus) => {
                self.descend()?;
                let value = -self.factor()?;
                self.depth -= 1;
                Ok(value)
            }
            Some(Token::Plus) => {
                self.descend()?;
                let value = self.factor()?;
                self.depth -= 1;
                Ok(value)
            }
            Some(Token::LParen) => {
                self.descend()?;
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => {
                        self.depth -= 1;
                        Ok(value)
                    }
                    Some(other) => Err(ArithmeticError::Unexpected(other.describe())),
                    None => Err(ArithmeticError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ArithmeticError::Unexpected(other.describe())),
            None => Err(ArithmeticError::UnexpectedEnd),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, ArithmeticError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(ArithmeticError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ArithmeticError::Unexpected(extra.describe()));
    }
    if !value.is_finite() {
        return Err(ArithmeticError::NotFinite);
    }
    Ok(value)
}

/// Render a result without a trailing `.0` for whole numbers.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Avoid "-0".
        return "0".into();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_grouping() {
        assert_eq!(evaluate("25 * 16").unwrap(), 400.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("100 / 10 / 5").unwrap(), 2.0);
        assert_eq!(evaluate("1.5 * 2").unwrap(), 3.0);
    }

    #[test]
    fn test_unary_sign() {
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("-(2 * 3)").unwrap(), -6.0);
        assert_eq!(evaluate("4 * -2").unwrap(), -8.0);
        assert_eq!(evaluate("--1").unwrap(), 1.0);
    }

    #[test]
    fn test_rejects_identifiers() {
        assert_eq!(
            evaluate("__import__('os')"),
            Err(ArithmeticError::InvalidChar('_'))
        );
        assert_eq!(evaluate("2 + abc"), Err(ArithmeticError::InvalidChar('a')));
        assert_eq!(evaluate("x = 3"), Err(ArithmeticError::InvalidChar('x')));
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(evaluate(""), Err(ArithmeticError::Empty));
        assert_eq!(evaluate("   "), Err(ArithmeticError::Empty));
        assert_eq!(evaluate("2 +"), Err(ArithmeticError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(ArithmeticError::UnexpectedEnd));
        assert!(matches!(evaluate("1 + 2)"), Err(ArithmeticError::Unexpected(_))));
        assert!(matches!(evaluate("1..2"), Err(ArithmeticError::InvalidNumber(_))));
        assert!(matches!(evaluate("* 3"), Err(ArithmeticError::Unexpected(_))));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(evaluate("5 / 0"), Err(ArithmeticError::DivisionByZero));
        assert_eq!(evaluate("5 / (2 - 2)"), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(evaluate(&deep), Err(ArithmeticError::TooDeep));
        let fine = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(evaluate(&fine).unwrap(), 1.0);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(400.0), "400");
        assert_eq!(format_number(-6.0), "-6");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(10.0 / 4.0), "2.5");
    }
}
