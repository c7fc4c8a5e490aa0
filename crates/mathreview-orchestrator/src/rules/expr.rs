//! Parser for problem formulations.
//!
//! A formulation is either an arithmetic expression (`12 + (-5) * 3`) or a
//! linear equation in `x` (`3*x - 4 = 2*x + 7`). Every sub-expression is kept
//! in the linear form `coefficient * x + constant`, which makes solving a
//! matter of collecting terms.

use std::fmt;

/// Coefficients smaller than this are treated as zero.
const EPSILON: f64 = 1e-9;

/// Errors raised while parsing or solving a formulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// The formulation is empty.
    #[error("empty formulation")]
    Empty,

    /// A character that is not part of the grammar.
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset in the input.
        position: usize,
    },

    /// A token in a position the grammar does not allow.
    #[error("unexpected {token} at token {index}")]
    UnexpectedToken {
        /// Display form of the token.
        token: String,
        /// Token index.
        index: usize,
    },

    /// Input ended in the middle of an expression.
    #[error("unexpected end of formulation")]
    UnexpectedEnd,

    /// A malformed number literal.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// Two `x` terms were multiplied, or `x` appeared in a divisor.
    #[error("formulation is not linear in x")]
    NonLinear,

    /// Division by a zero constant.
    #[error("division by zero")]
    DivisionByZero,

    /// More than one `=` sign.
    #[error("formulation contains more than one '='")]
    MultipleEquals,

    /// `x` appears in an expression that is not an equation.
    #[error("expression contains x but is not an equation")]
    FreeVariable,

    /// The x terms cancel out.
    #[error("equation has no unique solution")]
    NoUniqueSolution,
}

/// A value of the form `coefficient * x + constant`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    /// Coefficient of `x`.
    pub coefficient: f64,
    /// Constant term.
    pub constant: f64,
}

impl Linear {
    const fn constant(value: f64) -> Self {
        Self {
            coefficient: 0.0,
            constant: value,
        }
    }

    const fn variable() -> Self {
        Self {
            coefficient: 1.0,
            constant: 0.0,
        }
    }

    /// Returns `true` if `x` does not appear.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.coefficient.abs() < EPSILON
    }

    fn plus(self, other: Self) -> Self {
        Self {
            coefficient: self.coefficient + other.coefficient,
            constant: self.constant + other.constant,
        }
    }

    fn minus(self, other: Self) -> Self {
        self.plus(other.negated())
    }

    fn negated(self) -> Self {
        Self {
            coefficient: -self.coefficient,
            constant: -self.constant,
        }
    }

    fn times(self, other: Self) -> Result<Self, ExprError> {
        match (self.is_constant(), other.is_constant()) {
            (false, false) => Err(ExprError::NonLinear),
            (true, _) => Ok(Self {
                coefficient: other.coefficient * self.constant,
                constant: other.constant * self.constant,
            }),
            (false, true) => Ok(Self {
                coefficient: self.coefficient * other.constant,
                constant: self.constant * other.constant,
            }),
        }
    }

    fn divided_by(self, other: Self) -> Result<Self, ExprError> {
        if !other.is_constant() {
            return Err(ExprError::NonLinear);
        }
        if other.constant.abs() < EPSILON {
            return Err(ExprError::DivisionByZero);
        }
        Ok(Self {
            coefficient: self.coefficient / other.constant,
            constant: self.constant / other.constant,
        })
    }
}

/// A parsed formulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formulation {
    /// An arithmetic expression and its value.
    Expression(f64),
    /// A linear equation `left = right`.
    Equation {
        /// Left-hand side.
        left: Linear,
        /// Right-hand side.
        right: Linear,
    },
}

impl Formulation {
    /// Collects an equation into `a * x = b`, returning `(a, b)`.
    ///
    /// Returns `None` for plain expressions.
    #[must_use]
    pub fn collected(&self) -> Option<(f64, f64)> {
        match self {
            Self::Expression(_) => None,
            Self::Equation { left, right } => Some((
                left.coefficient - right.coefficient,
                right.constant - left.constant,
            )),
        }
    }

    /// Returns the value of the expression, or the solution for `x`.
    pub fn solve(&self) -> Result<f64, ExprError> {
        match self {
            Self::Expression(value) => Ok(*value),
            Self::Equation { .. } => {
                let (a, b) = self.collected().ok_or(ExprError::NoUniqueSolution)?;
                if a.abs() < EPSILON {
                    return Err(ExprError::NoUniqueSolution);
                }
                Ok(b / a)
            }
        }
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    X,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Equals,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::X => f.write_str("'x'"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Equals => f.write_str("'='"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' | '\u{2212}' => Token::Minus,
            '*' | '\u{00d7}' => Token::Star,
            '/' | '\u{00f7}' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '=' => Token::Equals,
            'x' | 'X' => Token::X,
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        literal.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(literal.clone()))?;
                Token::Number(value)
            }
            other => {
                return Err(ExprError::UnexpectedChar {
                    ch: other,
                    position,
                })
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn unexpected(&self, token: &Token) -> ExprError {
        ExprError::UnexpectedToken {
            token: token.to_string(),
            index: self.index.saturating_sub(1),
        }
    }

    /// expr := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Linear, ExprError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value = value.plus(self.term()?);
                }
                Some(Token::Minus) => {
                    self.advance();
                    value = value.minus(self.term()?);
                }
                _ => return Ok(value),
            }
        }
    }

    /// term := unary (('*' | '/') unary | implicit product)*
    fn term(&mut self) -> Result<Linear, ExprError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value = value.times(self.unary()?)?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value = value.divided_by(self.unary()?)?;
                }
                // "3x" and "2(x + 1)"
                Some(Token::X | Token::LParen) => {
                    value = value.times(self.primary()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    /// unary := ('-' | '+') unary | primary
    fn unary(&mut self) -> Result<Linear, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(self.unary()?.negated())
            }
            Some(Token::Plus) => {
                self.advance();
                self.unary()
            }
            _ => self.primary(),
        }
    }

    /// primary := number | 'x' | '(' expr ')'
    fn primary(&mut self) -> Result<Linear, ExprError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Linear::constant(n)),
            Some(Token::X) => Ok(Linear::variable()),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(self.unexpected(&other)),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(other) => Err(self.unexpected(&other)),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

/// Parses a formulation.
///
/// # Examples
///
/// ```
/// use mathreview_orchestrator::rules::expr::{parse, Formulation};
///
/// assert_eq!(parse("2 * (3 + 4)").unwrap(), Formulation::Expression(14.0));
/// assert_eq!(parse("3x - 4 = 2x + 7").unwrap().solve().unwrap(), 11.0);
/// ```
pub fn parse(input: &str) -> Result<Formulation, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let equals = tokens.iter().filter(|t| **t == Token::Equals).count();
    if equals > 1 {
        return Err(ExprError::MultipleEquals);
    }

    let mut parser = Parser { tokens, index: 0 };
    let left = parser.expression()?;

    let formulation = if equals == 1 {
        match parser.advance() {
            Some(Token::Equals) => {}
            Some(other) => return Err(parser.unexpected(&other)),
            None => return Err(ExprError::UnexpectedEnd),
        }
        let right = parser.expression()?;
        Formulation::Equation { left, right }
    } else {
        if !left.is_constant() {
            return Err(ExprError::FreeVariable);
        }
        Formulation::Expression(left.constant)
    };

    if let Some(extra) = parser.advance() {
        return Err(parser.unexpected(&extra));
    }

    Ok(formulation)
}
