use thiserror::Error;
use tq_types::Literal;

use crate::ast::{CompareOp, Condition};
use crate::token::{LexError, Token, TokenKind, tokenize};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConditionError {
    #[error("condition is empty")]
    Empty { position: usize },
    #[error("expected {expected} at position {position} but found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("expected {expected} but the condition ended at position {position}")]
    UnexpectedEnd { position: usize, expected: String },
    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ConditionError {
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Empty { position }
            | Self::UnexpectedToken { position, .. }
            | Self::UnexpectedEnd { position, .. } => *position,
            Self::Lex(error) => error.position(),
        }
    }

    /// Shift every reported position; used by the chain parser to point at
    /// the full expression string instead of the `where(...)` body slice.
    #[must_use]
    pub fn at_offset(self, offset: usize) -> Self {
        match self {
            Self::Empty { position } => Self::Empty {
                position: position + offset,
            },
            Self::UnexpectedToken {
                position,
                expected,
                found,
            } => Self::UnexpectedToken {
                position: position + offset,
                expected,
                found,
            },
            Self::UnexpectedEnd { position, expected } => Self::UnexpectedEnd {
                position: position + offset,
                expected,
            },
            Self::Lex(error) => Self::Lex(error.at_offset(offset)),
        }
    }
}

/// Parse the boolean sub-language of a `where(...)` body.
///
/// Syntax, lowest precedence first:
///   expr       → or_expr
///   or_expr    → and_expr ( '|' and_expr )*
///   and_expr   → term ( '&' term )*
///   term       → '(' expr ')' | comparison
///   comparison → IDENT ('>' | '>=' | '<' | '<=' | '==' | '!=') literal
///   literal    → NUMBER | STRING | 'true' | 'false'
///
/// `&` binds tighter than `|`, both left-associative; parentheses override.
/// The left side of a comparison must be a bare column name and the right
/// side a literal, so neither column-to-column comparison nor a literal on
/// the left parses.
pub fn parse_condition(text: &str) -> Result<Condition, ConditionError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ConditionError::Empty { position: 0 });
    }

    let mut pos = 0;
    let condition = parse_or(text, &tokens, &mut pos)?;
    if pos < tokens.len() {
        return Err(unexpected(
            &tokens[pos],
            "'&', '|', or the end of the condition",
        ));
    }
    Ok(condition)
}

fn parse_or(text: &str, tokens: &[Token], pos: &mut usize) -> Result<Condition, ConditionError> {
    let mut left = parse_and(text, tokens, pos)?;
    while *pos < tokens.len() && tokens[*pos].kind == TokenKind::Pipe {
        *pos += 1;
        let right = parse_and(text, tokens, pos)?;
        left = Condition::Or {
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    Ok(left)
}

fn parse_and(text: &str, tokens: &[Token], pos: &mut usize) -> Result<Condition, ConditionError> {
    let mut left = parse_term(text, tokens, pos)?;
    while *pos < tokens.len() && tokens[*pos].kind == TokenKind::Amp {
        *pos += 1;
        let right = parse_term(text, tokens, pos)?;
        left = Condition::And {
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    Ok(left)
}

fn parse_term(text: &str, tokens: &[Token], pos: &mut usize) -> Result<Condition, ConditionError> {
    match tokens.get(*pos) {
        None => Err(ended(text, "a comparison or '('")),
        Some(token) if token.kind == TokenKind::LParen => {
            *pos += 1;
            let inner = parse_or(text, tokens, pos)?;
            match tokens.get(*pos) {
                Some(token) if token.kind == TokenKind::RParen => {
                    *pos += 1;
                    Ok(inner)
                }
                Some(token) => Err(unexpected(token, "')'")),
                None => Err(ended(text, "')'")),
            }
        }
        Some(_) => parse_comparison(text, tokens, pos),
    }
}

fn parse_comparison(
    text: &str,
    tokens: &[Token],
    pos: &mut usize,
) -> Result<Condition, ConditionError> {
    let column = match tokens.get(*pos) {
        Some(token) => match &token.kind {
            TokenKind::Ident(name) => {
                *pos += 1;
                name.clone()
            }
            _ => return Err(unexpected(token, "a column name")),
        },
        None => return Err(ended(text, "a column name")),
    };

    let op = match tokens.get(*pos) {
        Some(token) => match token.kind {
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::Ne,
            _ => return Err(unexpected(token, "a comparison operator")),
        },
        None => return Err(ended(text, "a comparison operator")),
    };
    *pos += 1;

    let value = match tokens.get(*pos) {
        Some(token) => match &token.kind {
            TokenKind::Number(value) => Literal::Number(*value),
            TokenKind::Str(value) => Literal::Str(value.clone()),
            TokenKind::Ident(name) if name == "true" => Literal::Bool(true),
            TokenKind::Ident(name) if name == "false" => Literal::Bool(false),
            // Column-to-column comparison is out of the grammar.
            _ => return Err(unexpected(token, "a number, string, or boolean literal")),
        },
        None => return Err(ended(text, "a number, string, or boolean literal")),
    };
    *pos += 1;

    Ok(Condition::Compare { column, op, value })
}

fn unexpected(token: &Token, expected: &str) -> ConditionError {
    ConditionError::UnexpectedToken {
        position: token.pos,
        expected: expected.to_owned(),
        found: token.kind.describe(),
    }
}

fn ended(text: &str, expected: &str) -> ConditionError {
    ConditionError::UnexpectedEnd {
        position: text.len(),
        expected: expected.to_owned(),
    }
}
