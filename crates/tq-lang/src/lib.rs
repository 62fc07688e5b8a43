#![forbid(unsafe_code)]

mod ast;
mod chain;
mod cond;
mod token;

pub use ast::{Argument, CompareOp, Condition, Operation};
pub use chain::{ParseError, parse, parse_chain};
pub use cond::{ConditionError, parse_condition};
pub use token::{LexError, Token, TokenKind, tokenize};

use thiserror::Error;

/// Any failure turning an expression string into an operation chain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

impl SyntaxError {
    /// Byte offset into the expression string where the failure was noticed.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Lex(error) => error.position(),
            Self::Parse(error) => error.position(),
            Self::Condition(error) => error.position(),
        }
    }
}
