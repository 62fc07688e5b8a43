#![forbid(unsafe_code)]

mod eval;
mod validate;

pub use eval::{EvalError, EvalErrorKind, Evaluated, evaluate};
pub use validate::{Pipeline, Stat, Step, ValidationError, validate};
