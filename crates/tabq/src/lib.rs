#![forbid(unsafe_code)]

pub use tq_io::{
    OutputFormat, ReadError, ReadOptions, WriteError, read_csv, read_csv_path, read_csv_str,
    render, write_csv,
};
pub use tq_lang::{
    Argument, CompareOp, Condition, ConditionError, LexError, Operation, ParseError, SyntaxError,
    Token, TokenKind, parse, parse_condition, tokenize,
};
pub use tq_pipeline::{
    EvalError, EvalErrorKind, Evaluated, Pipeline, Stat, Step, ValidationError, evaluate, validate,
};
pub use tq_table::{Table, TableError};
pub use tq_types::{Cell, CellKind, Literal, render_number};

use thiserror::Error;

/// Any failure along the parse, validate, evaluate, read, render path.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Run one chain expression against a table.
///
/// This is the single entry point behind the CLI and `run_str`: parse the
/// expression, validate it into a [`Pipeline`], evaluate against `table`.
pub fn execute(expression: &str, table: Table) -> Result<Evaluated, Error> {
    let operations = parse(expression)?;
    let pipeline = validate(&operations)?;
    Ok(evaluate(&pipeline, table)?)
}

/// Read delimited text, run `expression` over it, and render the result.
pub fn run_str(
    expression: &str,
    input: &str,
    options: &ReadOptions,
    format: OutputFormat,
) -> Result<String, Error> {
    let table = read_csv_str(input, options)?;
    let result = execute(expression, table)?;
    Ok(render(&result, format)?)
}
