use serde::{Deserialize, Serialize};
use thiserror::Error;
use tq_lang::{Argument, Condition, Operation};
use tq_types::Literal;

/// One lowered pipeline step with its arguments resolved and defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Select { columns: Vec<String> },
    Where { condition: Condition },
    Upper { column: String },
    Lower { column: String },
    StrLen { column: String },
    Round { column: String, decimals: u32 },
    Head { count: usize },
    Tail { count: usize },
    SortBy { column: String, descending: bool },
    Count,
    Aggregate { column: String, stat: Stat },
    First { column: String },
    Last { column: String },
    Uniq { column: String },
    UniqCount { column: String },
    StrJoin { column: String, separator: String },
    Columns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Min,
    Max,
    Sum,
    Mean,
    Median,
    Mode,
    Std,
    Var,
}

impl Stat {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Std => "std",
            Self::Var => "var",
        }
    }
}

impl Step {
    /// Surface-syntax name of the operation this step was lowered from.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Where { .. } => "where",
            Self::Upper { .. } => "upper",
            Self::Lower { .. } => "lower",
            Self::StrLen { .. } => "strlen",
            Self::Round { .. } => "round",
            Self::Head { .. } => "head",
            Self::Tail { .. } => "tail",
            Self::SortBy { .. } => "sortby",
            Self::Count => "count",
            Self::Aggregate { stat, .. } => stat.name(),
            Self::First { .. } => "first",
            Self::Last { .. } => "last",
            Self::Uniq { .. } => "uniq",
            Self::UniqCount { .. } => "uniqc",
            Self::StrJoin { .. } => "strjoin",
            Self::Columns => "columns",
        }
    }

    /// Terminal steps collapse the table into a scalar, list, or summary
    /// table and must end the chain.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Count
                | Self::Aggregate { .. }
                | Self::First { .. }
                | Self::Last { .. }
                | Self::Uniq { .. }
                | Self::UniqCount { .. }
                | Self::StrJoin { .. }
                | Self::Columns
        )
    }
}

/// A validated chain: every step lowered, defaults filled in, and the
/// terminal-last rule enforced. Immutable once built, so one pipeline can be
/// evaluated against any number of tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The terminal step, when the chain ends in one.
    #[must_use]
    pub fn terminal(&self) -> Option<&Step> {
        self.steps.last().filter(|step| step.is_terminal())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("pipeline contains no operations")]
    EmptyPipeline,
    #[error("unknown operation {name:?} (operation {operation_index})")]
    UnknownOperation { operation_index: usize, name: String },
    #[error("{name} takes {expected} but received {found} arguments (operation {operation_index})")]
    ArityMismatch {
        operation_index: usize,
        name: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("{name} expects {expected} for argument {argument_index} (operation {operation_index})")]
    InvalidArgument {
        operation_index: usize,
        name: &'static str,
        argument_index: usize,
        expected: &'static str,
    },
    #[error("{name} must be the last operation in the chain (operation {operation_index})")]
    TerminalNotLast {
        operation_index: usize,
        name: &'static str,
    },
}

impl ValidationError {
    /// Index of the offending operation in the chain, when one is known.
    #[must_use]
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            Self::EmptyPipeline => None,
            Self::UnknownOperation {
                operation_index, ..
            }
            | Self::ArityMismatch {
                operation_index, ..
            }
            | Self::InvalidArgument {
                operation_index, ..
            }
            | Self::TerminalNotLast {
                operation_index, ..
            } => Some(*operation_index),
        }
    }
}

/// Check a parsed chain structurally and lower it into a [`Pipeline`].
///
/// This pass is schema-free: operation names, argument counts and kinds, and
/// the terminal-last rule are checked here, while column existence waits for
/// evaluation because `select` can narrow the visible schema mid-chain.
pub fn validate(operations: &[Operation]) -> Result<Pipeline, ValidationError> {
    if operations.is_empty() {
        return Err(ValidationError::EmptyPipeline);
    }
    let mut steps = Vec::with_capacity(operations.len());
    for (operation_index, operation) in operations.iter().enumerate() {
        let step = lower(operation_index, operation)?;
        if step.is_terminal() && operation_index + 1 < operations.len() {
            return Err(ValidationError::TerminalNotLast {
                operation_index,
                name: step.name(),
            });
        }
        steps.push(step);
    }
    Ok(Pipeline { steps })
}

fn lower(operation_index: usize, operation: &Operation) -> Result<Step, ValidationError> {
    let args = operation.args.as_slice();
    match operation.name.as_str() {
        "select" => {
            if args.is_empty() {
                return Err(arity(
                    operation_index,
                    "select",
                    "at least one column argument",
                    0,
                ));
            }
            let columns = args
                .iter()
                .enumerate()
                .map(|(argument_index, arg)| {
                    column_of(operation_index, "select", argument_index, arg)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Step::Select { columns })
        }
        "where" => match args {
            [Argument::Condition(condition)] => Ok(Step::Where {
                condition: condition.clone(),
            }),
            _ => Err(arity(
                operation_index,
                "where",
                "exactly one condition",
                args.len(),
            )),
        },
        "upper" => Ok(Step::Upper {
            column: one_column(operation_index, "upper", args)?,
        }),
        "lower" => Ok(Step::Lower {
            column: one_column(operation_index, "lower", args)?,
        }),
        "strlen" => Ok(Step::StrLen {
            column: one_column(operation_index, "strlen", args)?,
        }),
        "round" => {
            let [column_arg, decimals_arg] = args else {
                return Err(arity(
                    operation_index,
                    "round",
                    "one column argument and one integer",
                    args.len(),
                ));
            };
            let column = column_of(operation_index, "round", 0, column_arg)?;
            let decimals = integer_of(operation_index, "round", 1, decimals_arg)?;
            let decimals = u32::try_from(decimals)
                .map_err(|_| invalid(operation_index, "round", 1, "a non-negative integer"))?;
            Ok(Step::Round { column, decimals })
        }
        "head" => Ok(Step::Head {
            count: optional_count(operation_index, "head", args)?,
        }),
        "tail" => Ok(Step::Tail {
            count: optional_count(operation_index, "tail", args)?,
        }),
        "sortby" => {
            let (column_arg, descending) = match args {
                [column] => (column, false),
                [column, Argument::Literal(Literal::Bool(descending))] => (column, *descending),
                [_, _] => return Err(invalid(operation_index, "sortby", 1, "a boolean")),
                _ => {
                    return Err(arity(
                        operation_index,
                        "sortby",
                        "one column argument and an optional boolean",
                        args.len(),
                    ));
                }
            };
            let column = column_of(operation_index, "sortby", 0, column_arg)?;
            Ok(Step::SortBy { column, descending })
        }
        // The optional column argument is accepted and discarded: count
        // reports the row count of the whole table.
        "count" => match args {
            [] | [Argument::Ident(_)] => Ok(Step::Count),
            [_] => Err(invalid(operation_index, "count", 0, "a column name")),
            _ => Err(arity(
                operation_index,
                "count",
                "at most one column argument",
                args.len(),
            )),
        },
        "min" => stat_step(operation_index, Stat::Min, args),
        "max" => stat_step(operation_index, Stat::Max, args),
        "sum" => stat_step(operation_index, Stat::Sum, args),
        "mean" => stat_step(operation_index, Stat::Mean, args),
        "median" => stat_step(operation_index, Stat::Median, args),
        "mode" => stat_step(operation_index, Stat::Mode, args),
        "std" => stat_step(operation_index, Stat::Std, args),
        "var" => stat_step(operation_index, Stat::Var, args),
        "first" => Ok(Step::First {
            column: one_column(operation_index, "first", args)?,
        }),
        "last" => Ok(Step::Last {
            column: one_column(operation_index, "last", args)?,
        }),
        "uniq" => Ok(Step::Uniq {
            column: one_column(operation_index, "uniq", args)?,
        }),
        "uniqc" => Ok(Step::UniqCount {
            column: one_column(operation_index, "uniqc", args)?,
        }),
        "strjoin" => {
            let (column_arg, separator) = match args {
                [column] => (column, ",".to_owned()),
                [column, Argument::Literal(Literal::Str(separator))] => {
                    (column, separator.clone())
                }
                [_, _] => return Err(invalid(operation_index, "strjoin", 1, "a string separator")),
                _ => {
                    return Err(arity(
                        operation_index,
                        "strjoin",
                        "one column argument and an optional separator string",
                        args.len(),
                    ));
                }
            };
            let column = column_of(operation_index, "strjoin", 0, column_arg)?;
            Ok(Step::StrJoin { column, separator })
        }
        "columns" => {
            if args.is_empty() {
                Ok(Step::Columns)
            } else {
                Err(arity(operation_index, "columns", "no arguments", args.len()))
            }
        }
        name => Err(ValidationError::UnknownOperation {
            operation_index,
            name: name.to_owned(),
        }),
    }
}

fn stat_step(
    operation_index: usize,
    stat: Stat,
    args: &[Argument],
) -> Result<Step, ValidationError> {
    let column = one_column(operation_index, stat.name(), args)?;
    Ok(Step::Aggregate { column, stat })
}

fn one_column(
    operation_index: usize,
    name: &'static str,
    args: &[Argument],
) -> Result<String, ValidationError> {
    match args {
        [arg] => column_of(operation_index, name, 0, arg),
        _ => Err(arity(
            operation_index,
            name,
            "exactly one column argument",
            args.len(),
        )),
    }
}

fn column_of(
    operation_index: usize,
    name: &'static str,
    argument_index: usize,
    arg: &Argument,
) -> Result<String, ValidationError> {
    match arg {
        Argument::Ident(column) => Ok(column.clone()),
        _ => Err(invalid(operation_index, name, argument_index, "a column name")),
    }
}

fn optional_count(
    operation_index: usize,
    name: &'static str,
    args: &[Argument],
) -> Result<usize, ValidationError> {
    match args {
        [] => Ok(5),
        [arg] => Ok(integer_of(operation_index, name, 0, arg)? as usize),
        _ => Err(arity(
            operation_index,
            name,
            "at most one integer argument",
            args.len(),
        )),
    }
}

fn integer_of(
    operation_index: usize,
    name: &'static str,
    argument_index: usize,
    arg: &Argument,
) -> Result<u64, ValidationError> {
    match arg {
        Argument::Literal(Literal::Number(value))
            if value.fract() == 0.0 && *value >= 0.0 && *value <= u64::MAX as f64 =>
        {
            Ok(*value as u64)
        }
        _ => Err(invalid(
            operation_index,
            name,
            argument_index,
            "a non-negative integer",
        )),
    }
}

fn arity(
    operation_index: usize,
    name: &'static str,
    expected: &'static str,
    found: usize,
) -> ValidationError {
    ValidationError::ArityMismatch {
        operation_index,
        name,
        expected,
        found,
    }
}

fn invalid(
    operation_index: usize,
    name: &'static str,
    argument_index: usize,
    expected: &'static str,
) -> ValidationError {
    ValidationError::InvalidArgument {
        operation_index,
        name,
        argument_index,
        expected,
    }
}
