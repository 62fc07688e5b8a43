use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tq_lang::{CompareOp, Condition};
use tq_table::{Table, TableError};
use tq_types::{Cell, CellKind, Literal};

use crate::validate::{Pipeline, Stat, Step};

/// The outcome of running a pipeline: a transformed table, a single scalar
/// (aggregates, `count`, `strjoin`, `first`/`last`), or a list of cells
/// (`columns`, `uniq`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Evaluated {
    Table(Table),
    Scalar(Cell),
    List(Vec<Cell>),
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{operation} (operation {operation_index}): {kind}")]
pub struct EvalError {
    pub operation_index: usize,
    pub operation: &'static str,
    pub kind: EvalErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalErrorKind {
    #[error("column {name:?} does not exist")]
    UnknownColumn { name: String },
    #[error("column {column:?} is listed more than once")]
    DuplicateColumn { column: String },
    #[error("column {column:?} holds a {found:?} value where a {expected} is required")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: CellKind,
    },
    #[error("column {column:?} needs at least two values for a sample statistic")]
    DivisionByZero { column: String },
    #[error("column {column:?} has no values to aggregate")]
    EmptyAggregate { column: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Run every step of a validated pipeline against `table`.
///
/// Table-producing steps thread a fresh table forward; a terminal step
/// computes its result and stops (validation guarantees it is last). Column
/// existence is checked here, step by step, against the schema in effect at
/// that point in the chain.
pub fn evaluate(pipeline: &Pipeline, table: Table) -> Result<Evaluated, EvalError> {
    let mut current = table;
    for (operation_index, step) in pipeline.steps().iter().enumerate() {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            operation = step.name(),
            operation_index,
            rows = current.row_count(),
            columns = current.column_count(),
            "applying pipeline step"
        );
        let wrap = |kind: EvalErrorKind| EvalError {
            operation_index,
            operation: step.name(),
            kind,
        };
        if step.is_terminal() {
            return finish(step, &current).map_err(wrap);
        }
        current = apply(step, current).map_err(wrap)?;
    }
    Ok(Evaluated::Table(current))
}

fn apply(step: &Step, table: Table) -> Result<Table, EvalErrorKind> {
    match step {
        Step::Select { columns } => select_columns(&table, columns),
        Step::Where { condition } => filter_rows(table, condition),
        Step::Upper { column } => map_column(table, column, |cell| match cell {
            Cell::Str(value) => Ok(Cell::Str(value.to_uppercase())),
            Cell::Null => Ok(Cell::Null),
            other => Err(type_mismatch(column, "string", other.kind())),
        }),
        Step::Lower { column } => map_column(table, column, |cell| match cell {
            Cell::Str(value) => Ok(Cell::Str(value.to_lowercase())),
            Cell::Null => Ok(Cell::Null),
            other => Err(type_mismatch(column, "string", other.kind())),
        }),
        Step::StrLen { column } => map_column(table, column, |cell| match cell {
            Cell::Str(value) => Ok(Cell::Number(value.chars().count() as f64)),
            Cell::Null => Ok(Cell::Null),
            other => Err(type_mismatch(column, "string", other.kind())),
        }),
        Step::Round { column, decimals } => {
            let decimals = *decimals;
            map_column(table, column, move |cell| match cell {
                Cell::Number(value) => Ok(Cell::Number(round_half_even(*value, decimals))),
                Cell::Null => Ok(Cell::Null),
                other => Err(type_mismatch(column, "number", other.kind())),
            })
        }
        Step::Head { count } => Ok(table.head(*count)),
        Step::Tail { count } => Ok(table.tail(*count)),
        Step::SortBy { column, descending } => sort_rows(table, column, *descending),
        // Terminal steps are handled in `finish`.
        _ => Ok(table),
    }
}

fn finish(step: &Step, table: &Table) -> Result<Evaluated, EvalErrorKind> {
    match step {
        Step::Count => Ok(Evaluated::Scalar(Cell::Number(table.row_count() as f64))),
        Step::Columns => Ok(Evaluated::List(
            table
                .column_names()
                .iter()
                .map(|name| Cell::Str(name.clone()))
                .collect(),
        )),
        Step::Aggregate { column, stat } => {
            let values = numeric_values(column, column_cells(table, column)?)?;
            let value = match stat {
                Stat::Sum => values.iter().sum::<f64>(),
                Stat::Min => fold_extreme(column, &values, f64::min)?,
                Stat::Max => fold_extreme(column, &values, f64::max)?,
                Stat::Mean => mean_of(column, &values)?,
                Stat::Median => median_of(column, values.clone())?,
                Stat::Mode => mode_of(column, &values)?,
                Stat::Std => sample_variance(column, &values)?.sqrt(),
                Stat::Var => sample_variance(column, &values)?,
            };
            Ok(Evaluated::Scalar(Cell::Number(value)))
        }
        Step::First { column } => {
            let cells = column_cells(table, column)?;
            cells
                .first()
                .map(|cell| Evaluated::Scalar(cell.clone()))
                .ok_or_else(|| empty_aggregate(column))
        }
        Step::Last { column } => {
            let cells = column_cells(table, column)?;
            cells
                .last()
                .map(|cell| Evaluated::Scalar(cell.clone()))
                .ok_or_else(|| empty_aggregate(column))
        }
        Step::Uniq { column } => {
            let cells = column_cells(table, column)?;
            Ok(Evaluated::List(distinct(cells)))
        }
        Step::UniqCount { column } => unique_counts(table, column),
        Step::StrJoin { column, separator } => {
            let cells = column_cells(table, column)?;
            let parts: Vec<String> = cells
                .iter()
                .filter(|cell| !cell.is_null())
                .map(Cell::render)
                .collect();
            Ok(Evaluated::Scalar(Cell::Str(parts.join(separator))))
        }
        // Table-producing steps are handled in `apply`.
        _ => Ok(Evaluated::Table(table.clone())),
    }
}

fn select_columns(table: &Table, columns: &[String]) -> Result<Table, EvalErrorKind> {
    table.select(columns).map_err(|error| match error {
        TableError::UnknownColumn { name } => EvalErrorKind::UnknownColumn { name },
        TableError::DuplicateColumn { name } => EvalErrorKind::DuplicateColumn { column: name },
        other => EvalErrorKind::Table(other),
    })
}

fn filter_rows(table: Table, condition: &Condition) -> Result<Table, EvalErrorKind> {
    // Schema check up front so a bad column name fails even on zero rows.
    for column in condition.referenced_columns() {
        if table.column_index(column).is_none() {
            return Err(unknown_column(column));
        }
    }
    let mut keep = Vec::new();
    for row in 0..table.row_count() {
        if holds(&table, condition, row)? {
            keep.push(row);
        }
    }
    Ok(table.take(&keep)?)
}

fn holds(table: &Table, condition: &Condition, row: usize) -> Result<bool, EvalErrorKind> {
    match condition {
        Condition::Compare { column, op, value } => {
            let cells = column_cells(table, column)?;
            compare(column, &cells[row], *op, value)
        }
        // Both sides always evaluate so a type error in either branch
        // surfaces no matter what the other branch yields.
        Condition::And { left, right } => {
            let left = holds(table, left, row)?;
            let right = holds(table, right, row)?;
            Ok(left && right)
        }
        Condition::Or { left, right } => {
            let left = holds(table, left, row)?;
            let right = holds(table, right, row)?;
            Ok(left || right)
        }
    }
}

fn compare(
    column: &str,
    cell: &Cell,
    op: CompareOp,
    literal: &Literal,
) -> Result<bool, EvalErrorKind> {
    // Missing data never satisfies a comparison, `!=` included.
    if cell.is_null() {
        return Ok(false);
    }
    if op.is_ordering() {
        let ordering = match (cell, literal) {
            (Cell::Number(a), Literal::Number(b)) => a.partial_cmp(b),
            (Cell::Str(a), Literal::Str(b)) => Some(a.as_str().cmp(b.as_str())),
            (_, Literal::Bool(_)) => {
                return Err(type_mismatch(column, "number or string", cell.kind()));
            }
            (_, Literal::Number(_)) => {
                return Err(type_mismatch(column, "number", cell.kind()));
            }
            (_, Literal::Str(_)) => {
                return Err(type_mismatch(column, "string", cell.kind()));
            }
        };
        // NaN comparisons come back None and the row drops.
        Ok(ordering.is_some_and(|ordering| ordering_holds(op, ordering)))
    } else {
        let equal = match (cell, literal) {
            (Cell::Number(a), Literal::Number(b)) => a == b,
            (Cell::Str(a), Literal::Str(b)) => a == b,
            (Cell::Bool(a), Literal::Bool(b)) => a == b,
            // Values of different kinds are simply unequal.
            _ => false,
        };
        Ok(if op == CompareOp::Ne { !equal } else { equal })
    }
}

fn ordering_holds(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
    }
}

fn map_column<F>(mut table: Table, column: &str, mut transform: F) -> Result<Table, EvalErrorKind>
where
    F: FnMut(&Cell) -> Result<Cell, EvalErrorKind>,
{
    let index = table
        .column_index(column)
        .ok_or_else(|| unknown_column(column))?;
    let mapped = column_cells(&table, column)?
        .iter()
        .map(&mut transform)
        .collect::<Result<Vec<_>, _>>()?;
    table.replace_column(index, mapped)?;
    Ok(table)
}

/// Sort key for one cell. Columns must be homogeneous (ignoring nulls);
/// nulls sort after every value regardless of direction.
enum SortKey<'a> {
    Number(f64),
    Str(&'a str),
    Bool(bool),
}

impl SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            // Unreachable for keys built from one homogeneous column.
            _ => Ordering::Equal,
        }
    }
}

fn sort_rows(table: Table, column: &str, descending: bool) -> Result<Table, EvalErrorKind> {
    let keys = sort_keys(column, column_cells(&table, column)?)?;
    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by(|&a, &b| {
        let ordering = match (&keys[a], &keys[b]) {
            (Some(left), Some(right)) => left.cmp(right),
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        };
        if descending { ordering.reverse() } else { ordering }
    });
    Ok(table.take(&order)?)
}

fn sort_keys<'a>(
    column: &str,
    cells: &'a [Cell],
) -> Result<Vec<Option<SortKey<'a>>>, EvalErrorKind> {
    let mut first_kind: Option<CellKind> = None;
    let mut keys = Vec::with_capacity(cells.len());
    for cell in cells {
        let key = match cell {
            Cell::Null => None,
            Cell::Number(value) => Some(SortKey::Number(*value)),
            Cell::Str(value) => Some(SortKey::Str(value)),
            Cell::Bool(value) => Some(SortKey::Bool(*value)),
        };
        if key.is_some() {
            let kind = cell.kind();
            match first_kind {
                None => first_kind = Some(kind),
                Some(expected) if expected == kind => {}
                Some(expected) => {
                    return Err(type_mismatch(column, kind_name(expected), kind));
                }
            }
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Hashable identity for grouping cells: NaN collapses to one key and
/// `-0.0` groups with `0.0`.
#[derive(PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Null,
    Bool(bool),
    Number(u64),
    Str(&'a str),
}

impl<'a> CellKey<'a> {
    fn from_cell(cell: &'a Cell) -> Self {
        match cell {
            Cell::Null => Self::Null,
            Cell::Bool(value) => Self::Bool(*value),
            Cell::Number(value) => Self::Number(float_key(*value)),
            Cell::Str(value) => Self::Str(value),
        }
    }
}

fn float_key(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn distinct(cells: &[Cell]) -> Vec<Cell> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for cell in cells {
        if seen.insert(CellKey::from_cell(cell)) {
            out.push(cell.clone());
        }
    }
    out
}

fn unique_counts(table: &Table, column: &str) -> Result<Evaluated, EvalErrorKind> {
    let cells = column_cells(table, column)?;
    let mut ordering: Vec<&Cell> = Vec::new();
    let mut counts: HashMap<CellKey, f64> = HashMap::new();
    for cell in cells {
        match counts.get_mut(&CellKey::from_cell(cell)) {
            Some(count) => *count += 1.0,
            None => {
                counts.insert(CellKey::from_cell(cell), 1.0);
                ordering.push(cell);
            }
        }
    }
    let values: Vec<Cell> = ordering.iter().map(|&cell| cell.clone()).collect();
    let totals: Vec<Cell> = ordering
        .iter()
        .map(|cell| {
            let count = counts
                .get(&CellKey::from_cell(cell))
                .copied()
                .expect("ordering references only inserted keys");
            Cell::Number(count)
        })
        .collect();
    let result = Table::new(vec![(column.to_owned(), values), ("count".to_owned(), totals)])?;
    Ok(Evaluated::Table(result))
}

fn numeric_values(column: &str, cells: &[Cell]) -> Result<Vec<f64>, EvalErrorKind> {
    let mut values = Vec::with_capacity(cells.len());
    for cell in cells {
        match cell {
            Cell::Null => {}
            Cell::Number(value) => values.push(*value),
            other => return Err(type_mismatch(column, "number", other.kind())),
        }
    }
    Ok(values)
}

fn fold_extreme(
    column: &str,
    values: &[f64],
    pick: fn(f64, f64) -> f64,
) -> Result<f64, EvalErrorKind> {
    values
        .iter()
        .copied()
        .reduce(pick)
        .ok_or_else(|| empty_aggregate(column))
}

fn mean_of(column: &str, values: &[f64]) -> Result<f64, EvalErrorKind> {
    if values.is_empty() {
        return Err(empty_aggregate(column));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn median_of(column: &str, mut values: Vec<f64>) -> Result<f64, EvalErrorKind> {
    if values.is_empty() {
        return Err(empty_aggregate(column));
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Ok((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Ok(values[mid])
    }
}

fn mode_of(column: &str, values: &[f64]) -> Result<f64, EvalErrorKind> {
    if values.is_empty() {
        return Err(empty_aggregate(column));
    }
    let mut ordering: Vec<f64> = Vec::new();
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for &value in values {
        match counts.get_mut(&float_key(value)) {
            Some(count) => *count += 1,
            None => {
                counts.insert(float_key(value), 1);
                ordering.push(value);
            }
        }
    }
    let mut best = ordering[0];
    let mut best_count = 0;
    // Strict `>` keeps the first-encountered value on ties.
    for &value in &ordering {
        let count = counts
            .get(&float_key(value))
            .copied()
            .expect("ordering references only inserted keys");
        if count > best_count {
            best = value;
            best_count = count;
        }
    }
    Ok(best)
}

fn sample_variance(column: &str, values: &[f64]) -> Result<f64, EvalErrorKind> {
    if values.is_empty() {
        return Err(empty_aggregate(column));
    }
    if values.len() < 2 {
        return Err(EvalErrorKind::DivisionByZero {
            column: column.to_owned(),
        });
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squared: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
    Ok(squared / (n - 1.0))
}

fn round_half_even(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

fn column_cells<'a>(table: &'a Table, column: &str) -> Result<&'a [Cell], EvalErrorKind> {
    table
        .column(column)
        .ok_or_else(|| unknown_column(column))
}

fn unknown_column(column: &str) -> EvalErrorKind {
    EvalErrorKind::UnknownColumn {
        name: column.to_owned(),
    }
}

fn empty_aggregate(column: &str) -> EvalErrorKind {
    EvalErrorKind::EmptyAggregate {
        column: column.to_owned(),
    }
}

fn type_mismatch(column: &str, expected: &'static str, found: CellKind) -> EvalErrorKind {
    EvalErrorKind::TypeMismatch {
        column: column.to_owned(),
        expected,
        found,
    }
}

fn kind_name(kind: CellKind) -> &'static str {
    match kind {
        CellKind::Null => "null",
        CellKind::Bool => "bool",
        CellKind::Number => "number",
        CellKind::Str => "string",
    }
}
