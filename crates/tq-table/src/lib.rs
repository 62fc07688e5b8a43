#![forbid(unsafe_code)]

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tq_types::Cell;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("duplicate column name {name:?}")]
    DuplicateColumn { name: String },
    #[error("column {name:?} has length {found} but the table has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("unknown column {name:?}")]
    UnknownColumn { name: String },
    #[error("row position {position} is out of bounds for {row_count} rows")]
    RowOutOfBounds { position: usize, row_count: usize },
    #[error("column index {index} is out of bounds for {column_count} columns")]
    ColumnOutOfBounds { index: usize, column_count: usize },
}

/// An ordered set of uniquely named columns with positional rows.
///
/// Column order is meaningful (it drives `select` and output); row order is
/// meaningful and only changes through explicit reorder/reduce operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<(String, Vec<Cell>)>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        let row_count = columns.first().map_or(0, |(_, values)| values.len());

        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            if !seen.insert(name.clone()) {
                return Err(TableError::DuplicateColumn { name });
            }
            if column.len() != row_count {
                return Err(TableError::LengthMismatch {
                    name,
                    expected: row_count,
                    found: column.len(),
                });
            }
            names.push(name);
            values.push(column);
        }

        Ok(Self {
            names,
            columns: values,
        })
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.column_index(name)
            .map(|index| self.columns[index].as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Cell])> {
        self.names
            .iter()
            .zip(self.columns.iter())
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Narrow and reorder to exactly the requested columns, preserving rows.
    pub fn select(&self, names: &[String]) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        let mut out_names = Vec::with_capacity(names.len());
        let mut out_columns = Vec::with_capacity(names.len());

        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn { name: name.clone() });
            }
            let index = self
                .column_index(name)
                .ok_or_else(|| TableError::UnknownColumn { name: name.clone() })?;
            out_names.push(name.clone());
            out_columns.push(self.columns[index].clone());
        }

        Ok(Self {
            names: out_names,
            columns: out_columns,
        })
    }

    /// Build a new table from the given row positions, in the given order.
    pub fn take(&self, positions: &[usize]) -> Result<Self, TableError> {
        let row_count = self.row_count();
        if let Some(&position) = positions.iter().find(|&&position| position >= row_count) {
            return Err(TableError::RowOutOfBounds {
                position,
                row_count,
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|values| {
                positions
                    .iter()
                    .map(|&position| values[position].clone())
                    .collect()
            })
            .collect();

        Ok(Self {
            names: self.names.clone(),
            columns,
        })
    }

    /// First `n` rows; `n` past the end returns every row.
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        let keep = n.min(self.row_count());
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|values| values[..keep].to_vec())
                .collect(),
        }
    }

    /// Last `n` rows in original order; `n` past the end returns every row.
    #[must_use]
    pub fn tail(&self, n: usize) -> Self {
        let row_count = self.row_count();
        let start = row_count - n.min(row_count);
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|values| values[start..].to_vec())
                .collect(),
        }
    }

    /// Swap one column's values in place, keeping name and position.
    pub fn replace_column(&mut self, index: usize, values: Vec<Cell>) -> Result<(), TableError> {
        if index >= self.columns.len() {
            return Err(TableError::ColumnOutOfBounds {
                index,
                column_count: self.columns.len(),
            });
        }
        if values.len() != self.row_count() {
            return Err(TableError::LengthMismatch {
                name: self.names[index].clone(),
                expected: self.row_count(),
                found: values.len(),
            });
        }
        self.columns[index] = values;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tq_types::Cell;

    use super::{Table, TableError};

    fn people() -> Table {
        Table::new(vec![
            (
                "name".to_owned(),
                vec![
                    Cell::Str("Alice".to_owned()),
                    Cell::Str("Bob".to_owned()),
                    Cell::Str("Charlie".to_owned()),
                ],
            ),
            (
                "age".to_owned(),
                vec![Cell::Number(25.0), Cell::Number(30.0), Cell::Number(35.0)],
            ),
        ])
        .expect("table")
    }

    #[test]
    fn new_rejects_duplicate_column_names() {
        let err = Table::new(vec![
            ("a".to_owned(), vec![Cell::Number(1.0)]),
            ("a".to_owned(), vec![Cell::Number(2.0)]),
        ])
        .expect_err("duplicate must fail");
        assert_eq!(
            err,
            TableError::DuplicateColumn {
                name: "a".to_owned()
            }
        );
    }

    #[test]
    fn new_rejects_ragged_columns() {
        let err = Table::new(vec![
            ("a".to_owned(), vec![Cell::Number(1.0), Cell::Number(2.0)]),
            ("b".to_owned(), vec![Cell::Number(3.0)]),
        ])
        .expect_err("ragged must fail");
        assert!(matches!(err, TableError::LengthMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn select_narrows_and_reorders() {
        let out = people()
            .select(&["age".to_owned(), "name".to_owned()])
            .expect("select");
        assert_eq!(out.column_names(), &["age".to_owned(), "name".to_owned()]);
        assert_eq!(out.row_count(), 3);
        assert_eq!(out.column("age").expect("age")[0], Cell::Number(25.0));
    }

    #[test]
    fn select_unknown_column_fails() {
        let err = people()
            .select(&["salary".to_owned()])
            .expect_err("unknown column");
        assert_eq!(
            err,
            TableError::UnknownColumn {
                name: "salary".to_owned()
            }
        );
    }

    #[test]
    fn select_same_column_twice_fails() {
        let err = people()
            .select(&["name".to_owned(), "name".to_owned()])
            .expect_err("duplicate request");
        assert_eq!(
            err,
            TableError::DuplicateColumn {
                name: "name".to_owned()
            }
        );
    }

    #[test]
    fn take_reorders_rows_and_bounds_checks() {
        let out = people().take(&[2, 0]).expect("take");
        assert_eq!(
            out.column("name").expect("name"),
            &[Cell::Str("Charlie".to_owned()), Cell::Str("Alice".to_owned())]
        );

        let err = people().take(&[3]).expect_err("out of bounds");
        assert_eq!(
            err,
            TableError::RowOutOfBounds {
                position: 3,
                row_count: 3
            }
        );
    }

    #[test]
    fn head_and_tail_clamp_to_row_count() {
        let table = people();
        assert_eq!(table.head(2).row_count(), 2);
        assert_eq!(table.head(10).row_count(), 3);

        let tail = table.tail(2);
        assert_eq!(
            tail.column("name").expect("name"),
            &[Cell::Str("Bob".to_owned()), Cell::Str("Charlie".to_owned())]
        );
        assert_eq!(table.tail(10).row_count(), 3);
    }

    #[test]
    fn replace_column_validates_length() {
        let mut table = people();
        let err = table
            .replace_column(1, vec![Cell::Number(1.0)])
            .expect_err("short column");
        assert!(matches!(err, TableError::LengthMismatch { .. }));

        table
            .replace_column(
                1,
                vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Number(3.0)],
            )
            .expect("replace");
        assert_eq!(table.column("age").expect("age")[2], Cell::Number(3.0));
    }
}
