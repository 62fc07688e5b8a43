#![forbid(unsafe_code)]

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use thiserror::Error;
use tq_pipeline::Evaluated;
use tq_table::{Table, TableError};
use tq_types::Cell;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("input contains no columns")]
    Empty,
    #[error("{found} column names were supplied for {expected} columns")]
    ColumnCountMismatch { expected: usize, found: usize },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// How to interpret delimited input.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub has_header: bool,
    /// Replaces the schema after the read; the count must match the input's
    /// width. Independent of `has_header`, so it can rename a header row or
    /// name a headerless file's synthesized columns.
    pub column_names: Option<Vec<String>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            column_names: None,
        }
    }
}

/// Read delimited input into a [`Table`].
///
/// Fields are classified per cell: empty text is `Null`, `true`/`false`
/// (ASCII case-insensitive) are `Bool`, anything that parses as `f64` is
/// `Number`, the rest stays `Str`. Without a header row, names are
/// synthesized as `column_1..column_N`. Ragged rows are an error; so is
/// input with no columns at all.
pub fn read_csv<R: Read>(input: R, options: &ReadOptions) -> Result<Table, ReadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(options.has_header)
        .delimiter(options.delimiter)
        .from_reader(input);

    let mut names: Vec<String> = Vec::new();
    if options.has_header {
        names = reader.headers()?.iter().map(str::to_owned).collect();
    }

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record?;
        if names.is_empty() {
            names = (1..=record.len()).map(|i| format!("column_{i}")).collect();
            columns = vec![Vec::new(); names.len()];
        }
        for (index, field) in record.iter().enumerate() {
            if let Some(column) = columns.get_mut(index) {
                column.push(classify_field(field));
            }
        }
    }

    if names.is_empty() {
        return Err(ReadError::Empty);
    }
    if let Some(overrides) = &options.column_names {
        if overrides.len() != names.len() {
            return Err(ReadError::ColumnCountMismatch {
                expected: names.len(),
                found: overrides.len(),
            });
        }
        names = overrides.clone();
    }

    Ok(Table::new(names.into_iter().zip(columns).collect())?)
}

pub fn read_csv_str(input: &str, options: &ReadOptions) -> Result<Table, ReadError> {
    read_csv(input.as_bytes(), options)
}

pub fn read_csv_path<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Table, ReadError> {
    let file = File::open(path)?;
    read_csv(file, options)
}

fn classify_field(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Cell::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Cell::Bool(false);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Cell::Number(value);
    }
    Cell::Str(trimmed.to_owned())
}

/// Serialize a table as delimited text: header row first, nulls as empty
/// fields, numbers without a redundant `.0`.
pub fn write_csv(table: &Table, delimiter: u8) -> Result<String, WriteError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(table.column_names())?;
    for row in 0..table.row_count() {
        let record: Vec<String> = table
            .columns()
            .map(|(_, cells)| cells[row].render())
            .collect();
        writer.write_record(&record)?;
    }
    let bytes = writer.into_inner().map_err(|error| error.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Csv,
    Tsv,
}

/// Render an evaluation result as printable text ending in a newline.
///
/// The format applies to table results only: a scalar is always its single
/// rendered value and a list is always one item per line.
pub fn render(result: &Evaluated, format: OutputFormat) -> Result<String, WriteError> {
    match result {
        Evaluated::Scalar(cell) => Ok(format!("{}\n", cell.render())),
        Evaluated::List(cells) => {
            let mut out = String::new();
            for cell in cells {
                out.push_str(&cell.render());
                out.push('\n');
            }
            Ok(out)
        }
        Evaluated::Table(table) => match format {
            OutputFormat::Plain => Ok(render_plain(table)),
            OutputFormat::Csv => write_csv(table, b','),
            OutputFormat::Tsv => write_csv(table, b'\t'),
        },
    }
}

fn render_plain(table: &Table) -> String {
    let mut widths: Vec<usize> = table
        .column_names()
        .iter()
        .map(|name| name.chars().count())
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let rendered: Vec<String> = table
            .columns()
            .map(|(_, cells)| cells[row].render())
            .collect();
        for (index, text) in rendered.iter().enumerate() {
            widths[index] = widths[index].max(text.chars().count());
        }
        rows.push(rendered);
    }

    let mut out = String::new();
    push_row(
        &mut out,
        &widths,
        table.column_names().iter().map(String::as_str),
    );
    let underline: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_row(&mut out, &widths, underline.iter().map(String::as_str));
    for row in &rows {
        push_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    let count = table.row_count();
    let noun = if count == 1 { "row" } else { "rows" };
    out.push_str(&format!("({count} {noun})\n"));
    out
}

fn push_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let cells: Vec<&str> = cells.collect();
    for (index, text) in cells.iter().enumerate() {
        if index > 0 {
            out.push_str("  ");
        }
        out.push_str(text);
        // The last column is never padded, so lines carry no trailing blanks.
        if index + 1 < cells.len() {
            let pad = widths[index].saturating_sub(text.chars().count());
            for _ in 0..pad {
                out.push(' ');
            }
        }
    }
    out.push('\n');
}
