#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Null,
    Bool,
    Number,
    Str,
}

/// One typed value inside a table column.
///
/// Numbers are uniformly `f64`; ingestion decides whether a field becomes a
/// number, a boolean, text, or a missing marker, and nothing downstream
/// coerces between kinds implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Cell {
    #[must_use]
    pub fn kind(&self) -> CellKind {
        match self {
            Self::Null => CellKind::Null,
            Self::Bool(_) => CellKind::Bool,
            Self::Number(_) => CellKind::Number,
            Self::Str(_) => CellKind::Str,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Render the cell as display/CSV text: null is empty, integral floats
    /// drop the trailing `.0`.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(v) => v.to_string(),
            Self::Number(v) => render_number(*v),
            Self::Str(v) => v.clone(),
        }
    }
}

#[must_use]
pub fn render_number(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value == value.trunc()
        && value.is_finite()
        && value >= i64::MIN as f64
        && value <= i64::MAX as f64
    {
        return format!("{}", value as i64);
    }
    value.to_string()
}

/// A literal written inside an expression: `30`, `'IT'`, `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
}

#[cfg(test)]
mod tests {
    use super::{Cell, CellKind, Literal, render_number};

    #[test]
    fn cell_kind_matches_variant() {
        assert_eq!(Cell::Null.kind(), CellKind::Null);
        assert_eq!(Cell::Bool(true).kind(), CellKind::Bool);
        assert_eq!(Cell::Number(1.5).kind(), CellKind::Number);
        assert_eq!(Cell::Str("x".to_owned()).kind(), CellKind::Str);
    }

    #[test]
    fn render_trims_integral_floats() {
        assert_eq!(render_number(60000.0), "60000");
        assert_eq!(render_number(-2.0), "-2");
        assert_eq!(render_number(2.5), "2.5");
        assert_eq!(render_number(f64::NAN), "");
    }

    #[test]
    fn render_null_is_empty() {
        assert_eq!(Cell::Null.render(), "");
        assert_eq!(Cell::Str("HR".to_owned()).render(), "HR");
        assert_eq!(Cell::Bool(false).render(), "false");
    }

    #[test]
    fn literal_round_trips_through_serde() {
        let json = serde_json::to_string(&Literal::Str("IT".to_owned())).expect("serialize");
        assert_eq!(json, r#"{"kind":"str","value":"IT"}"#);
        let back: Literal = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Literal::Str("IT".to_owned()));
    }

    #[test]
    fn cell_serializes_with_tagged_kind() {
        let json = serde_json::to_string(&Cell::Number(2.5)).expect("serialize");
        assert_eq!(json, r#"{"kind":"number","value":2.5}"#);
        let back: Cell = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Cell::Number(2.5));
    }
}
