//! Raw spreadsheet tables as handed over by ingestion.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Leading character that marks a table, column, type cell or enum row as
/// excluded from generation.
pub const COMMENT_MARKER: char = '#';

pub fn is_comment(text: &str) -> bool {
    text.starts_with(COMMENT_MARKER)
}

/// A table of strings. For data tables row 0 is the type-declaration row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTable {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// First column is `Id`.
    Data,
    /// First three columns are `Enum`, `Value`, `Description`.
    Enum,
    Other,
}

impl RawTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Convenience constructor for literal tables.
    pub fn from_strs(name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn kind(&self) -> TableKind {
        if is_comment(&self.name) {
            return TableKind::Other;
        }

        let col = |i: usize| self.columns.get(i).map(|s| s.as_str());
        if col(0) == Some("Id") {
            TableKind::Data
        } else if col(0) == Some("Enum") && col(1) == Some("Value") && col(2) == Some("Description")
        {
            TableKind::Enum
        } else {
            TableKind::Other
        }
    }

    pub fn is_data(&self) -> bool {
        self.kind() == TableKind::Data
    }

    pub fn is_enum(&self) -> bool {
        self.kind() == TableKind::Enum
    }

    pub fn type_row(&self) -> Option<&[String]> {
        self.rows.first().map(|r| r.as_slice())
    }

    /// Rows after the type-declaration row.
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// Ordered collection of raw tables, threaded through the pipeline by value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Workbook {
    pub tables: Vec<RawTable>,
    /// Export clock stamped by ingestion; rendered into header banners.
    #[serde(skip)]
    pub exported_at: Option<DateTime<Utc>>,
}

impl Workbook {
    pub fn new(tables: Vec<RawTable>) -> Self {
        Self {
            tables,
            exported_at: None,
        }
    }

    pub fn data_tables(&self) -> impl Iterator<Item = &RawTable> {
        self.tables.iter().filter(|t| t.is_data())
    }

    pub fn enum_tables(&self) -> impl Iterator<Item = &RawTable> {
        self.tables.iter().filter(|t| t.is_enum())
    }
}
