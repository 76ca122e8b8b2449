//! Folds split tables (`Item_1`, `Item_2`, ...) into one logical table.

use std::collections::HashSet;

use crate::observe::{Event, Observer};
use crate::table::{RawTable, Workbook};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    #[error("Table name '{0}' must be '<name>' or '<name>_<suffix>'")]
    NamingConventionViolation(String),
    #[error("Table '{0}' appears more than once")]
    DuplicateTable(String),
    #[error("Table '{table}' declares column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },
    #[error("Table '{table}' row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Table schema is not matched. {logical}, source: [{expected}], dest({part}): [{found}]")]
    SchemaMismatch {
        logical: String,
        part: String,
        expected: String,
        found: String,
    },
}

/// Logical table name: the part before the single `_`, or the whole name.
pub fn logical_name(table: &str) -> Result<&str, MergeError> {
    let mut parts = table.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(whole), None, _) => Ok(whole),
        (Some(prefix), Some(suffix), None) if !prefix.is_empty() && !suffix.is_empty() => {
            Ok(prefix)
        }
        _ => Err(MergeError::NamingConventionViolation(table.to_string())),
    }
}

/// Merge every table sharing a logical name. Fails on the first violation
/// without returning a partial workbook.
pub fn merge(workbook: Workbook, observer: &dyn Observer) -> Result<Workbook, MergeError> {
    let Workbook {
        tables,
        exported_at,
    } = workbook;

    {
        let mut seen = HashSet::new();
        for table in &tables {
            check_shape(table)?;
            if !seen.insert(table.name.as_str()) {
                return Err(MergeError::DuplicateTable(table.name.clone()));
            }
        }
    }

    let mut merged: Vec<RawTable> = Vec::new();

    for mut table in tables {
        let logical = logical_name(&table.name)?.to_string();

        match merged.iter_mut().find(|m| m.name == logical) {
            Some(base) => append(base, table, observer)?,
            None => {
                observer.observe(&Event::TableMerged {
                    logical: &logical,
                    source: &table.name,
                    rows: table.rows.len(),
                });
                table.name = logical;
                merged.push(table);
            }
        }
    }

    Ok(Workbook {
        tables: merged,
        exported_at,
    })
}

fn check_shape(table: &RawTable) -> Result<(), MergeError> {
    let mut columns = HashSet::new();
    for column in &table.columns {
        if !columns.insert(column.as_str()) {
            return Err(MergeError::DuplicateColumn {
                table: table.name.clone(),
                column: column.clone(),
            });
        }
    }

    let expected = table.columns.len();
    for (row, cells) in table.rows.iter().enumerate() {
        if cells.len() != expected {
            return Err(MergeError::RaggedRow {
                table: table.name.clone(),
                row,
                expected,
                found: cells.len(),
            });
        }
    }

    Ok(())
}

fn append(base: &mut RawTable, part: RawTable, observer: &dyn Observer) -> Result<(), MergeError> {
    let mismatch = |expected: String, found: String| MergeError::SchemaMismatch {
        logical: base.name.clone(),
        part: part.name.clone(),
        expected,
        found,
    };

    if base.columns != part.columns {
        return Err(mismatch(base.columns.join(", "), part.columns.join(", ")));
    }

    // Enum tables have no type-declaration row; every row is an entry.
    let skip = if base.is_enum() {
        0
    } else {
        let expected = base.type_row().map(|r| r.join(", ")).unwrap_or_default();
        let found = part.type_row().map(|r| r.join(", ")).unwrap_or_default();
        if expected != found {
            return Err(mismatch(expected, found));
        }
        1
    };

    let appended = part.rows.len().saturating_sub(skip);
    observer.observe(&Event::TableMerged {
        logical: &base.name,
        source: &part.name,
        rows: appended,
    });

    base.rows.extend(part.rows.into_iter().skip(skip));
    Ok(())
}
