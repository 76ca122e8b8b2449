//! Workbook ingestion from JSON table dumps.
//!
//! A source is either one file or a directory whose `*.json` files are read in
//! name order. Each file holds `{"tables": [{"name", "columns", "rows"}]}`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::table::{RawTable, Workbook, is_comment};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid workbook {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Export timestamp stamped onto the workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    System,
    Pinned(DateTime<Utc>),
}

impl Clock {
    pub fn now(self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Pinned(at) => at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceOptions {
    pub clock: Clock,
}

pub fn load(path: &Path, options: &SourceOptions) -> Result<Workbook, SourceError> {
    let files = if path.is_dir() {
        workbook_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut tables = Vec::new();
    for file in &files {
        let content = std::fs::read_to_string(file).map_err(|source| SourceError::Io {
            path: file.clone(),
            source,
        })?;
        let workbook = from_json(&content).map_err(|source| SourceError::Parse {
            path: file.clone(),
            source,
        })?;
        tables.extend(workbook.tables);
    }

    let mut workbook = Workbook::new(tables);
    workbook.exported_at = Some(options.clock.now());
    Ok(workbook)
}

/// Parses and cleans one workbook document.
pub fn from_json(content: &str) -> Result<Workbook, serde_json::Error> {
    let workbook: Workbook = serde_json::from_str(content)?;
    Ok(Workbook::new(
        workbook.tables.into_iter().filter_map(clean).collect(),
    ))
}

fn workbook_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let io = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Editor lock files and commented-out sheets.
        if name.starts_with('~') || is_comment(name) {
            continue;
        }
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Trims names and cells, drops commented tables and blank rows.
fn clean(mut table: RawTable) -> Option<RawTable> {
    table.name = table.name.trim().to_string();
    if table.name.is_empty() || is_comment(&table.name) {
        return None;
    }

    for column in &mut table.columns {
        *column = column.trim().to_string();
    }
    table.rows = table
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(|c| c.trim().to_string()).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    Some(table)
}
