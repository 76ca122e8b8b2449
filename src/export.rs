//! JSON artifact built from one refined table.

use serde_json::{Map, Number, Value as Json, json};

use crate::refine::{RefinedTable, Value};
use crate::token::{BaseType, Platform};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportError {
    #[error("Table '{table}' already has a column named '{field}'")]
    DuplicateField { table: String, field: String },
}

/// Source of the client row name.
#[derive(Debug, Clone, Copy)]
enum RowName {
    /// A string column of the row-name field's name.
    Column(usize),
    /// The row's leading Id cell, whether or not the client keeps that column.
    Id,
}

/// `{ infos, header, rows }` for `table`. Key order follows column order.
pub fn build_json(
    table: &RefinedTable,
    platform: Platform,
    row_name_field: &str,
) -> Result<Json, ExportError> {
    let row_name = match platform {
        Platform::Server => None,
        Platform::Client => match table.column_index(row_name_field) {
            Some(i) if table.columns[i].base == BaseType::String => Some(RowName::Column(i)),
            Some(_) => {
                return Err(ExportError::DuplicateField {
                    table: table.name.clone(),
                    field: row_name_field.to_string(),
                });
            }
            None => Some(RowName::Id),
        },
    };
    let consumed = match row_name {
        Some(RowName::Column(i)) => Some(i),
        _ => None,
    };

    let mut header = Map::new();
    if row_name.is_some() {
        header.insert(
            row_name_field.to_string(),
            Json::String(BaseType::String.type_name(platform)),
        );
    }
    for (i, column) in table.columns.iter().enumerate() {
        if Some(i) != consumed {
            header.insert(column.name.clone(), Json::String(column.base.type_name(platform)));
        }
    }

    let rows: Vec<Json> = table
        .rows
        .iter()
        .enumerate()
        .map(|(r, cells)| {
            let mut row = Map::new();
            if let Some(source) = row_name {
                let name = match source {
                    RowName::Column(i) => cells.get(i).map(Value::to_string),
                    RowName::Id => table.ids.get(r).cloned(),
                };
                row.insert(
                    row_name_field.to_string(),
                    Json::String(name.unwrap_or_default()),
                );
            }
            for (i, (column, cell)) in table.columns.iter().zip(cells).enumerate() {
                if Some(i) != consumed {
                    row.insert(column.name.clone(), to_json(cell));
                }
            }
            Json::Object(row)
        })
        .collect();

    Ok(json!({
        "infos": {
            "rowcount": table.row_count(),
            "dataHashCode": table.fingerprint,
        },
        "header": header,
        "rows": rows,
    }))
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Int(v) => Json::from(*v),
        Value::Float(v) => Number::from_f64(*v)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(v.to_string())),
        Value::Text(s) | Value::Composite(s) | Value::Enum(s) => Json::String(s.clone()),
    }
}
