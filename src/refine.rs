//! Turns merged raw tables into typed, platform-filtered tables.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::observe::{Event, Observer, Stage};
use crate::table::{RawTable, Workbook, is_comment};
use crate::token::{BaseType, Platform, TokenError, TypeToken};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefineError {
    #[error("Table '{table}' has no type-declaration row")]
    MissingTypeRow { table: String },
    #[error("Table '{table}': {source}")]
    Token {
        table: String,
        #[source]
        source: TokenError,
    },
    #[error("Fail to pass null. table: {table}, Id: {id}, type: {declared}, column: {column}")]
    NullabilityViolation {
        table: String,
        id: String,
        column: String,
        declared: String,
    },
    #[error("Invalid {declared} value {value:?}. table: {table}, Id: {id}, column: {column}")]
    InvalidValue {
        table: String,
        id: String,
        column: String,
        declared: String,
        value: String,
    },
    #[error(
        "Unknown enumerator {value:?} for {declared}. table: {table}, Id: {id}, column: {column}"
    )]
    UnresolvedEnumReference {
        table: String,
        id: String,
        column: String,
        declared: String,
        value: String,
    },
    #[error("Duplicate Id {id:?} in table '{table}'")]
    DuplicateId { table: String, id: String },
}

/// A refined cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    /// Vector or rotator in its canonical `(K=v,...)` text form.
    Composite(String),
    /// Enumerator symbol; empty for a defaulted nullable cell.
    Enum(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) | Value::Composite(s) | Value::Enum(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinedColumn {
    pub name: String,
    pub base: BaseType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinedTable {
    pub name: String,
    pub platform: Platform,
    pub columns: Vec<RefinedColumn>,
    pub rows: Vec<Vec<Value>>,
    /// Leading Id cell of each row, kept even when the Id column is not.
    pub ids: Vec<String>,
    /// Order-sensitive xxHash64 over every cell; a change detector only.
    pub fingerprint: u64,
}

impl RefinedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Enumerator names per enum table.
type EnumCatalog<'a> = HashMap<&'a str, HashSet<&'a str>>;

fn enum_catalog(workbook: &Workbook) -> EnumCatalog<'_> {
    workbook
        .enum_tables()
        .map(|t| {
            let symbols = t
                .rows
                .iter()
                .filter_map(|r| r.first())
                .map(|s| s.as_str())
                .filter(|s| !s.is_empty() && !is_comment(s))
                .collect();
            (t.name.as_str(), symbols)
        })
        .collect()
}

/// Refine every data table of a merged workbook for one platform.
pub fn refine(
    workbook: &Workbook,
    platform: Platform,
    observer: &dyn Observer,
) -> Result<Vec<RefinedTable>, RefineError> {
    let catalog = enum_catalog(workbook);
    let mut refined = Vec::new();

    for table in &workbook.tables {
        if !table.is_data() {
            observer.observe(&Event::TableSkipped {
                stage: Stage::Refine,
                table: &table.name,
                reason: "not a data table",
            });
            continue;
        }
        refined.push(refine_table(table, platform, &catalog, observer)?);
    }

    Ok(refined)
}

fn refine_table(
    table: &RawTable,
    platform: Platform,
    catalog: &EnumCatalog<'_>,
    observer: &dyn Observer,
) -> Result<RefinedTable, RefineError> {
    let type_row = table.type_row().ok_or_else(|| RefineError::MissingTypeRow {
        table: table.name.clone(),
    })?;

    let tokens = table
        .columns
        .iter()
        .zip(type_row)
        .map(|(column, cell)| TypeToken::parse(column, cell))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| RefineError::Token {
            table: table.name.clone(),
            source,
        })?;

    // Columns kept for this platform, with their base type.
    let mut kept: Vec<(usize, &TypeToken, &BaseType)> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.base_type() {
            Some(base) if token.includes(platform) => {
                if let BaseType::Enum(name) = base {
                    if !catalog.contains_key(name.as_str()) {
                        observer.observe(&Event::EnumUnchecked {
                            table: &table.name,
                            column: &table.columns[i],
                            enum_name: name,
                        });
                    }
                }
                kept.push((i, token, base));
            }
            _ => observer.observe(&Event::ColumnExcluded {
                table: &table.name,
                column: &table.columns[i],
                platform,
            }),
        }
    }

    let mut hasher = XxHash64::with_seed(0);
    let mut ids = HashSet::new();
    let mut rows = Vec::with_capacity(table.data_rows().len());
    let mut row_ids = Vec::with_capacity(table.data_rows().len());

    for raw in table.data_rows() {
        let cell = |i: usize| raw.get(i).map(|s| s.as_str()).unwrap_or("");
        let id = cell(0);

        if !ids.insert(id) {
            return Err(RefineError::DuplicateId {
                table: table.name.clone(),
                id: id.to_string(),
            });
        }

        let mut row = Vec::with_capacity(kept.len());
        for &(i, token, base) in &kept {
            let context = || CellContext {
                table: &table.name,
                id,
                column: &table.columns[i],
                declared: &type_row[i],
            };

            let mut text = cell(i);
            if text.is_empty() {
                if !token.nullable {
                    return Err(context().nullability());
                }
                text = base.null_default();
            }

            let value = convert(base, text, catalog).map_err(|kind| context().error(kind, text))?;

            let canonical = value.to_string();
            hasher.write(&(canonical.len() as u64).to_le_bytes());
            hasher.write(canonical.as_bytes());

            row.push(value);
        }
        rows.push(row);
        row_ids.push(id.to_string());
    }

    let columns = kept
        .iter()
        .map(|&(i, _, base)| RefinedColumn {
            name: table.columns[i].clone(),
            base: base.clone(),
        })
        .collect();

    let refined = RefinedTable {
        name: table.name.clone(),
        platform,
        columns,
        rows,
        ids: row_ids,
        fingerprint: hasher.finish(),
    };

    observer.observe(&Event::TableRefined {
        table: &refined.name,
        platform,
        rows: refined.row_count(),
        fingerprint: refined.fingerprint,
    });

    Ok(refined)
}

struct CellContext<'a> {
    table: &'a str,
    id: &'a str,
    column: &'a str,
    declared: &'a str,
}

enum ConvertError {
    Invalid,
    UnknownEnumerator,
}

impl CellContext<'_> {
    fn nullability(&self) -> RefineError {
        RefineError::NullabilityViolation {
            table: self.table.to_string(),
            id: self.id.to_string(),
            column: self.column.to_string(),
            declared: self.declared.to_string(),
        }
    }

    fn error(&self, kind: ConvertError, value: &str) -> RefineError {
        let (table, id, column, declared, value) = (
            self.table.to_string(),
            self.id.to_string(),
            self.column.to_string(),
            self.declared.to_string(),
            value.to_string(),
        );
        match kind {
            ConvertError::Invalid => RefineError::InvalidValue {
                table,
                id,
                column,
                declared,
                value,
            },
            ConvertError::UnknownEnumerator => RefineError::UnresolvedEnumReference {
                table,
                id,
                column,
                declared,
                value,
            },
        }
    }
}

fn convert(base: &BaseType, text: &str, catalog: &EnumCatalog<'_>) -> Result<Value, ConvertError> {
    match base {
        BaseType::Int32 => text
            .parse::<i32>()
            .map(|v| Value::Int(v.into()))
            .map_err(|_| ConvertError::Invalid),
        BaseType::Int64 => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ConvertError::Invalid),
        // `float` is single precision on both targets.
        BaseType::Float => match text.parse::<f64>() {
            Ok(v) if v.is_finite() && (v as f32).is_finite() => Ok(Value::Float(v)),
            _ => Err(ConvertError::Invalid),
        },
        BaseType::Double => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Value::Float(v)),
            _ => Err(ConvertError::Invalid),
        },
        BaseType::Vector => composite(text, &["X", "Y", "Z"]),
        BaseType::Rotator => composite(text, &["P", "Y", "R"]),
        BaseType::String => Ok(Value::Text(text.to_string())),
        BaseType::Enum(name) => {
            let known = catalog.get(name.as_str());
            match known {
                Some(symbols) if !text.is_empty() && !symbols.contains(text) => {
                    Err(ConvertError::UnknownEnumerator)
                }
                _ => Ok(Value::Enum(text.to_string())),
            }
        }
    }
}

/// Accepts `(X=1,Y=2,Z=3)` as well as the `X=1 Y=2 Z=3` form; every key must
/// appear exactly once with a numeric value.
fn composite(text: &str, keys: &[&str]) -> Result<Value, ConvertError> {
    let inner = text
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(text);

    let mut seen = Vec::with_capacity(keys.len());
    for part in inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
    {
        let (key, value) = part.split_once('=').ok_or(ConvertError::Invalid)?;
        if !keys.contains(&key) || seen.contains(&key) || value.parse::<f64>().is_err() {
            return Err(ConvertError::Invalid);
        }
        seen.push(key);
    }

    if seen.len() != keys.len() {
        return Err(ConvertError::Invalid);
    }
    Ok(Value::Composite(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{NullObserver, RecordingObserver};

    fn refine_one(table: RawTable, platform: Platform) -> Result<RefinedTable, RefineError> {
        refine(&Workbook::new(vec![table]), platform, &NullObserver)
            .map(|mut tables| tables.remove(0))
    }

    fn power_table(cell: &str, type_cell: &str) -> RawTable {
        RawTable::from_strs(
            "Item",
            &["Id", "Power"],
            &[&["int32_cs", type_cell], &["1", "10"], &["2", cell]],
        )
    }

    #[test]
    fn test_nullability_violation() {
        let err = refine_one(power_table("", "int32_cs"), Platform::Server).unwrap_err();
        assert_eq!(
            err,
            RefineError::NullabilityViolation {
                table: "Item".into(),
                id: "2".into(),
                column: "Power".into(),
                declared: "int32_cs".into(),
            }
        );
    }

    #[test]
    fn test_nullable_gets_default() {
        let t = refine_one(power_table("", "int32?_cs"), Platform::Server).unwrap();
        assert_eq!(t.rows[1], vec![Value::Int(2), Value::Int(0)]);
    }

    #[test]
    fn test_nullable_defaults_per_type() {
        let t = RawTable::from_strs(
            "Spawn",
            &["Id", "Pos", "Rot", "Scale", "Label"],
            &[
                &["int32_s", "vector?_s", "rotator?_s", "float?_s", "string?_s"],
                &["1", "", "", "", ""],
            ],
        );
        let t = refine_one(t, Platform::Server).unwrap();
        assert_eq!(
            t.rows[0],
            vec![
                Value::Int(1),
                Value::Composite("(X=0,Y=0,Z=0)".into()),
                Value::Composite("(P=0,Y=0,R=0)".into()),
                Value::Float(0.0),
                Value::Text(String::new()),
            ]
        );
    }

    #[test]
    fn test_platform_exclusion() {
        let t = RawTable::from_strs(
            "Item",
            &["Id", "Icon", "Drop"],
            &[&["int32_cs", "string_c", "int32_s"], &["1", "icon.png", "5"]],
        );

        let server = refine_one(t.clone(), Platform::Server).unwrap();
        let names: Vec<&str> = server.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Drop"]);
        assert_eq!(server.rows[0], vec![Value::Int(1), Value::Int(5)]);

        let client = refine_one(t, Platform::Client).unwrap();
        let names: Vec<&str> = client.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Icon"]);
        assert_eq!(client.ids, vec!["1"]);
    }

    #[test]
    fn test_excluded_column_is_not_null_checked() {
        let t = RawTable::from_strs(
            "Item",
            &["Id", "Icon"],
            &[&["int32_cs", "string_c"], &["1", ""]],
        );
        assert!(refine_one(t.clone(), Platform::Server).is_ok());
        assert!(refine_one(t, Platform::Client).is_err());
    }

    #[test]
    fn test_comment_columns_dropped() {
        let t = RawTable::from_strs(
            "Item",
            &["Id", "#Memo", "Note"],
            &[&["int32_cs", "string_cs", "#free text"], &["1", "", ""]],
        );
        let t = refine_one(t, Platform::Client).unwrap();
        assert_eq!(t.columns.len(), 1);
        assert_eq!(t.rows[0], vec![Value::Int(1)]);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = refine_one(power_table("20", "int32_cs"), Platform::Server).unwrap();
        let b = refine_one(power_table("20", "int32_cs"), Platform::Server).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.row_count(), b.row_count());

        let mut grown = power_table("20", "int32_cs");
        grown.rows.push(vec!["3".into(), "30".into()]);
        let c = refine_one(grown, Platform::Server).unwrap();
        assert_eq!(c.row_count(), 3);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let t1 = RawTable::from_strs(
            "T",
            &["Id", "A"],
            &[&["int32_s", "string_s"], &["1", "x"], &["2", "y"]],
        );
        let t2 = RawTable::from_strs(
            "T",
            &["Id", "A"],
            &[&["int32_s", "string_s"], &["2", "y"], &["1", "x"]],
        );
        let a = refine_one(t1, Platform::Server).unwrap();
        let b = refine_one(t2, Platform::Server).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_invalid_values() {
        let err = refine_one(power_table("ten", "int32_cs"), Platform::Server).unwrap_err();
        assert!(matches!(err, RefineError::InvalidValue { ref value, .. } if value == "ten"));

        let err = refine_one(power_table("3000000000", "int32_cs"), Platform::Server).unwrap_err();
        assert!(matches!(err, RefineError::InvalidValue { .. }));

        assert!(refine_one(power_table("3000000000", "int64_cs"), Platform::Server).is_ok());
        assert!(refine_one(power_table("NaN", "double_cs"), Platform::Server).is_err());
    }

    #[test]
    fn test_float_must_fit_single_precision() {
        let err = refine_one(power_table("1e39", "float_cs"), Platform::Server).unwrap_err();
        assert!(matches!(err, RefineError::InvalidValue { ref value, .. } if value == "1e39"));
        assert!(refine_one(power_table("-1e39", "float_cs"), Platform::Client).is_err());

        assert!(refine_one(power_table("3.4e38", "float_cs"), Platform::Server).is_ok());
        assert!(refine_one(power_table("1e39", "double_cs"), Platform::Server).is_ok());
    }

    #[test]
    fn test_composite_forms() {
        let keys = ["X", "Y", "Z"];
        assert!(composite("(X=1,Y=2.5,Z=-3)", &keys).is_ok());
        assert!(composite("X=1 Y=2 Z=3", &keys).is_ok());
        assert!(composite("(X=1,Y=2)", &keys).is_err());
        assert!(composite("(X=1,Y=2,Z=a)", &keys).is_err());
        assert!(composite("(X=1,X=2,Z=3)", &keys).is_err());
        assert!(composite("(P=1,Y=2,R=3)", &keys).is_err());
    }

    #[test]
    fn test_enum_symbols_checked() {
        let color = RawTable::from_strs(
            "Color",
            &["Enum", "Value", "Description"],
            &[&["Red", "", ""], &["#Old", "", ""], &["Blue", "", ""]],
        );
        let item = |value: &str| {
            RawTable::from_strs(
                "Item",
                &["Id", "Color"],
                &[&["int32_s", "Enum_Color?_s"], &["1", value]],
            )
        };

        let wb = Workbook::new(vec![color.clone(), item("Blue")]);
        let t = refine(&wb, Platform::Server, &NullObserver).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].rows[0][1], Value::Enum("Blue".into()));

        let wb = Workbook::new(vec![color.clone(), item("")]);
        assert!(refine(&wb, Platform::Server, &NullObserver).is_ok());

        let wb = Workbook::new(vec![color, item("Old")]);
        let err = refine(&wb, Platform::Server, &NullObserver).unwrap_err();
        assert!(matches!(err, RefineError::UnresolvedEnumReference { .. }));
    }

    #[test]
    fn test_unknown_enum_table_is_reported() {
        let obs = RecordingObserver::new();
        let t = RawTable::from_strs(
            "Item",
            &["Id", "Grade"],
            &[&["int32_s", "Enum_Grade_s"], &["1", "Rare"]],
        );
        let refined = refine(&Workbook::new(vec![t]), Platform::Server, &obs).unwrap();
        assert_eq!(refined[0].rows[0][1], Value::Enum("Rare".into()));
        assert!(obs.contains("references unknown enum table Grade"));
    }

    #[test]
    fn test_duplicate_id() {
        let t = RawTable::from_strs("Item", &["Id"], &[&["int32_s"], &["1"], &["1"]]);
        let err = refine_one(t, Platform::Server).unwrap_err();
        assert_eq!(
            err,
            RefineError::DuplicateId {
                table: "Item".into(),
                id: "1".into()
            }
        );
    }

    #[test]
    fn test_malformed_token_is_fatal() {
        let t = RawTable::from_strs("Item", &["Id", "Bad"], &[&["int32_s", "int32"], &["1", "2"]]);
        let err = refine_one(t, Platform::Server).unwrap_err();
        assert!(matches!(err, RefineError::Token { .. }));
    }

    #[test]
    fn test_missing_type_row() {
        let t = RawTable::from_strs("Item", &["Id"], &[]);
        let err = refine_one(t, Platform::Server).unwrap_err();
        assert!(matches!(err, RefineError::MissingTypeRow { .. }));
    }

    #[test]
    fn test_non_data_tables_skipped() {
        let wb = Workbook::new(vec![
            RawTable::from_strs("Color", &["Enum", "Value", "Description"], &[]),
            RawTable::from_strs("#Item", &["Id"], &[&["int32_s"]]),
        ]);
        assert!(refine(&wb, Platform::Client, &NullObserver).unwrap().is_empty());
    }
}
