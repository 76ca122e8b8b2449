//! Declaration IR built from merged raw tables.
//!
//! Renderers only walk this IR; every decision about which fields exist, how
//! array columns fold together and how values are staged for serialization is
//! made here, once, for every target.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::table::{RawTable, Workbook, is_comment};
use crate::token::{ArrayIndex, BaseType, ENUM_PREFIX, Platform, TokenError, TypeToken};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("Table '{table}' has no type-declaration row")]
    MissingTypeRow { table: String },
    #[error("Table '{table}': {source}")]
    Token {
        table: String,
        #[source]
        source: TokenError,
    },
    #[error("Array group '{key}' in table '{table}' cannot be resolved at column '{column}': {reason}")]
    UnresolvedArrayGroup {
        table: String,
        column: String,
        key: String,
        reason: String,
    },
    #[error("Table '{table}' declares field '{field}' more than once")]
    DuplicateField { table: String, field: String },
    #[error("Invalid value {value:?} for enumerator '{name}' in enum table '{table}'")]
    InvalidEnumValue {
        table: String,
        name: String,
        value: String,
    },
    #[error("Enum table '{table}' declares no enumerators")]
    EmptyEnum { table: String },
    #[error("Enumerator '{name}' declared more than once in enum table '{table}'")]
    DuplicateEnumerator { table: String, name: String },
    #[error("Enumerator '{name}' of enum table '{table}' has ordinal {ordinal}, outside {min}..={max}")]
    EnumOrdinalOutOfRange {
        table: String,
        name: String,
        ordinal: i64,
        min: i64,
        max: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerator {
    pub name: String,
    pub explicit: Option<i64>,
    pub ordinal: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDoc {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    /// `Enum_<table>`
    pub name: String,
    pub table: String,
    pub entries: Vec<Enumerator>,
    pub docs: Vec<EnumDoc>,
}

impl EnumDecl {
    pub fn ordinal(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.ordinal)
    }

    /// Every ordinal must fit the target's underlying integer type.
    pub fn check_range(&self, min: i64, max: i64) -> Result<(), GenerateError> {
        match self
            .entries
            .iter()
            .find(|e| e.ordinal < min || e.ordinal > max)
        {
            Some(e) => Err(GenerateError::EnumOrdinalOutOfRange {
                table: self.table.clone(),
                name: e.name.clone(),
                ordinal: e.ordinal,
                min,
                max,
            }),
            None => Ok(()),
        }
    }
}

/// One enum declaration per enum table, in workbook order.
pub fn build_enums(workbook: &Workbook) -> Result<Vec<EnumDecl>, GenerateError> {
    workbook.enum_tables().map(build_enum).collect()
}

fn build_enum(table: &RawTable) -> Result<EnumDecl, GenerateError> {
    let mut entries: Vec<Enumerator> = Vec::new();
    let mut docs = Vec::new();
    let mut names = HashSet::new();

    for row in &table.rows {
        let cell = |i: usize| row.get(i).map(|s| s.as_str()).unwrap_or("");
        let (name, value, description) = (cell(0), cell(1), cell(2));

        // Commented rows take no ordinal.
        if name.is_empty() || is_comment(name) {
            continue;
        }

        if !names.insert(name) {
            return Err(GenerateError::DuplicateEnumerator {
                table: table.name.clone(),
                name: name.to_string(),
            });
        }

        let explicit = if value.is_empty() {
            None
        } else {
            Some(
                value
                    .parse::<i64>()
                    .map_err(|_| GenerateError::InvalidEnumValue {
                        table: table.name.clone(),
                        name: name.to_string(),
                        value: value.to_string(),
                    })?,
            )
        };

        let ordinal = match (explicit, entries.last()) {
            (Some(v), _) => v,
            (None, Some(prev)) => prev.ordinal + 1,
            (None, None) => 0,
        };

        if !description.is_empty() {
            docs.push(EnumDoc {
                name: name.to_string(),
                text: description.to_string(),
            });
        }

        entries.push(Enumerator {
            name: name.to_string(),
            explicit,
            ordinal,
        });
    }

    if entries.is_empty() {
        return Err(GenerateError::EmptyEnum {
            table: table.name.clone(),
        });
    }

    Ok(EnumDecl {
        name: format!("{}{}", ENUM_PREFIX, table.name),
        table: table.name.clone(),
        entries,
        docs,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Scalar(BaseType),
    Array(BaseType, usize),
}

impl FieldType {
    pub fn base(&self) -> &BaseType {
        match self {
            FieldType::Scalar(b) | FieldType::Array(b, _) => b,
        }
    }
}

/// Initializer of a scalar field, or of every slot of an array field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldInit {
    Default,
    /// Value-initialised (zero, empty string, zero vector).
    Zero,
    /// The enumeration's zero-valued member.
    EnumZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrigin {
    Column,
    /// Leading row name carried by client rows. A string column of the same
    /// name supplies it; otherwise it holds the row's Id.
    RowName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub init: FieldInit,
    pub origin: FieldOrigin,
}

/// Location of a value inside the row struct.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Field(String),
    Element { field: String, slot: usize },
}

/// Primitive temporary that the archive reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Shadow {
    pub name: String,
    /// Key in the serialized object; the source column name.
    pub key: String,
    pub ty: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `shadow = place`
    Load { shadow: String, place: Place },
    /// `shadow = place` by enumerator name
    EnumToName { shadow: String, place: Place },
    /// `shadow = place` as canonical text
    CompositeToText { shadow: String, place: Place },
    /// `place = shadow`
    Store { place: Place, shadow: String },
    /// `place = lookup(shadow)`; an unknown name fails decoding
    EnumFromName {
        place: Place,
        shadow: String,
        enum_type: String,
    },
    /// `place = parse(shadow)`
    CompositeFromText { place: Place, shadow: String },
}

/// Two-pass serialization through primitive shadows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Codec {
    pub shadows: Vec<Shadow>,
    pub encode: Vec<Stmt>,
    pub decode: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Field>,
    pub codec: Option<Codec>,
}

impl StructDecl {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One row struct per data table, in workbook order.
pub fn build_structs(
    workbook: &Workbook,
    platform: Platform,
    row_name_field: &str,
) -> Result<Vec<StructDecl>, GenerateError> {
    workbook
        .data_tables()
        .map(|t| build_struct(t, platform, row_name_field))
        .collect()
}

struct GroupMember<'a> {
    index: usize,
    column: &'a str,
    token: &'a TypeToken,
}

fn build_struct(
    table: &RawTable,
    platform: Platform,
    row_name_field: &str,
) -> Result<StructDecl, GenerateError> {
    let type_row = table
        .type_row()
        .ok_or_else(|| GenerateError::MissingTypeRow {
            table: table.name.clone(),
        })?;

    let tokens = table
        .columns
        .iter()
        .zip(type_row)
        .map(|(column, cell)| TypeToken::parse(column, cell))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| GenerateError::Token {
            table: table.name.clone(),
            source,
        })?;

    // Groups are collected over every column so arity does not depend on
    // which members a platform keeps.
    let mut groups: HashMap<String, Vec<GroupMember<'_>>> = HashMap::new();
    for (column, token) in table.columns.iter().zip(&tokens) {
        if let Some(a) = ArrayIndex::from_column(column) {
            groups.entry(a.key).or_default().push(GroupMember {
                index: a.index,
                column,
                token,
            });
        }
    }

    let mut fields = Vec::new();
    let mut field_names = HashSet::new();
    let mut checked_groups = HashSet::new();
    let mut codec = match platform {
        Platform::Server => Some(Codec::default()),
        Platform::Client => None,
    };

    let mut add_field = |fields: &mut Vec<Field>, field: Field| {
        if !field_names.insert(field.name.clone()) {
            return Err(GenerateError::DuplicateField {
                table: table.name.clone(),
                field: field.name,
            });
        }
        fields.push(field);
        Ok(())
    };

    if platform == Platform::Client {
        add_field(
            &mut fields,
            Field {
                name: row_name_field.to_string(),
                ty: FieldType::Scalar(BaseType::String),
                init: FieldInit::Default,
                origin: FieldOrigin::RowName,
            },
        )?;
    }

    for (column, token) in table.columns.iter().zip(&tokens) {
        let base = match token.base_type() {
            Some(base) if token.includes(platform) => base,
            _ => continue,
        };
        if platform == Platform::Client
            && column == row_name_field
            && *base == BaseType::String
        {
            continue;
        }
        let init = if base.is_enum() {
            FieldInit::EnumZero
        } else {
            FieldInit::Default
        };

        let place = match ArrayIndex::from_column(column) {
            Some(a) => {
                let arity = if checked_groups.contains(&a.key) {
                    None
                } else {
                    let members = groups.get(&a.key).map(Vec::as_slice).unwrap_or(&[]);
                    let arity = check_group(table, column, &a.key, members, platform)?;
                    checked_groups.insert(a.key.clone());
                    Some(arity)
                };

                if a.index == 1 {
                    let size = match arity {
                        Some(n) => n,
                        None => groups.get(&a.key).map(Vec::len).unwrap_or(0),
                    };
                    add_field(
                        &mut fields,
                        Field {
                            name: a.field_name(),
                            ty: FieldType::Array(base.clone(), size),
                            // Array slots are never left indeterminate.
                            init: match init {
                                FieldInit::Default => FieldInit::Zero,
                                other => other,
                            },
                            origin: FieldOrigin::Column,
                        },
                    )?;
                }

                Place::Element {
                    field: a.field_name(),
                    slot: a.slot(),
                }
            }
            None => {
                add_field(
                    &mut fields,
                    Field {
                        name: column.clone(),
                        ty: FieldType::Scalar(base.clone()),
                        init,
                        origin: FieldOrigin::Column,
                    },
                )?;
                Place::Field(column.clone())
            }
        };

        if let Some(codec) = codec.as_mut() {
            stage(codec, column, base, place);
        }
    }

    Ok(StructDecl {
        name: table.name.clone(),
        fields,
        codec,
    })
}

/// A group is usable only when its indices are exactly `1..=n` and every
/// member agrees on base type and platform inclusion. Returns `n`.
fn check_group(
    table: &RawTable,
    column: &str,
    key: &str,
    members: &[GroupMember<'_>],
    platform: Platform,
) -> Result<usize, GenerateError> {
    let fail = |reason: String| GenerateError::UnresolvedArrayGroup {
        table: table.name.clone(),
        column: column.to_string(),
        key: key.to_string(),
        reason,
    };

    if members.is_empty() {
        return Err(fail("no sibling columns recorded".to_string()));
    }

    let indices: BTreeSet<usize> = members.iter().map(|m| m.index).collect();
    if indices.len() != members.len() {
        return Err(fail("an index is declared more than once".to_string()));
    }
    let n = members.len();
    if indices.iter().copied().ne(1..=n) {
        let found: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
        return Err(fail(format!(
            "indices must run 1..={}, found {}",
            n,
            found.join(", ")
        )));
    }

    let first = members[0].token;
    for m in &members[1..] {
        if m.token.base_type() != first.base_type() {
            return Err(fail(format!("column '{}' has a different type", m.column)));
        }
        if m.token.includes(platform) != first.includes(platform) {
            return Err(fail(format!(
                "column '{}' differs in {} inclusion",
                m.column, platform
            )));
        }
    }

    Ok(n)
}

fn stage(codec: &mut Codec, column: &str, base: &BaseType, place: Place) {
    let shadow = format!("temp_{}", column);

    codec.shadows.push(Shadow {
        name: shadow.clone(),
        key: column.to_string(),
        ty: base.shadow_type_name(),
    });

    let (encode, decode) = if base.is_enum() {
        (
            Stmt::EnumToName {
                shadow: shadow.clone(),
                place: place.clone(),
            },
            Stmt::EnumFromName {
                place,
                shadow,
                enum_type: base.type_name(Platform::Server),
            },
        )
    } else if base.is_composite() {
        (
            Stmt::CompositeToText {
                shadow: shadow.clone(),
                place: place.clone(),
            },
            Stmt::CompositeFromText { place, shadow },
        )
    } else {
        (
            Stmt::Load {
                shadow: shadow.clone(),
                place: place.clone(),
            },
            Stmt::Store { place, shadow },
        )
    };

    codec.encode.push(encode);
    codec.decode.push(decode);
}
