//! Type-declaration cell parser.
//!
//! A type cell reads `base[_index][?]_letters`, where `letters` is any mix of
//! `s` (server) and `c` (client). `?` may appear anywhere and marks the column
//! nullable. Array membership is read from the column name, not the cell.

use std::fmt;

use crate::table::is_comment;

/// Base-type prefix marking a reference to an enum table.
pub const ENUM_PREFIX: &str = "Enum_";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed type token {token:?} for column '{column}': {reason}")]
    Malformed {
        column: String,
        token: String,
        reason: &'static str,
    },
    #[error("Unknown base type {base:?} for column '{column}'")]
    UnknownBaseType { column: String, base: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Server,
    Client,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Server, Platform::Client];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "server" | "s" => Some(Self::Server),
            "client" | "c" => Some(Self::Client),
            _ => None,
        }
    }

    /// Inclusion letter in the type cell suffix.
    pub fn letter(self) -> char {
        match self {
            Self::Server => 's',
            Self::Client => 'c',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseType {
    Int32,
    Int64,
    Float,
    Double,
    Vector,
    Rotator,
    String,
    /// Reference to the enum table of this name.
    Enum(String),
}

impl BaseType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "vector" => Some(Self::Vector),
            "rotator" => Some(Self::Rotator),
            "string" => Some(Self::String),
            _ => match s.strip_prefix(ENUM_PREFIX) {
                Some(name) if !name.is_empty() => Some(Self::Enum(name.to_string())),
                _ => None,
            },
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Self::Enum(_))
    }

    /// Vector and rotator travel as their canonical `(K=v,...)` text.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Vector | Self::Rotator)
    }

    /// Native type name on the given platform.
    pub fn type_name(&self, platform: Platform) -> String {
        match (self, platform) {
            (Self::Int32, _) => "int32".to_string(),
            (Self::Int64, _) => "int64".to_string(),
            (Self::Float, _) => "float".to_string(),
            (Self::Double, _) => "double".to_string(),
            (Self::Vector, _) => "FVector".to_string(),
            (Self::Rotator, _) => "FRotator".to_string(),
            (Self::String, Platform::Server) => "std::string".to_string(),
            (Self::String, Platform::Client) => "FString".to_string(),
            (Self::Enum(name), _) => format!("{}{}", ENUM_PREFIX, name),
        }
    }

    /// Type of the primitive shadow used while (de)serializing on the server.
    pub fn shadow_type_name(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            _ => "std::string",
        }
    }

    /// Literal substituted for an empty nullable cell.
    pub fn null_default(&self) -> &'static str {
        match self {
            Self::Int32 | Self::Int64 => "0",
            Self::Float | Self::Double => "0.0",
            Self::Vector => "(X=0,Y=0,Z=0)",
            Self::Rotator => "(P=0,Y=0,R=0)",
            Self::String | Self::Enum(_) => "",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32 => f.write_str("int32"),
            Self::Int64 => f.write_str("int64"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Vector => f.write_str("vector"),
            Self::Rotator => f.write_str("rotator"),
            Self::String => f.write_str("string"),
            Self::Enum(name) => write!(f, "{}{}", ENUM_PREFIX, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenBase {
    Typed(BaseType),
    /// Comment or meta column; the cell is kept verbatim.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeToken {
    pub base: TokenBase,
    pub nullable: bool,
    pub include_server: bool,
    pub include_client: bool,
}

impl TypeToken {
    pub fn parse(column: &str, cell: &str) -> Result<Self, TokenError> {
        if is_comment(column) || is_comment(cell) {
            return Ok(Self {
                base: TokenBase::Comment(cell.to_string()),
                nullable: false,
                include_server: false,
                include_client: false,
            });
        }

        let malformed = |reason| TokenError::Malformed {
            column: column.to_string(),
            token: cell.to_string(),
            reason,
        };

        let nullable = cell.contains('?');
        let stripped: String = cell.chars().filter(|&c| c != '?').collect();

        let (body, letters) = stripped
            .rsplit_once('_')
            .ok_or_else(|| malformed("missing platform inclusion suffix"))?;

        if !letters.chars().all(|c| c == 's' || c == 'c') {
            return Err(malformed("inclusion suffix may only contain 's' and 'c'"));
        }
        if body.is_empty() {
            return Err(malformed("missing base type"));
        }

        // Index first: `Enum_` accepts any tail, so `Enum_Grade_1` must not
        // become a reference to a table called `Grade_1`.
        let base = strip_index(body)
            .and_then(BaseType::parse)
            .or_else(|| BaseType::parse(body))
            .ok_or_else(|| TokenError::UnknownBaseType {
                column: column.to_string(),
                base: body.to_string(),
            })?;

        Ok(Self {
            base: TokenBase::Typed(base),
            nullable,
            include_server: letters.contains(Platform::Server.letter()),
            include_client: letters.contains(Platform::Client.letter()),
        })
    }

    pub fn includes(&self, platform: Platform) -> bool {
        match platform {
            Platform::Server => self.include_server,
            Platform::Client => self.include_client,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.base, TokenBase::Comment(_))
    }

    pub fn base_type(&self) -> Option<&BaseType> {
        match &self.base {
            TokenBase::Typed(b) => Some(b),
            TokenBase::Comment(_) => None,
        }
    }
}

/// `int32_2` -> `int32`. The index in a type cell is informational only.
fn strip_index(body: &str) -> Option<&str> {
    let (head, tail) = body.rsplit_once('_')?;
    if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
        Some(head)
    } else {
        None
    }
}

/// Array-group membership derived from a column named `<key>_<index>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayIndex {
    pub key: String,
    /// 1-based, as written in the sheet.
    pub index: usize,
}

impl ArrayIndex {
    pub fn from_column(name: &str) -> Option<Self> {
        let (key, digits) = name.rsplit_once('_')?;
        if key.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let index: usize = digits.parse().ok()?;
        if index == 0 {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            index,
        })
    }

    /// Name of the generated array field.
    pub fn field_name(&self) -> String {
        format!("{}s", self.key)
    }

    /// 0-based position in the generated array.
    pub fn slot(&self) -> usize {
        self.index - 1
    }
}
