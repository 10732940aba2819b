use crate::cast::digest::DigestAlgorithm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One cell of a row, positionally aligned to a column name
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Structured value, either parsed from a text cell or carried in from JSON input
    Json(Value),
    /// Raw bytes (BLOB columns); these have no JSON rendering
    Binary(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Name of the runtime type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "boolean",
            Cell::Integer(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
            Cell::Json(_) => "json",
            Cell::Binary(_) => "binary",
        }
    }
}

/// The string form of a cell: used for comma expansion, control columns and the digest
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
            Cell::Json(v) => write!(f, "{}", v),
            Cell::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Integer(i),
                None => match n.as_f64() {
                    Some(x) => Cell::Float(x),
                    None => Cell::Json(Value::Number(n)),
                },
            },
            Value::String(s) => Cell::Text(s),
            other => Cell::Json(other),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Integer(i)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

/// Operation requested for a document via the `_optype` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Index,
    Create,
    Delete,
    Update,
}

impl OpType {
    pub fn as_str(self) -> &'static str {
        match self {
            OpType::Index => "index",
            OpType::Create => "create",
            OpType::Delete => "delete",
            OpType::Update => "update",
        }
    }
}

/// Metadata carried alongside a document, routed from control columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaKey {
    Version,
    Routing,
    Parent,
    Timestamp,
    Ttl,
    Job,
    Percolate,
}

impl MetaKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MetaKey::Version => "_version",
            MetaKey::Routing => "_routing",
            MetaKey::Parent => "_parent",
            MetaKey::Timestamp => "_timestamp",
            MetaKey::Ttl => "_ttl",
            MetaKey::Job => "_job",
            MetaKey::Percolate => "_percolate",
        }
    }
}

/// The closed set of reserved column names. Case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    OpType,
    Index,
    Type,
    Id,
    Source,
    Meta(MetaKey),
}

impl ControlKey {
    pub fn parse(column: &str) -> Option<Self> {
        let key = match column {
            "_optype" => ControlKey::OpType,
            "_index" => ControlKey::Index,
            "_type" => ControlKey::Type,
            "_id" => ControlKey::Id,
            "_source" => ControlKey::Source,
            "_version" => ControlKey::Meta(MetaKey::Version),
            "_routing" => ControlKey::Meta(MetaKey::Routing),
            "_parent" => ControlKey::Meta(MetaKey::Parent),
            "_timestamp" => ControlKey::Meta(MetaKey::Timestamp),
            "_ttl" => ControlKey::Meta(MetaKey::Ttl),
            "_job" => ControlKey::Meta(MetaKey::Job),
            "_percolate" => ControlKey::Meta(MetaKey::Percolate),
            _ => return None,
        };
        Some(key)
    }

    pub fn is_control(column: &str) -> bool {
        Self::parse(column).is_some()
    }
}

/// Configuration for the casting process
#[derive(Debug, Clone)]
pub struct CastConfig {
    /// Skip null cells instead of recording them as null fields
    pub ignore_null: bool,

    /// Try to parse text cells as JSON objects before merging
    pub detect_json: bool,

    /// Running digest over emitted content, if any
    pub digest: Option<DigestAlgorithm>,

    /// Version marker of the current run; stamped on documents without `_version`
    pub version: Option<i64>,
}

impl Default for CastConfig {
    fn default() -> Self {
        CastConfig {
            ignore_null: false,
            detect_json: true,
            digest: None,
            version: None,
        }
    }
}
