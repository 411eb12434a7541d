use super::{ModelId, PropId};
use crate::stmt;

use indexmap::IndexMap;

/// The shape and storage of a property value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Integer,
    Number,
    String,
    Boolean,
    Date,
    DateTime,
    Time,
    Binary,
    PrimaryKey,
    Ref(Ref),
    BackRef(BackRef),
    Object(Object),
    Array(Array),
    File,
    Geometry(Geometry),
    Denorm(Denorm),
    Text(Text),
}

/// Reference to a row of another model, stored as the values of `refprops`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ref {
    pub model: ModelId,
    pub refprops: Vec<PropId>,
}

/// The inverse side of a [`Ref`]: rows of `model` whose `refprop` points here.
#[derive(Debug, Clone, PartialEq)]
pub struct BackRef {
    pub model: ModelId,
    pub refprop: PropId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub props: IndexMap<String, PropId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub items: PropId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub srid: Option<u32>,
}

/// A property of a referenced model, read through the parent ref.
#[derive(Debug, Clone, PartialEq)]
pub struct Denorm {
    pub target: PropId,
}

/// Translated text keyed by language tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub langs: Vec<String>,
}

impl DataType {
    /// Type name as written in a manifest.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::Time => "time",
            DataType::Binary => "binary",
            DataType::PrimaryKey => "pk",
            DataType::Ref(_) => "ref",
            DataType::BackRef(_) => "backref",
            DataType::Object(_) => "object",
            DataType::Array(_) => "array",
            DataType::File => "file",
            DataType::Geometry(_) => "geometry",
            DataType::Denorm(_) => "denorm",
            DataType::Text(_) => "text",
        }
    }

    /// Column storage type for single-column types.
    pub fn storage(&self) -> Option<stmt::Type> {
        Some(match self {
            DataType::Integer => stmt::Type::Integer,
            DataType::Number => stmt::Type::Number,
            DataType::Boolean => stmt::Type::Bool,
            DataType::Binary => stmt::Type::Bytes,
            DataType::String
            | DataType::Date
            | DataType::DateTime
            | DataType::Time
            | DataType::PrimaryKey
            | DataType::Geometry(_) => stmt::Type::String,
            DataType::Array(_) | DataType::Text(_) => stmt::Type::Json,
            DataType::Ref(_)
            | DataType::BackRef(_)
            | DataType::Object(_)
            | DataType::File
            | DataType::Denorm(_) => return None,
        })
    }

    /// True for types that map to exactly one scalar value.
    pub fn is_leaf(&self) -> bool {
        !matches!(
            self,
            DataType::Object(_)
                | DataType::Array(_)
                | DataType::BackRef(_)
                | DataType::File
                | DataType::Text(_)
        )
    }

    pub fn as_ref(&self) -> Option<&Ref> {
        match self {
            DataType::Ref(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            DataType::Object(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            DataType::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, DataType::Ref(_))
    }
}
