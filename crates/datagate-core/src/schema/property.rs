use super::{DataType, ModelId};
use crate::stmt::Value;

/// A field of a model.
#[derive(Debug)]
pub struct Property {
    pub id: PropId,

    pub name: String,

    /// Dotted path from the model root, e.g. `address.city`
    pub place: String,

    /// Enclosing object, array or ref property
    pub parent: Option<PropId>,

    pub dtype: DataType,

    pub access: Access,

    /// Hidden properties are not selected by default
    pub hidden: bool,

    pub required: bool,

    pub unique: bool,

    pub default: Value,

    /// Storage columns, empty for properties that are not stored directly
    pub columns: Vec<String>,

    /// Enum items; empty when the property is not an enum
    pub enum_items: Vec<EnumItem>,

    pub title: String,
}

/// Identifies a property: the model and the index into [`Model::props`].
///
/// [`Model::props`]: super::Model::props
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropId {
    pub model: ModelId,
    pub index: usize,
}

/// Access level, from most to least restrictive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Access {
    Private,
    #[default]
    Protected,
    Public,
    Open,
}

/// An allowed value: `source` is shown to clients, `prepare` is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem {
    pub source: Value,
    pub prepare: Value,
}

impl Property {
    /// `_id`, `_revision` and other `_`-prefixed names are reserved.
    pub fn is_reserved(&self) -> bool {
        self.name.starts_with('_')
    }

    pub fn is_enum(&self) -> bool {
        !self.enum_items.is_empty()
    }

    /// The stored value for a client-facing enum value.
    pub fn enum_prepare(&self, source: &Value) -> Option<&Value> {
        self.enum_items
            .iter()
            .find(|item| item.source.sql_eq(source) || item.source == *source)
            .map(|item| &item.prepare)
    }

    /// The client-facing value for a stored enum value.
    pub fn enum_source(&self, prepare: &Value) -> Option<&Value> {
        self.enum_items
            .iter()
            .find(|item| item.prepare.sql_eq(prepare) || item.prepare == *prepare)
            .map(|item| &item.source)
    }

    /// The single storage column of a leaf property.
    pub fn column(&self) -> Option<&str> {
        match self.columns.as_slice() {
            [column] => Some(column),
            _ => None,
        }
    }
}

impl Access {
    pub fn parse(name: &str) -> Option<Access> {
        Some(match name {
            "private" => Access::Private,
            "protected" => Access::Protected,
            "public" => Access::Public,
            "open" => Access::Open,
            _ => return None,
        })
    }
}
