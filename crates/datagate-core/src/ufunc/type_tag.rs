use crate::{
    expr::Node,
    schema::DataType,
    stmt::Value,
};

use std::fmt;

/// Runtime type of an argument, arranged in a single-parent hierarchy rooted
/// at [`TypeTag::Any`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Any,

    // Tree nodes
    Expr,
    Bind,
    GetAttr,
    Pair,
    Negative,
    Positive,

    // Literals
    Value,
    Null,
    Bool,
    Integer,
    Number,
    String,
    Bytes,
    List,
    Object,

    /// A resolved property; refined by its data type below
    Property,
    DtInteger,
    DtNumber,
    DtString,
    DtBoolean,
    DtDate,
    DtDateTime,
    DtTime,
    DtBinary,
    DtPrimaryKey,
    DtRef,
    DtBackRef,
    DtObject,
    DtArray,
    DtFile,
    DtGeometry,
    DtDenorm,
    DtText,
    ForeignProperty,
    Lang,

    /// A built predicate
    Condition,

    /// An output column of a select list
    Selected,
}

impl TypeTag {
    pub fn parent(self) -> Option<TypeTag> {
        use TypeTag::*;

        match self {
            Any => None,
            Null | Bool | Integer | Number | String | Bytes | List | Object => Some(Value),
            DtInteger | DtNumber | DtString | DtBoolean | DtDate | DtDateTime | DtTime
            | DtBinary | DtPrimaryKey | DtRef | DtBackRef | DtObject | DtArray | DtFile
            | DtGeometry | DtDenorm | DtText => Some(Property),
            Expr | Bind | GetAttr | Pair | Negative | Positive | Value | Property
            | ForeignProperty | Lang | Condition | Selected => Some(Any),
        }
    }

    /// Distance from [`TypeTag::Any`].
    pub fn depth(self) -> usize {
        let mut depth = 0;
        let mut tag = self;
        while let Some(parent) = tag.parent() {
            depth += 1;
            tag = parent;
        }
        depth
    }

    /// True when `self` equals `other` or descends from it.
    pub fn is_a(self, other: TypeTag) -> bool {
        let mut tag = Some(self);
        while let Some(current) = tag {
            if current == other {
                return true;
            }
            tag = current.parent();
        }
        false
    }

    pub fn of_value(value: &Value) -> TypeTag {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Integer(_) => TypeTag::Integer,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::List(_) => TypeTag::List,
            Value::Object(_) => TypeTag::Object,
        }
    }

    pub fn of_node(node: &Node) -> TypeTag {
        match node {
            Node::Expr(_) => TypeTag::Expr,
            Node::Value(value) => TypeTag::of_value(value),
            Node::Bind(_) => TypeTag::Bind,
            Node::GetAttr(_) => TypeTag::GetAttr,
            Node::Pair(_) => TypeTag::Pair,
            Node::Negative(_) => TypeTag::Negative,
            Node::Positive(_) => TypeTag::Positive,
        }
    }

    pub fn of_dtype(dtype: &DataType) -> TypeTag {
        match dtype {
            DataType::Integer => TypeTag::DtInteger,
            DataType::Number => TypeTag::DtNumber,
            DataType::String => TypeTag::DtString,
            DataType::Boolean => TypeTag::DtBoolean,
            DataType::Date => TypeTag::DtDate,
            DataType::DateTime => TypeTag::DtDateTime,
            DataType::Time => TypeTag::DtTime,
            DataType::Binary => TypeTag::DtBinary,
            DataType::PrimaryKey => TypeTag::DtPrimaryKey,
            DataType::Ref(_) => TypeTag::DtRef,
            DataType::BackRef(_) => TypeTag::DtBackRef,
            DataType::Object(_) => TypeTag::DtObject,
            DataType::Array(_) => TypeTag::DtArray,
            DataType::File => TypeTag::DtFile,
            DataType::Geometry(_) => TypeTag::DtGeometry,
            DataType::Denorm(_) => TypeTag::DtDenorm,
            DataType::Text(_) => TypeTag::DtText,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy() {
        assert!(TypeTag::String.is_a(TypeTag::Value));
        assert!(TypeTag::String.is_a(TypeTag::Any));
        assert!(!TypeTag::Value.is_a(TypeTag::String));
        assert!(TypeTag::DtRef.is_a(TypeTag::Property));
        assert!(!TypeTag::Property.is_a(TypeTag::DtRef));

        assert_eq!(TypeTag::Any.depth(), 0);
        assert_eq!(TypeTag::Bind.depth(), 1);
        assert_eq!(TypeTag::Integer.depth(), 2);
    }
}
