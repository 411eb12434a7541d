use super::{ColumnRef, Value};

/// A `WHERE` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),

    /// `column <op> value`; the value is never null.
    BinaryOp {
        column: ColumnRef,
        op: BinaryOp,
        value: Value,
    },

    IsNull {
        column: ColumnRef,
        negate: bool,
    },

    InList {
        column: ColumnRef,
        values: Vec<Value>,
    },

    Like {
        column: ColumnRef,
        like: Like,
        value: String,
    },

    Const(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Like {
    Contains,
    StartsWith,
}

impl Filter {
    /// Compares a column against a value, mapping nulls to `IS [NOT] NULL`.
    pub fn compare(column: ColumnRef, op: BinaryOp, value: Value) -> Filter {
        match (op, value) {
            (BinaryOp::Eq, Value::Null) => Filter::IsNull {
                column,
                negate: false,
            },
            (BinaryOp::Ne, Value::Null) => Filter::IsNull {
                column,
                negate: true,
            },
            (_, Value::Null) => Filter::Const(false),
            (op, value) => Filter::BinaryOp { column, op, value },
        }
    }

    pub fn eq(column: ColumnRef, value: impl Into<Value>) -> Filter {
        Filter::compare(column, BinaryOp::Eq, value.into())
    }

    pub fn is_null(column: ColumnRef) -> Filter {
        Filter::IsNull {
            column,
            negate: false,
        }
    }

    pub fn is_not_null(column: ColumnRef) -> Filter {
        Filter::IsNull {
            column,
            negate: true,
        }
    }

    /// Conjunction, flattening nested `And` and dropping `true` operands.
    pub fn and(operands: impl IntoIterator<Item = Filter>) -> Filter {
        let mut flat = vec![];
        for operand in operands {
            match operand {
                Filter::And(nested) => flat.extend(nested),
                Filter::Const(true) => {}
                Filter::Const(false) => return Filter::Const(false),
                operand => flat.push(operand),
            }
        }
        match flat.len() {
            0 => Filter::Const(true),
            1 => flat.remove(0),
            _ => Filter::And(flat),
        }
    }

    /// Disjunction, flattening nested `Or` and dropping `false` operands.
    pub fn or(operands: impl IntoIterator<Item = Filter>) -> Filter {
        let mut flat = vec![];
        for operand in operands {
            match operand {
                Filter::Or(nested) => flat.extend(nested),
                Filter::Const(false) => {}
                Filter::Const(true) => return Filter::Const(true),
                operand => flat.push(operand),
            }
        }
        match flat.len() {
            0 => Filter::Const(false),
            1 => flat.remove(0),
            _ => Filter::Or(flat),
        }
    }

    pub fn not(operand: Filter) -> Filter {
        match operand {
            Filter::Const(value) => Filter::Const(!value),
            Filter::Not(inner) => *inner,
            operand => Filter::Not(Box::new(operand)),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Filter::Const(true))
    }
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}
