use super::Value;
use std::cmp::Ordering;

impl Value {
    /// Compares two non-null values the way a SQL backend would.
    ///
    /// Integers and numbers compare numerically, strings and bytes
    /// lexicographically. Returns `None` when either side is null or the
    /// values are not comparable.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        use Value::*;

        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Integer(lhs), Integer(rhs)) => Some(lhs.cmp(rhs)),
            (Integer(_) | Number(_), Integer(_) | Number(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Bool(lhs), Bool(rhs)) => Some(lhs.cmp(rhs)),
            (String(lhs), String(rhs)) => Some(lhs.as_bytes().cmp(rhs.as_bytes())),
            (Bytes(lhs), Bytes(rhs)) => Some(lhs.cmp(rhs)),
            _ => None,
        }
    }

    /// SQL equality: null is never equal to anything.
    pub fn sql_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::List(_) | Value::Object(_), _) => self == other,
            _ => self.sql_cmp(other) == Some(Ordering::Equal),
        }
    }

    /// Total order used for sorting, with nulls placed by the caller.
    ///
    /// Values of different kinds are ordered by kind so sorting never
    /// panics on heterogeneous columns.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        self.sql_cmp(other)
            .unwrap_or_else(|| rank(self).cmp(&rank(other)))
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Integer(_) | Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Bytes(_) => 4,
        Value::List(_) => 5,
        Value::Object(_) => 6,
    }
}
