use datagate_core::stmt::{Type, Value as CoreValue};
use rusqlite::{
    types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef},
    Row,
};

#[derive(Debug)]
pub struct Value(CoreValue);

impl From<CoreValue> for Value {
    fn from(value: CoreValue) -> Self {
        Self(value)
    }
}

impl Value {
    /// Converts this SQLite driver value into the core value.
    pub fn into_inner(self) -> CoreValue {
        self.0
    }

    /// Converts a SQLite value within a row to a core value. Lists and
    /// objects are stored as JSON text.
    pub fn from_sql(row: &Row<'_>, index: usize, ty: Option<Type>) -> rusqlite::Result<Self> {
        let value: SqlValue = row.get(index)?;

        let core_value = match (value, ty) {
            (SqlValue::Null, _) => CoreValue::Null,
            (SqlValue::Integer(value), Some(Type::Bool)) => CoreValue::Bool(value != 0),
            (SqlValue::Integer(value), Some(Type::Number)) => CoreValue::Number(value as f64),
            (SqlValue::Integer(value), _) => CoreValue::Integer(value),
            (SqlValue::Real(value), Some(Type::Integer)) if value.fract() == 0.0 => {
                CoreValue::Integer(value as i64)
            }
            (SqlValue::Real(value), _) => CoreValue::Number(value),
            (SqlValue::Text(text), Some(Type::Json)) => match serde_json::from_str(&text) {
                Ok(json) => CoreValue::from_json(json),
                Err(_) => CoreValue::String(text),
            },
            (SqlValue::Text(text), _) => CoreValue::String(text),
            (SqlValue::Blob(bytes), _) => CoreValue::Bytes(bytes),
        };

        Ok(Value(core_value))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match &self.0 {
            CoreValue::Null => ToSqlOutput::Owned(SqlValue::Null),
            CoreValue::Bool(v) => ToSqlOutput::Owned(SqlValue::Integer(*v as i64)),
            CoreValue::Integer(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            CoreValue::Number(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            CoreValue::String(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            CoreValue::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(&v[..])),
            value @ (CoreValue::List(_) | CoreValue::Object(_)) => {
                ToSqlOutput::Owned(SqlValue::Text(value.to_json().to_string()))
            }
        })
    }
}
