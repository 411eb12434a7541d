use std::fmt;

/// A column of an aliased table in a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Alias of the table in the `FROM` / `JOIN` list
    pub alias: String,

    /// Column name
    pub column: String,

    /// Key inside a JSON column, e.g. the language tag of a text column
    pub key: Option<String>,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> ColumnRef {
        ColumnRef {
            alias: alias.into(),
            column: column.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> ColumnRef {
        self.key = Some(key.into());
        self
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.column)?;
        if let Some(key) = &self.key {
            write!(f, "[{key}]")?;
        }
        Ok(())
    }
}
