use super::{Filter, Statement};

/// Removes rows of a table matching a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,

    /// When `None`, every row is deleted.
    pub filter: Option<Filter>,
}

impl From<Delete> for Statement {
    fn from(value: Delete) -> Self {
        Statement::Delete(value)
    }
}
