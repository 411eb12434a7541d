mod transaction;
pub use transaction::Transaction;

use crate::stmt::{Delete, Insert, Select, Statement, Update};

#[derive(Debug, Clone)]
pub enum Operation {
    /// Read rows; each returned row is a list with one value per selected
    /// column.
    Query(Select),

    /// Insert one row
    Insert(Insert),

    /// Update matching rows, returning the count
    Update(Update),

    /// Delete matching rows, returning the count
    Delete(Delete),

    /// Transaction control
    Transaction(Transaction),
}

impl Operation {
    pub fn is_transaction(&self) -> bool {
        matches!(self, Operation::Transaction(_))
    }
}

impl From<Statement> for Operation {
    fn from(value: Statement) -> Self {
        match value {
            Statement::Select(stmt) => Operation::Query(stmt),
            Statement::Insert(stmt) => Operation::Insert(stmt),
            Statement::Update(stmt) => Operation::Update(stmt),
            Statement::Delete(stmt) => Operation::Delete(stmt),
        }
    }
}

impl From<Select> for Operation {
    fn from(value: Select) -> Self {
        Operation::Query(value)
    }
}

impl From<Insert> for Operation {
    fn from(value: Insert) -> Self {
        Operation::Insert(value)
    }
}

impl From<Update> for Operation {
    fn from(value: Update) -> Self {
        Operation::Update(value)
    }
}

impl From<Delete> for Operation {
    fn from(value: Delete) -> Self {
        Operation::Delete(value)
    }
}
