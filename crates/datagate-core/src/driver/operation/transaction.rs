use super::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    /// Start a transaction
    Start,

    /// Commit a transaction
    Commit,

    /// Rollback a transaction
    Rollback,

    /// Create a savepoint with the given id
    Savepoint(usize),

    /// Release the savepoint with the given id
    ReleaseSavepoint(usize),

    /// Undo everything done since the savepoint with the given id
    RollbackToSavepoint(usize),
}

impl From<Transaction> for Operation {
    fn from(value: Transaction) -> Operation {
        Operation::Transaction(value)
    }
}
