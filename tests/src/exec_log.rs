use crate::logging_driver::DriverOp;
use datagate_core::driver::{operation::Transaction, Operation};
use std::sync::{Arc, Mutex};

/// A wrapper around the operations log that provides a clean API for tests
pub struct ExecLog {
    ops: Arc<Mutex<Vec<DriverOp>>>,
}

impl ExecLog {
    pub(crate) fn new(ops: Arc<Mutex<Vec<DriverOp>>>) -> Self {
        Self { ops }
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.ops.lock().unwrap().is_empty()
    }

    /// Count operations matching the given predicate
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Operation) -> bool,
    {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| predicate(&op.operation))
            .count()
    }

    /// Inserts into `table`
    pub fn inserts(&self, table: &str) -> usize {
        self.count(|op| matches!(op, Operation::Insert(insert) if insert.table == table))
    }

    /// Updates of `table`
    pub fn updates(&self, table: &str) -> usize {
        self.count(|op| matches!(op, Operation::Update(update) if update.table == table))
    }

    /// Operations the backend failed
    pub fn failures(&self) -> usize {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| op.response.is_none())
            .count()
    }

    /// Transaction control operations, in the order they were sent
    pub fn transactions(&self) -> Vec<Transaction> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op.operation {
                Operation::Transaction(transaction) => Some(transaction),
                _ => None,
            })
            .collect()
    }

    /// Clear the log
    pub fn clear(&mut self) {
        self.ops.lock().unwrap().clear();
    }
}
