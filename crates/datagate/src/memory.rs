//! An in-memory backend.
//!
//! Tables live in a shared [`Store`]. A transaction works on a private copy
//! of the store which replaces the shared one on commit; savepoints are
//! further copies stacked on top. Dropping a connection discards its
//! uncommitted copy.

mod query;

mod store;
use store::Store;

use datagate_core::{
    async_trait,
    driver::{operation::Transaction, Capability, Driver, Operation, Response},
    schema::db::Schema,
    Result,
};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct Memory {
    store: Arc<Mutex<Store>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory::default()
    }
}

#[async_trait]
impl Driver for Memory {
    fn capability(&self) -> &'static Capability {
        &Capability::MEMORY
    }

    async fn connect(&self) -> Result<Box<dyn datagate_core::Connection>> {
        Ok(Box::new(Connection {
            shared: self.store.clone(),
            txn: None,
        }))
    }

    async fn reset_db(&self, schema: &Schema) -> Result<()> {
        *self.store.lock().await = Store::new(schema);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Connection {
    shared: Arc<Mutex<Store>>,
    txn: Option<Txn>,
}

#[derive(Debug)]
struct Txn {
    working: Store,
    savepoints: Vec<(usize, Store)>,
}

#[async_trait]
impl datagate_core::Connection for Connection {
    async fn exec(&mut self, _schema: &Schema, op: Operation) -> Result<Response> {
        let op = match op {
            Operation::Transaction(op) => {
                self.transaction(op).await?;
                return Ok(Response::count(0));
            }
            op => op,
        };

        match &mut self.txn {
            Some(txn) => txn.working.exec(op),
            None => self.shared.lock().await.exec(op),
        }
    }
}

impl Connection {
    async fn transaction(&mut self, op: Transaction) -> Result<()> {
        match op {
            Transaction::Start => {
                if self.txn.is_some() {
                    datagate_core::bail!("a transaction is already active");
                }
                self.txn = Some(Txn {
                    working: self.shared.lock().await.clone(),
                    savepoints: vec![],
                });
            }
            Transaction::Commit => {
                let txn = self.active_txn(op)?;
                *self.shared.lock().await = txn.working;
            }
            Transaction::Rollback => {
                self.active_txn(op)?;
            }
            Transaction::Savepoint(id) => {
                let txn = self.txn_mut(op)?;
                let snapshot = txn.working.clone();
                txn.savepoints.push((id, snapshot));
            }
            Transaction::ReleaseSavepoint(id) => {
                let txn = self.txn_mut(op)?;
                let position = savepoint_position(txn, id)?;
                txn.savepoints.truncate(position);
            }
            Transaction::RollbackToSavepoint(id) => {
                let txn = self.txn_mut(op)?;
                let position = savepoint_position(txn, id)?;
                // The savepoint stays active after rolling back to it.
                txn.savepoints.truncate(position + 1);
                txn.working = txn.savepoints[position].1.clone();
            }
        }
        Ok(())
    }

    fn active_txn(&mut self, op: Transaction) -> Result<Txn> {
        self.txn
            .take()
            .ok_or_else(|| datagate_core::err!("{op:?} without an active transaction"))
    }

    fn txn_mut(&mut self, op: Transaction) -> Result<&mut Txn> {
        self.txn
            .as_mut()
            .ok_or_else(|| datagate_core::err!("{op:?} without an active transaction"))
    }
}

fn savepoint_position(txn: &Txn, id: usize) -> Result<usize> {
    txn.savepoints
        .iter()
        .rposition(|(savepoint, _)| *savepoint == id)
        .ok_or_else(|| datagate_core::err!("unknown savepoint sp_{id}"))
}
