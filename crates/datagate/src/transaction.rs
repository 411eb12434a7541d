use datagate_core::{
    async_trait,
    driver::{operation, Connection, Operation, Response},
    stmt::{Select, Value},
    Manifest, Result,
};
use std::sync::Arc;

/// Runs operations on a backend, inside or outside a transaction.
#[async_trait]
pub(crate) trait Executor: Send {
    async fn exec(&mut self, op: Operation) -> Result<Response>;

    /// Runs a query and collects its rows.
    async fn query(&mut self, select: Select) -> Result<Vec<Vec<Value>>> {
        let response = self.exec(select.into()).await?;
        let rows = response.rows.into_values().collect().await?;
        Ok(rows
            .into_iter()
            .map(|row| match row {
                Value::List(values) => values,
                value => vec![value],
            })
            .collect())
    }
}

/// A connection used for reads outside a transaction.
#[derive(Debug)]
pub(crate) struct Conn {
    manifest: Arc<Manifest>,
    connection: Box<dyn Connection>,
}

impl Conn {
    pub(crate) fn new(manifest: Arc<Manifest>, connection: Box<dyn Connection>) -> Conn {
        Conn {
            manifest,
            connection,
        }
    }

    pub(crate) async fn begin(self) -> Result<Transaction> {
        Transaction::begin(self.manifest, self.connection).await
    }
}

#[async_trait]
impl Executor for Conn {
    async fn exec(&mut self, op: Operation) -> Result<Response> {
        self.connection.exec(&self.manifest.db, op).await
    }
}

/// An active database transaction.
///
/// If dropped without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback), the transaction is rolled back.
#[derive(Debug)]
pub(crate) struct Transaction {
    manifest: Arc<Manifest>,

    /// `Option` so that `Drop` can `.take()` it and move it into a task.
    connection: Option<Box<dyn Connection>>,

    /// Whether commit or rollback has been called.
    committed: bool,

    /// Monotonic counter for generating unique savepoint names.
    savepoint_counter: usize,

    /// A dropped savepoint cannot make an asynchronous request. It stores
    /// its id here and the rollback is sent before the next operation.
    pending_savepoint_rollback: Option<usize>,
}

impl Transaction {
    pub(crate) async fn begin(
        manifest: Arc<Manifest>,
        mut connection: Box<dyn Connection>,
    ) -> Result<Transaction> {
        connection
            .exec(&manifest.db, operation::Transaction::Start.into())
            .await?;

        Ok(Transaction {
            manifest,
            connection: Some(connection),
            committed: false,
            savepoint_counter: 0,
            pending_savepoint_rollback: None,
        })
    }

    pub(crate) async fn commit(mut self) -> Result<()> {
        self.run(operation::Transaction::Commit.into()).await?;
        self.committed = true;
        Ok(())
    }

    pub(crate) async fn rollback(mut self) -> Result<()> {
        self.run(operation::Transaction::Rollback.into()).await?;
        self.committed = true;
        Ok(())
    }

    pub(crate) async fn savepoint(&mut self) -> Result<Savepoint<'_>> {
        let id = self.next_savepoint_id();
        self.run(operation::Transaction::Savepoint(id).into()).await?;
        Ok(Savepoint {
            transaction: self,
            id,
            released: false,
        })
    }

    fn next_savepoint_id(&mut self) -> usize {
        let id = self.savepoint_counter;
        self.savepoint_counter += 1;
        id
    }

    async fn run(&mut self, op: Operation) -> Result<Response> {
        let Some(connection) = self.connection.as_mut() else {
            datagate_core::bail!("transaction used after commit or rollback");
        };

        if let Some(savepoint) = self.pending_savepoint_rollback.take() {
            connection
                .exec(
                    &self.manifest.db,
                    operation::Transaction::RollbackToSavepoint(savepoint).into(),
                )
                .await?;
        }
        connection.exec(&self.manifest.db, op).await
    }
}

#[async_trait]
impl Executor for Transaction {
    async fn exec(&mut self, op: Operation) -> Result<Response> {
        self.run(op).await
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        // Outside a runtime the connection is dropped as is; backends
        // discard uncommitted work of a dropped connection.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let manifest = self.manifest.clone();
            handle.spawn(async move {
                let _ = connection
                    .exec(&manifest.db, operation::Transaction::Rollback.into())
                    .await;
            });
        }
    }
}

/// A savepoint within a transaction or another savepoint.
///
/// If dropped without calling [`release`](Self::release) or
/// [`rollback`](Self::rollback), the savepoint is rolled back.
#[derive(Debug)]
pub(crate) struct Savepoint<'a> {
    transaction: &'a mut Transaction,
    id: usize,
    released: bool,
}

impl Savepoint<'_> {
    /// Changes become part of the enclosing scope.
    pub(crate) async fn release(mut self) -> Result<()> {
        self.transaction
            .run(operation::Transaction::ReleaseSavepoint(self.id).into())
            .await?;
        self.released = true;
        Ok(())
    }

    /// Undoes all work since the savepoint was created.
    pub(crate) async fn rollback(mut self) -> Result<()> {
        self.transaction
            .run(operation::Transaction::RollbackToSavepoint(self.id).into())
            .await?;
        self.released = true;
        Ok(())
    }
}

#[async_trait]
impl Executor for Savepoint<'_> {
    async fn exec(&mut self, op: Operation) -> Result<Response> {
        self.transaction.run(op).await
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.transaction.pending_savepoint_rollback = Some(self.id);
        }
    }
}
