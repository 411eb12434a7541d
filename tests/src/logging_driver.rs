use datagate_core::{
    async_trait,
    driver::{Capability, Connection, Operation, Response},
    schema::db::Schema,
    Driver, Result,
};
use std::sync::{Arc, Mutex};

/// A driver wrapper that logs every operation sent to the backend.
#[derive(Debug)]
pub struct LoggingDriver {
    inner: Box<dyn Driver>,

    /// Shared with every connection opened through this driver
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

impl LoggingDriver {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            inner: driver,
            ops_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get a handle to access the operations log
    pub fn ops_log_handle(&self) -> Arc<Mutex<Vec<DriverOp>>> {
        self.ops_log.clone()
    }
}

#[async_trait]
impl Driver for LoggingDriver {
    fn capability(&self) -> &'static Capability {
        self.inner.capability()
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(LoggingConnection {
            inner: self.inner.connect().await?,
            ops_log: self.ops_log_handle(),
        }))
    }

    async fn reset_db(&self, schema: &Schema) -> Result<()> {
        self.inner.reset_db(schema).await
    }
}

/// One logged operation. `response` is `None` when the backend failed it.
#[derive(Debug)]
pub struct DriverOp {
    pub operation: Operation,
    pub response: Option<Response>,
}

#[derive(Debug)]
struct LoggingConnection {
    inner: Box<dyn Connection>,
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

#[async_trait]
impl Connection for LoggingConnection {
    async fn exec(&mut self, schema: &Schema, operation: Operation) -> Result<Response> {
        let operation_clone = operation.clone();
        let result = self.inner.exec(schema, operation).await;

        // Failed operations are logged too; tests assert on rollbacks.
        let (result, logged) = match result {
            Ok(mut response) => {
                let rows = response.rows.dup().await?;
                (Ok(response), Some(Response { rows }))
            }
            Err(err) => (Err(err), None),
        };

        self.ops_log
            .lock()
            .expect("Failed to acquire ops log lock")
            .push(DriverOp {
                operation: operation_clone,
                response: logged,
            });

        result
    }
}
