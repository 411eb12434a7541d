mod capability;
pub use capability::{Capability, IdFormat};

mod response;
pub use response::{Response, Rows};

pub mod operation;
pub use operation::Operation;

use crate::{async_trait, schema::db::Schema, Result};

use std::fmt::Debug;

/// A storage backend.
///
/// Backends know nothing about models: they see tables, columns and the
/// relational statements in [`stmt`](crate::stmt). Uniqueness and foreign key
/// constraints declared in the [`Schema`] are enforced by the backend and
/// reported as [`Error::integrity`](crate::Error::integrity).
#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    /// Describes what the backend supports.
    fn capability(&self) -> &'static Capability;

    /// Opens a connection. Connections to the same driver share storage.
    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Creates the tables of `schema`, dropping existing ones.
    async fn reset_db(&self, schema: &Schema) -> Result<()>;
}

#[async_trait]
pub trait Connection: Debug + Send + 'static {
    /// Execute a database operation
    async fn exec(&mut self, schema: &Schema, op: Operation) -> Result<Response>;
}
