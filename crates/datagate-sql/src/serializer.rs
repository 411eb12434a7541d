#[macro_use]
mod fmt;
use fmt::ToSql;

mod delim;
use delim::{Comma, Delimited};

mod flavor;
use flavor::Flavor;

mod ident;
use ident::Ident;

mod params;
pub use params::{Params, Placeholder};

// Fragment serializers
mod column;
mod create_table;
mod filter;
mod statement;
mod ty;
mod value;

use datagate_core::{
    driver::operation::Transaction,
    schema::db::Table,
    stmt::Statement,
};

/// Serialize a statement to a SQL string
#[derive(Debug, Clone, Copy)]
pub struct Serializer {
    /// The database flavor handles the differences between SQL dialects and
    /// supported features.
    flavor: Flavor,
}

struct Formatter<'a, T> {
    /// Handle to the serializer
    serializer: &'a Serializer,

    /// Where to write the serialized SQL
    dst: &'a mut String,

    /// Where to store parameters
    params: &'a mut T,
}

impl Serializer {
    pub fn serialize(&self, stmt: &Statement, params: &mut impl Params) -> String {
        let mut ret = String::new();

        let mut fmt = Formatter {
            serializer: self,
            dst: &mut ret,
            params,
        };

        stmt.to_sql(&mut fmt);

        ret.push(';');
        ret
    }

    /// Serialize a transaction control operation. Savepoints are named
    /// `sp_{id}`.
    pub fn serialize_transaction(&self, op: &Transaction) -> String {
        match op {
            Transaction::Start => match self.flavor {
                Flavor::Postgresql => "BEGIN ISOLATION LEVEL REPEATABLE READ".to_string(),
                Flavor::Sqlite => "BEGIN".to_string(),
            },
            Transaction::Commit => "COMMIT".to_string(),
            Transaction::Rollback => "ROLLBACK".to_string(),
            Transaction::Savepoint(id) => format!("SAVEPOINT sp_{id}"),
            Transaction::ReleaseSavepoint(id) => format!("RELEASE SAVEPOINT sp_{id}"),
            Transaction::RollbackToSavepoint(id) => format!("ROLLBACK TO SAVEPOINT sp_{id}"),
        }
    }

    /// `CREATE TABLE` for a storage table, constraints included.
    pub fn serialize_create_table(&self, table: &Table) -> String {
        let mut ret = String::new();
        let mut params = Vec::new();

        let mut fmt = Formatter {
            serializer: self,
            dst: &mut ret,
            params: &mut params,
        };

        table.to_sql(&mut fmt);

        ret.push(';');
        ret
    }

    pub fn serialize_drop_table(&self, name: &str) -> String {
        let mut ret = String::new();
        let mut params = Vec::new();

        let mut fmt = Formatter {
            serializer: self,
            dst: &mut ret,
            params: &mut params,
        };

        fmt!(&mut fmt, "DROP TABLE IF EXISTS " Ident(name) ";");
        ret
    }

    fn is_sqlite(&self) -> bool {
        matches!(self.flavor, Flavor::Sqlite)
    }
}
