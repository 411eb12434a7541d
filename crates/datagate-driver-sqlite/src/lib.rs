mod value;
pub(crate) use value::Value;

use datagate_core::{
    async_trait,
    driver::{operation::Operation, Capability, Driver, Response},
    schema::db::Schema,
    stmt::{self, SelectColumn, Statement, Type, ValueStream},
    Error, Integrity, Result,
};
use datagate_sql::Serializer;
use rusqlite::{ffi, Connection as RusqliteConnection};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub enum Sqlite {
    File(PathBuf),

    /// All connections share one in-memory database.
    InMemory(Arc<Mutex<RusqliteConnection>>),
}

impl Sqlite {
    /// Create a new SQLite driver with an arbitrary connection URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str)
            .map_err(|err| datagate_core::err!("invalid connection URL {url_str:?}: {err}"))?;

        if url.scheme() != "sqlite" {
            datagate_core::bail!("connection URL does not have a `sqlite` scheme; url={url_str}");
        }

        if url.path() == ":memory:" {
            Self::in_memory()
        } else {
            Ok(Self::File(PathBuf::from(url.path())))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Result<Self> {
        let connection = RusqliteConnection::open_in_memory().map_err(driver_error)?;
        configure(&connection)?;
        Ok(Self::InMemory(Arc::new(Mutex::new(connection))))
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    fn handle(&self) -> Result<Arc<Mutex<RusqliteConnection>>> {
        match self {
            Sqlite::InMemory(connection) => Ok(connection.clone()),
            Sqlite::File(path) => {
                let connection = RusqliteConnection::open(path).map_err(driver_error)?;
                configure(&connection)?;
                Ok(Arc::new(Mutex::new(connection)))
            }
        }
    }
}

/// Foreign keys are off by default in SQLite.
fn configure(connection: &RusqliteConnection) -> Result<()> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(driver_error)
}

#[async_trait]
impl Driver for Sqlite {
    fn capability(&self) -> &'static Capability {
        &Capability::SQLITE
    }

    async fn connect(&self) -> Result<Box<dyn datagate_core::Connection>> {
        Ok(Box::new(Connection {
            connection: self.handle()?,
        }))
    }

    async fn reset_db(&self, schema: &Schema) -> Result<()> {
        let handle = self.handle()?;
        let connection = handle.lock().await;
        let serializer = Serializer::sqlite();

        // Tables are created in declaration order, which may put a
        // referencing table first.
        connection
            .execute_batch("PRAGMA foreign_keys = OFF;")
            .map_err(driver_error)?;
        for table in schema.tables.iter().rev() {
            connection
                .execute_batch(&serializer.serialize_drop_table(&table.name))
                .map_err(driver_error)?;
        }
        for table in &schema.tables {
            connection
                .execute_batch(&serializer.serialize_create_table(table))
                .map_err(driver_error)?;
        }
        configure(&connection)?;

        debug!(tables = schema.tables.len(), "sqlite database reset");
        Ok(())
    }
}

#[derive(Debug)]
pub struct Connection {
    connection: Arc<Mutex<RusqliteConnection>>,
}

#[async_trait]
impl datagate_core::Connection for Connection {
    async fn exec(&mut self, _schema: &Schema, op: Operation) -> Result<Response> {
        let connection = self.connection.lock().await;
        let serializer = Serializer::sqlite();

        let (table, statement, ret_tys): (String, Statement, _) = match op {
            Operation::Transaction(op) => {
                connection
                    .execute(&serializer.serialize_transaction(&op), [])
                    .map_err(driver_error)?;
                return Ok(Response::count(0));
            }
            Operation::Query(select) => {
                let tys: Vec<Option<Type>> = select.columns.iter().map(column_type).collect();
                (select.source.table.clone(), select.into(), Some(tys))
            }
            Operation::Insert(insert) => (insert.table.clone(), insert.into(), None),
            Operation::Update(update) => (update.table.clone(), update.into(), None),
            Operation::Delete(delete) => (delete.table.clone(), delete.into(), None),
        };

        let mut params: Vec<stmt::Value> = vec![];
        let sql_str = serializer.serialize(&statement, &mut params);
        run(&connection, &sql_str, params, ret_tys.as_deref())
            .map_err(|err| violation(err, &table))
    }
}

fn run(
    connection: &RusqliteConnection,
    sql_str: &str,
    params: Vec<stmt::Value>,
    ret_tys: Option<&[Option<Type>]>,
) -> rusqlite::Result<Response> {
    let mut stmt = connection.prepare_cached(sql_str)?;
    let params = params.into_iter().map(Value::from).collect::<Vec<_>>();

    let Some(ret_tys) = ret_tys else {
        let count = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
        debug!(sql = sql_str, count, "statement executed");
        return Ok(Response::count(count as u64));
    };

    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut ret = vec![];
    while let Some(row) = rows.next()? {
        let items = ret_tys
            .iter()
            .enumerate()
            .map(|(index, ty)| Value::from_sql(row, index, *ty).map(Value::into_inner))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ret.push(stmt::Value::List(items));
    }

    debug!(sql = sql_str, rows = ret.len(), "query executed");
    Ok(Response::value_stream(ValueStream::from_vec(ret)))
}

/// The type a selected column is decoded into; constants keep whatever
/// SQLite returns.
fn column_type(column: &SelectColumn) -> Option<Type> {
    match column {
        SelectColumn::Column(_, ty) => Some(*ty),
        SelectColumn::Count => Some(Type::Integer),
        SelectColumn::Const(_) => None,
    }
}

/// Reports constraint failures as integrity violations of `table`.
fn violation(err: rusqlite::Error, table: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return Error::integrity(Integrity::ForeignKey {
                    table: table.to_string(),
                });
            }
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                let columns = message.as_deref().map(unique_columns).unwrap_or_default();
                return Error::integrity(Integrity::Unique {
                    table: table.to_string(),
                    columns,
                });
            }
            _ => {}
        }
    }
    driver_error(err)
}

/// Columns named by `UNIQUE constraint failed: City.name, City.code`.
///
/// Table names never contain dots, column names may: `City.country._id`.
fn unique_columns(message: &str) -> Vec<String> {
    let Some(columns) = message.split_once(": ").map(|(_, columns)| columns) else {
        return vec![];
    };
    columns
        .split(", ")
        .filter_map(|column| column.split_once('.'))
        .map(|(_, column)| column.to_string())
        .collect()
}

fn driver_error(err: rusqlite::Error) -> Error {
    Error::from(anyhow::Error::from(err))
}
