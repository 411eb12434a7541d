use datagate::{Driver, Result};
use datagate_driver_sqlite::Sqlite;

use crate::Setup;

pub struct SetupSqlite;

impl Setup for SetupSqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn driver(&self) -> Result<Box<dyn Driver>> {
        Ok(Box::new(Sqlite::new("sqlite::memory:")?))
    }
}
