#[macro_use]
mod macros;

pub mod db;

mod db_test;
pub use db_test::DbTest;

mod exec_log;
pub use exec_log::ExecLog;

pub mod fixtures;

mod logging_driver;
pub use logging_driver::{DriverOp, LoggingDriver};

pub mod prelude;

pub use std_util::*;

use datagate::{Driver, Result};

/// A backend the integration tests run against.
pub trait Setup: Send + Sync + 'static {
    /// Short backend name, used in assertion messages.
    fn name(&self) -> &'static str;

    /// A driver over a new, empty database.
    fn driver(&self) -> Result<Box<dyn Driver>>;
}
