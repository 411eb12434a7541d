pub mod driver;
pub use driver::{Connection, Driver};

mod error;
pub use error::{Envelope, Error, ErrorCode, ErrorGroup, Integrity, IntoError};

pub mod expr;

pub mod schema;
pub use schema::Manifest;

pub mod stmt;

pub mod ufunc;

/// A Result type alias that uses the gateway's [`Error`] type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub use async_trait::async_trait;

#[doc(hidden)]
pub use indexmap;
