//! A manifest-driven data access gateway.
//!
//! A [`Manifest`] declares namespaces, models and typed properties. The
//! [`Gateway`] answers [`Request`]s against it: query strings are parsed by
//! the [`spyna`] parser, bound to the manifest, compiled into relational
//! statements and run on a storage [`Driver`]. Writes go through a staged
//! stream that checks, diffs and journals every item inside one transaction.
//!
//! ```no_run
//! # async fn example(manifest: datagate::Manifest) -> datagate::Result<()> {
//! use datagate::{Gateway, Memory, Request};
//!
//! let gateway = Gateway::builder().manifest(manifest).build(Memory::new()).await?;
//! gateway.reset_db().await?;
//!
//! let response = gateway
//!     .handle(Request::get("/datasets/gov/City?select(name)&sort(name)").scope("datagate_getall"))
//!     .await;
//! println!("{}", response.render()?);
//! # Ok(())
//! # }
//! ```

mod access;

mod config;
pub use config::Config;

mod context;

mod gateway;
pub use gateway::{Builder, Gateway, Response};

pub mod memory;
pub use memory::Memory;

mod page;

mod query;

mod redirect;

mod result;

pub mod spyna;

mod transaction;

mod url;
pub use url::{Action, Format, Method, PageParams, Request, UrlParams};

mod write;

pub use datagate_core::{
    schema::{Manifest, ModelDef, PropDef},
    stmt::Value,
    Driver, Error, ErrorCode, Result,
};
