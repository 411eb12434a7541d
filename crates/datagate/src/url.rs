//! Binding a request to the manifest.
//!
//! A [`Request`] is parsed by the [`spyna`](crate::spyna) parser and bound
//! into [`UrlParams`]: the addressed namespace or model, the primary key and
//! property, the derived [`Action`], and the query parameters.

mod action;
pub use action::Action;

mod binder;
pub(crate) use binder::bind;

mod format;
pub use format::Format;

mod lang;

mod params;
pub use params::{PageParams, UrlParams};

mod request;
pub use request::{Method, Request};
