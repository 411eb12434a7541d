//! Multiple dispatch over the expression tree.
//!
//! A [`Registry`] maps a function name to overloads keyed by the runtime
//! [`TypeTag`]s of the positional arguments. An [`Env`] walks an expression,
//! evaluates call arguments, and dispatches to the most specific overload.

mod args;
pub use args::Args;

mod env;
pub use env::Env;

mod registry;
pub use registry::{Function, Handler, Overload, RawHandler, Registry};

mod signature;
pub use signature::Signature;

mod type_tag;
pub use type_tag::TypeTag;
