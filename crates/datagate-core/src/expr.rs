//! The RQL expression tree.
//!
//! The parser produces a raw [`Ast`] of `{name, args}` nodes. [`Node::from_ast`]
//! lowers it into the algebraic tree walked by an [`Env`](crate::ufunc::Env):
//! binds, dotted attribute chains, sort markers and keyword pairs become
//! dedicated leaf variants, everything else stays an [`Expr`] call.

mod ast;
pub use ast::{Arg, Ast};

mod node;
pub use node::{Bind, Expr, GetAttr, Node, Pair};
