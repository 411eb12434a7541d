//! The RQL parser.
//!
//! A request is a path and a query string. [`parse`] turns both into a flat
//! list of raw [`Ast`] nodes: the first one is always `path(...)` with the
//! path segments, followed by `:op` path segments and the top-level query
//! expressions.
//!
//! ```text
//! /datasets/gov/City/:format/csv?select(name)&name="Vilnius"
//!
//! path("datasets", "gov", "City")
//! format("csv")
//! select(bind("name"))
//! eq(bind("name"), "Vilnius")
//! ```

mod lexer;
use lexer::{Lexer, Token, TokenKind};

mod parser;
pub use parser::parse_expr;

mod path;
pub use path::parse;

mod unparse;
pub use unparse::{unparse, unparse_arg, unparse_query};

use datagate_core::{Error, ErrorCode};

fn syntax_error(offset: usize, reason: impl std::fmt::Display) -> Error {
    Error::new(ErrorCode::InvalidSyntax)
        .with("offset", offset)
        .with("reason", reason)
}
