//! Common imports for test files
//!
//! This module provides a convenient way to import frequently used items
//! in test files with `use tests::prelude::*;`

// Re-export core test infrastructure
pub use crate::{DbTest, ExecLog};

// Re-export fixtures
pub use crate::fixtures::*;

// Re-export macros
pub use crate::tests;

pub use datagate::{Config, Gateway, Request, Response};
pub use serde_json::json;
