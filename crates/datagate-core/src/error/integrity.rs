/// Integrity violations reported by backends.
///
/// Backends do not know which domain error a violation stands for (a foreign
/// key violation means different things on insert and on delete), so they
/// report the raw violation and the write stream maps it.
#[derive(Debug, Clone, PartialEq)]
pub enum Integrity {
    /// A foreign key constraint failed.
    ForeignKey { table: String },

    /// A unique constraint failed on the given columns.
    Unique { table: String, columns: Vec<String> },
}

impl std::error::Error for Integrity {}

impl core::fmt::Display for Integrity {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Integrity::ForeignKey { table } => {
                write!(f, "foreign key constraint failed on {table}")
            }
            Integrity::Unique { table, columns } => {
                write!(
                    f,
                    "unique constraint failed on {table}({})",
                    columns.join(", ")
                )
            }
        }
    }
}
