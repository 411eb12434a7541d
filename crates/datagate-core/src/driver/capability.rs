#[derive(Debug)]
pub struct Capability {
    /// When true, the backend executes SQL serialized from the statement AST.
    pub sql: bool,

    /// Format of generated and accepted `_id` values.
    pub id_format: IdFormat,

    /// The backend supports nested savepoints inside a transaction.
    pub savepoints: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// Canonical hyphenated UUIDs.
    Uuid,

    /// Any non-empty string.
    Any,
}

impl Capability {
    /// In-memory backend capabilities.
    pub const MEMORY: Self = Self {
        sql: false,
        id_format: IdFormat::Uuid,
        savepoints: true,
    };

    /// SQLite capabilities.
    pub const SQLITE: Self = Self {
        sql: true,
        ..Self::MEMORY
    };

    /// PostgreSQL capabilities
    pub const POSTGRESQL: Self = Self::SQLITE;
}

impl IdFormat {
    /// Checks a client supplied id.
    pub fn is_valid(self, id: &str) -> bool {
        match self {
            IdFormat::Uuid => uuid::Uuid::try_parse(id)
                .is_ok_and(|parsed| parsed.hyphenated().to_string() == id.to_ascii_lowercase()),
            IdFormat::Any => !id.is_empty(),
        }
    }

    /// Generates a fresh id.
    pub fn generate(self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
