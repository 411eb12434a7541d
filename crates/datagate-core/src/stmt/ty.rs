/// Storage type of a column, and the type a backend decodes a selected
/// column into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Integer,
    Number,
    String,
    Bytes,

    /// A list or object stored as a JSON document
    Json,
}

impl Type {
    pub fn is_json(self) -> bool {
        matches!(self, Type::Json)
    }
}
