use super::{Action, Format, Method};
use datagate_core::{
    expr::Node,
    schema::{ModelId, PropId},
};

/// A request bound to the manifest.
#[derive(Debug, Clone)]
pub struct UrlParams {
    pub method: Method,

    /// Path segments naming the namespace or model, joined with `/`
    pub path: String,

    /// Set when the path addresses a namespace instead of a model
    pub ns: Option<String>,

    pub model: Option<ModelId>,

    /// Primary key segment
    pub pk: Option<String>,

    /// Property segment
    pub prop: Option<PropId>,

    /// The property segment had a `:ref` suffix: the ref itself is
    /// addressed, not the referenced row.
    pub propref: bool,

    pub action: Action,

    /// Arguments of `select(...)`; `None` selects the default columns
    pub select: Option<Vec<Node>>,

    pub sort: Vec<Node>,

    pub limit: Option<u64>,

    pub offset: Option<u64>,

    pub count: bool,

    /// Top-level filter expressions, ANDed
    pub query: Vec<Node>,

    pub page: PageParams,

    pub format: Format,

    /// Preferred languages, most preferred first
    pub lang: Vec<String>,

    pub bbox: Option<[f64; 4]>,

    /// Arguments of `expand(...)`; an empty list expands every ref
    pub expand: Option<Vec<Node>>,

    /// Offset of `:changes`
    pub changes: Option<i64>,

    pub fault_tolerant: bool,

    /// `:all` lists namespaces recursively
    pub all: bool,
}

/// Arguments of `page(...)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    /// Encoded key of the last row of the previous page
    pub cursor: Option<String>,

    pub size: Option<u64>,

    pub disabled: bool,
}

impl UrlParams {
    /// True when any parameter narrows or reshapes a listing.
    pub fn is_search(&self) -> bool {
        self.select.is_some()
            || !self.sort.is_empty()
            || self.limit.is_some()
            || self.offset.is_some()
            || !self.query.is_empty()
            || self.count
    }
}
