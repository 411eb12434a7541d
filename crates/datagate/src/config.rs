use serde::Deserialize;

/// Gateway settings.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// let config: datagate::Config = serde_json::from_str(r#"{"page_size": 50}"#).unwrap();
/// assert_eq!(config.page_size, 50);
/// assert_eq!(config.max_error_count, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default keyset page size
    pub page_size: u64,

    /// Errors collected by a fault-tolerant write stream before it aborts
    pub max_error_count: usize,

    /// When set, explicitly selecting a property the client may not read is
    /// an error instead of silently omitting it.
    pub strict_access: bool,

    /// Prefix of scope names, e.g. `datagate_getall`
    pub scope_prefix: String,

    /// Output format used when neither `format()` nor `Accept` picks one
    pub default_format: String,

    /// Bytes of the `Accept-Language` header that are parsed
    pub accept_language_limit: usize,

    /// Maximum number of write items handled as one group
    pub group_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: 1000,
            max_error_count: 100,
            strict_access: false,
            scope_prefix: "datagate".to_string(),
            default_format: "json".to_string(),
            accept_language_limit: 500,
            group_size: 100,
        }
    }
}
