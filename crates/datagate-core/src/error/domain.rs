use super::ErrorCode;
use indexmap::IndexMap;

/// An error from the closed taxonomy together with the domain identifiers
/// needed to render its message.
#[derive(Debug)]
pub(super) struct DomainError {
    pub(super) code: ErrorCode,
    pub(super) context: IndexMap<String, String>,
}

impl DomainError {
    pub(super) fn new(code: ErrorCode) -> Self {
        DomainError {
            code,
            context: IndexMap::new(),
        }
    }

    /// Fills the code's template from the context.
    ///
    /// `{key}` is replaced verbatim, `{key:?}` is replaced in double quotes.
    /// Placeholders without a context value are kept as `{key}`.
    pub(super) fn message(&self) -> String {
        render(self.code.template(), &self.context)
    }
}

pub(super) fn render(template: &str, context: &IndexMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let placeholder = &rest[start + 1..start + len];
        let (key, quoted) = match placeholder.strip_suffix(":?") {
            Some(key) => (key, true),
            None => (placeholder, false),
        };

        let value = match context.get(key) {
            Some(value) => value.clone(),
            None => format!("{{{key}}}"),
        };

        if quoted {
            out.push('"');
            out.push_str(&value);
            out.push('"');
        } else {
            out.push_str(&value);
        }

        rest = &rest[start + len + 1..];
    }

    out.push_str(rest);
    out
}

impl std::error::Error for DomainError {}

impl core::fmt::Display for DomainError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message())
    }
}
