use datagate_core::{stmt::Value, Error, ErrorCode, Result};

use indexmap::IndexMap;

/// Known output formats and their media types.
const CATALOG: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("jsonl", "application/x-ndjson"),
    ("csv", "text/csv"),
    ("ascii", "text/plain"),
    ("html", "text/html"),
];

/// The negotiated output format.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    pub name: String,

    /// Renderer options, e.g. `width` of `format(ascii, width(100))`
    pub params: IndexMap<String, Value>,
}

impl Format {
    /// A format from the catalog, by name.
    pub fn named(name: &str) -> Result<Format> {
        if CATALOG.iter().any(|(known, _)| *known == name) {
            Ok(Format {
                name: name.to_string(),
                params: IndexMap::new(),
            })
        } else {
            Err(Error::new(ErrorCode::UnknownOutputFormat).with("name", name))
        }
    }

    pub fn media_type(&self) -> &'static str {
        CATALOG
            .iter()
            .find(|(name, _)| *name == self.name)
            .map(|(_, media_type)| *media_type)
            .unwrap_or("application/octet-stream")
    }

    /// Picks the format for an `Accept` header.
    ///
    /// Media ranges are tried by descending quality; the first one that
    /// matches the catalog wins. Wildcards and unmatched headers fall back to
    /// `default`.
    pub fn negotiate(accept: Option<&str>, default: &str) -> Result<Format> {
        let Some(accept) = accept else {
            return Format::named(default);
        };

        let mut ranges: Vec<(&str, f32)> = accept
            .split(',')
            .filter_map(|range| {
                let mut parts = range.split(';').map(str::trim);
                let media_type = parts.next().filter(|media_type| !media_type.is_empty())?;
                let quality = parts
                    .find_map(|param| param.strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((media_type, quality))
            })
            .filter(|(_, quality)| *quality > 0.0)
            .collect();
        ranges.sort_by(|(_, lhs), (_, rhs)| rhs.total_cmp(lhs));

        for (media_type, _) in ranges {
            if media_type == "*/*" || media_type == "application/*" {
                return Format::named(default);
            }
            let known = CATALOG.iter().find(|(_, known)| known.eq_ignore_ascii_case(media_type));
            if let Some((name, _)) = known {
                return Format::named(name);
            }
        }

        Format::named(default)
    }
}
