use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

/// An incoming request, detached from any HTTP server.
///
/// ```
/// use datagate::{Method, Request};
///
/// let request = Request::get("/City?select(name)&name=%22Vilnius%22")
///     .header("Accept-Language", "lt, en;q=0.5")
///     .scope("datagate_getall");
/// assert_eq!(request.method, Method::Get);
/// assert_eq!(request.query, "select(name)&name=\"Vilnius\"");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,

    /// Raw path, percent-encoded
    pub path: String,

    /// Decoded query string
    pub query: String,

    /// Headers with lower-cased names
    pub headers: IndexMap<String, String>,

    pub body: Vec<u8>,

    /// Scopes granted to the client
    pub scopes: Arc<HashSet<String>>,
}

impl Request {
    /// Builds a request for `target`, a path with an optional `?query`.
    pub fn new(method: Method, target: &str) -> Request {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Request {
            method,
            path: path.to_string(),
            query: percent_decode_str(query).decode_utf8_lossy().into_owned(),
            headers: IndexMap::new(),
            body: vec![],
            scopes: Arc::default(),
        }
    }

    pub fn get(target: &str) -> Request {
        Request::new(Method::Get, target)
    }

    pub fn head(target: &str) -> Request {
        Request::new(Method::Head, target)
    }

    pub fn post(target: &str) -> Request {
        Request::new(Method::Post, target)
    }

    pub fn put(target: &str) -> Request {
        Request::new(Method::Put, target)
    }

    pub fn patch(target: &str) -> Request {
        Request::new(Method::Patch, target)
    }

    pub fn delete(target: &str) -> Request {
        Request::new(Method::Delete, target)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Request {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: &serde_json::Value) -> Request {
        self.body = body.to_string().into_bytes();
        self.header("content-type", "application/json")
    }

    /// Sets a JSON lines body, one object per line.
    pub fn jsonl<'a>(mut self, items: impl IntoIterator<Item = &'a serde_json::Value>) -> Request {
        let lines: Vec<String> = items.into_iter().map(ToString::to_string).collect();
        self.body = lines.join("\n").into_bytes();
        self.header("content-type", "application/x-ndjson")
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Request {
        Arc::make_mut(&mut self.scopes).insert(scope.into());
        self
    }

    pub fn scopes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, scopes: I) -> Request {
        Arc::make_mut(&mut self.scopes).extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The media type of the body, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.header_value("content-type")
            .map(|value| value.split(';').next().unwrap_or(value).trim())
    }
}
