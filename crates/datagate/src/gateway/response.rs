use crate::Format;

use datagate_core::{stmt::Value, Error, Result};
use indexmap::IndexMap;

/// A response ready to be rendered.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,

    /// Headers with lower-cased names
    pub headers: IndexMap<String, String>,

    /// `None` for responses without a body, e.g. `204` and `HEAD`
    pub body: Option<Value>,

    pub format: Format,
}

impl Response {
    pub(crate) fn ok(body: Value, format: &Format) -> Response {
        Response::with_status(200, body, format)
    }

    pub(crate) fn with_status(status: u16, body: Value, format: &Format) -> Response {
        let mut headers = IndexMap::new();
        headers.insert("content-type".to_string(), format.media_type().to_string());
        Response {
            status,
            headers,
            body: Some(body),
            format: format.clone(),
        }
    }

    pub(crate) fn no_content(format: &Format) -> Response {
        Response {
            status: 204,
            headers: IndexMap::new(),
            body: None,
            format: format.clone(),
        }
    }

    /// `{"errors": [envelope, ...]}` with the status of the error.
    pub(crate) fn error(err: &Error) -> Response {
        let errors = err
            .envelopes()
            .iter()
            .map(|envelope| match serde_json::to_value(envelope) {
                Ok(json) => Value::from_json(json),
                Err(_) => Value::from(envelope.message.as_str()),
            })
            .collect();
        let body = datagate_core::object! { "errors" => Value::List(errors) };
        Response::with_status(err.status(), body, &super::json())
    }

    /// Formats a body can be rendered in.
    pub(crate) fn renders(format: &Format) -> bool {
        matches!(format.name.as_str(), "json" | "jsonl")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The body as JSON; `null` when there is none.
    pub fn json(&self) -> serde_json::Value {
        self.body
            .as_ref()
            .map_or(serde_json::Value::Null, Value::to_json)
    }

    /// Renders the body. JSON lines put every `_data` item on its own line.
    pub fn render(&self) -> Result<String> {
        let Some(body) = &self.body else {
            return Ok(String::new());
        };
        match self.format.name.as_str() {
            "json" => Ok(serde_json::to_string(&body.to_json())?),
            "jsonl" => {
                let lines = match body.get("_data").and_then(Value::as_list) {
                    Some(items) => items
                        .iter()
                        .map(|item| serde_json::to_string(&item.to_json()))
                        .collect::<serde_json::Result<Vec<_>>>()?,
                    None => vec![serde_json::to_string(&body.to_json())?],
                };
                Ok(lines.join("\n"))
            }
            name => Err(super::not_implemented(format!("format({name})"))),
        }
    }
}
