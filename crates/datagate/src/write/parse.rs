use super::{DataItem, ItemStream, WriteContext};
use crate::{spyna, Action, Request};

use datagate_core::{
    expr::Node,
    schema::{Manifest, Model},
    stmt::Value,
    Error, ErrorCode, Result,
};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Media types of bodies holding one JSON object per line.
const JSON_LINES: &[&str] = &[
    "application/x-ndjson",
    "application/jsonl",
    "application/x-jsonlines",
];

/// The decoded records of a write request.
#[derive(Debug)]
pub(crate) struct Body {
    /// One entry per record; a record that failed to decode carries its
    /// error
    pub(crate) items: Vec<Result<IndexMap<String, Value>>>,

    /// Several records were sent: `{"_data": [...]}`, JSON lines or a
    /// namespace write
    pub(crate) batch: bool,
}

impl Body {
    pub(crate) fn decode(request: &Request, namespace: bool) -> Result<Body> {
        let content_type = request.content_type().unwrap_or("application/json");

        if JSON_LINES.contains(&content_type) {
            let text = std::str::from_utf8(&request.body).map_err(|err| {
                Error::new(ErrorCode::JSONError).with("error", err)
            })?;
            let items = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str(line).map_err(Error::from).and_then(into_record))
                .collect();
            return Ok(Body { items, batch: true });
        }

        if content_type != "application/json" {
            return Err(Error::new(ErrorCode::UnknownContentType).with("content_type", content_type));
        }

        if request.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Body {
                items: vec![Ok(IndexMap::new())],
                batch: namespace,
            });
        }

        let json: serde_json::Value = serde_json::from_slice(&request.body)?;
        let mut record = into_record(json)?;
        match record.shift_remove("_data") {
            Some(Value::List(items)) => Ok(Body {
                items: items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(fields) => Ok(fields),
                        other => Err(not_an_object(&other)),
                    })
                    .collect(),
                batch: true,
            }),
            Some(other) => Err(Error::new(ErrorCode::InvalidValue)
                .with("reason", format!("_data must be a list, got {}", other.type_name()))),
            None => Ok(Body {
                items: vec![Ok(record)],
                batch: namespace,
            }),
        }
    }
}

fn into_record(json: serde_json::Value) -> Result<IndexMap<String, Value>> {
    match Value::from_json(json) {
        Value::Object(fields) => Ok(fields),
        other => Err(not_an_object(&other)),
    }
}

fn not_an_object(value: &Value) -> Error {
    Error::new(ErrorCode::InvalidValue)
        .with("reason", format!("expected an object, got {}", value.type_name()))
}

/// Turns decoded records into items: resolves `_type`, `_op`, `_id` and
/// `_where`.
pub(super) fn parse(wcx: Arc<WriteContext>, body: Body) -> ItemStream {
    let action = match wcx.params.action {
        Action::Check => Action::Insert,
        action => action,
    };

    Box::pin(async_stream::stream! {
        for (index, record) in body.items.into_iter().enumerate() {
            let mut item = DataItem::new(index, action);
            if let Err(err) = record.and_then(|record| parse_item(&wcx, &mut item, record)) {
                item.fail(err);
            }
            debug!(index, action = %item.action, error = item.error.is_some(), "item parsed");
            yield item;
        }
    })
}

fn parse_item(wcx: &WriteContext, item: &mut DataItem, mut payload: IndexMap<String, Value>) -> Result<()> {
    let manifest = &wcx.cx.manifest;
    let params = &wcx.params;

    let model = match (params.model, payload.get("_type")) {
        (Some(model), None) => manifest.model(model),
        (Some(model), Some(ty)) => {
            let model = manifest.model(model);
            if ty.as_str() != Some(model.name.as_str()) {
                return Err(Error::new(ErrorCode::InvalidValue).with(
                    "reason",
                    format!("_type {ty} does not match model {:?}", model.name),
                ));
            }
            model
        }
        (None, Some(ty)) => {
            let ns = params.ns.as_deref().unwrap_or_default();
            find_in_namespace(manifest, ns, string_field("_type", ty)?)?
        }
        (None, None) => {
            return Err(Error::new(ErrorCode::InvalidValue)
                .with("reason", "_type is required when writing to a namespace"))
        }
    };
    item.model = Some(model.id);

    if let Some(op) = payload.get("_op") {
        let op = string_field("_op", op)?;
        item.action = Action::from_op(op).ok_or_else(|| {
            Error::new(ErrorCode::InvalidValue).with("reason", format!("unknown _op {op:?}"))
        })?;
    }

    if let Some(prop) = params.prop {
        let property = manifest.prop(prop);
        if property.parent.is_some() {
            return Err(Error::new(ErrorCode::NotImplementedFeature)
                .with("feature", format!("Writing nested property {:?}", property.place)));
        }
        payload = wrap_subresource(payload, &property.name);
        item.prop = Some(prop);
        item.propref = params.propref;
    }

    if let Some(filter) = payload.get("_where") {
        let filter = string_field("_where", filter)?;
        let node = Node::from_ast(&spyna::parse_expr(filter)?)?;
        item.filter = Some((filter.to_string(), node));
    }

    let payload_id = payload
        .get("_id")
        .map(|id| string_field("_id", id).map(str::to_string))
        .transpose()?;

    if item.action == Action::Move {
        item.target = payload_id;
        item.id = params.pk.clone();
    } else {
        item.id = match (&params.pk, payload_id) {
            (Some(pk), Some(id)) if *pk != id => {
                return Err(Error::new(ErrorCode::InvalidValue)
                    .with("reason", format!("_id {id:?} does not match {pk:?} of the URL")))
            }
            (Some(pk), _) => Some(pk.clone()),
            (None, id) => id,
        };
    }

    item.payload = payload;
    Ok(())
}

/// `PATCH /City/<id>/address` with `{"street": ...}` writes
/// `{"address": {"street": ...}}`. Reserved fields stay on top.
fn wrap_subresource(payload: IndexMap<String, Value>, name: &str) -> IndexMap<String, Value> {
    let (reserved, fields): (IndexMap<_, _>, IndexMap<_, _>) =
        payload.into_iter().partition(|(key, _)| key.starts_with('_') && key != "_id");

    let mut wrapped = reserved;
    let value = match fields.len() {
        0 => Value::Null,
        _ => Value::Object(fields),
    };
    wrapped.insert(name.to_string(), value);
    wrapped
}

/// Looks up `_type` of a namespace write: a full model name or a name
/// relative to the namespace.
fn find_in_namespace<'a>(manifest: &'a Manifest, ns: &str, name: &str) -> Result<&'a Model> {
    let relative = (!ns.is_empty()).then(|| format!("{ns}/{name}"));
    let model = relative
        .as_deref()
        .and_then(|relative| manifest.find_model(relative))
        .or_else(|| manifest.find_model(name))
        .filter(|model| manifest.models_under(ns).any(|under| under.id == model.id));

    model.ok_or_else(|| Error::new(ErrorCode::ModelNotFound).with("model", name))
}

fn string_field<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        Error::new(ErrorCode::InvalidValue)
            .with("reason", format!("{name} must be a string, got {}", value.type_name()))
    })
}
