use super::Response;
use crate::{
    context::Context,
    redirect,
    transaction::{Conn, Executor},
    write::{self, Body, DataItem, WriteContext},
    Action, Method, Request, UrlParams,
};

use datagate_core::{
    object,
    schema::{DataType, Manifest, Model},
    stmt::{Delete, Value},
    Error, ErrorCode, Result,
};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Runs a write request through the write stream.
#[instrument(name = "write", skip_all, fields(path = %params.path, action = %params.action))]
pub(super) async fn write(conn: Conn, cx: Context, params: UrlParams, request: &Request) -> Result<Response> {
    let body = Body::decode(request, params.ns.is_some())?;
    let batch = body.batch;
    let format = params.format.clone();
    let action = params.action;

    let txn = conn.begin().await?;
    let wcx = Arc::new(WriteContext::new(cx, params, txn));
    let mut written = write::run(wcx.clone(), body).await?;
    debug!(
        written = written.items.len(),
        failed = written.errors.len(),
        "write stream finished"
    );

    if action == Action::Check {
        return Ok(Response::ok(object! { "status" => "OK" }, &format));
    }

    if !batch {
        if let Some(err) = written.errors.pop() {
            return Err(err);
        }
        if let [item] = written.items.as_slice() {
            let output = output(&wcx.cx.manifest, item);
            return Ok(match request.method {
                Method::Post => Response::with_status(201, output, &format),
                Method::Delete => Response::no_content(&format),
                _ => Response::ok(output, &format),
            });
        }
    }

    let data = written
        .items
        .iter()
        .map(|item| output(&wcx.cx.manifest, item))
        .collect();
    let mut body = IndexMap::new();
    body.insert("_data".to_string(), Value::List(data));
    if !written.errors.is_empty() {
        let errors = written
            .errors
            .iter()
            .flat_map(Error::envelopes)
            .map(|envelope| serde_json::to_value(envelope).map(Value::from_json))
            .collect::<serde_json::Result<Vec<_>>>()?;
        body.insert("_errors".to_string(), Value::List(errors));
    }
    Ok(Response::ok(Value::Object(body), &format))
}

/// `{_type, _id, _revision, ...changed values}`
fn output(manifest: &Manifest, item: &DataItem) -> Value {
    let mut out = IndexMap::new();
    if let Some(model) = item.model {
        out.insert("_type".to_string(), Value::from(manifest.model(model).name.as_str()));
    }
    out.insert("_id".to_string(), Value::from(item.id.clone()));
    out.insert("_revision".to_string(), Value::from(item.revision.clone()));
    if let (Action::Move, Some(target)) = (item.action, &item.target) {
        out.insert("redirect".to_string(), Value::from(target.as_str()));
    }
    out.extend(write::unflatten(&item.patch));
    Value::Object(out)
}

/// `DELETE /Model/:wipe` and `DELETE /<ns>/:wipe`: removes every row,
/// changelog entry and redirect.
pub(super) async fn wipe(conn: Conn, cx: &Context, params: &UrlParams) -> Result<Response> {
    let manifest = &cx.manifest;
    let models: Vec<&Model> = match (params.model, &params.ns) {
        (Some(model), _) => {
            let model = manifest.model(model);
            cx.gate.authorize_model(model, Action::Wipe)?;
            vec![model]
        }
        (None, Some(ns)) => {
            cx.gate.authorize_ns(ns, Action::Wipe)?;
            manifest.models_under(ns).collect()
        }
        (None, None) => return Err(Error::new(ErrorCode::ModelNotFound).with("model", &params.path)),
    };

    let mut txn = conn.begin().await?;
    for model in referrers_first(models) {
        for table in redirect::tables(model) {
            let delete = Delete {
                table,
                filter: None,
            };
            if let Err(err) = txn.exec(delete.into()).await {
                txn.rollback().await?;
                return Err(match err.as_integrity() {
                    Some(_) => Error::new(ErrorCode::ReferringObjectFound)
                        .with("id", "*")
                        .with("model", &model.name)
                        .with("referrer", "another model"),
                    None => err,
                });
            }
        }
        debug!(model = %model.name, "wiped");
    }
    txn.commit().await?;

    Ok(Response::ok(object! { "wiped" => true }, &params.format))
}

/// Orders models so that a model comes before the models it refers to.
fn referrers_first(mut models: Vec<&Model>) -> Vec<&Model> {
    let mut ordered = Vec::with_capacity(models.len());
    while !models.is_empty() {
        let position = models
            .iter()
            .position(|model| {
                !models
                    .iter()
                    .any(|other| other.id != model.id && refers_to(other, model))
            })
            .unwrap_or(0);
        ordered.push(models.remove(position));
    }
    ordered
}

fn refers_to(referrer: &Model, target: &Model) -> bool {
    referrer.props.iter().any(|prop| {
        matches!(&prop.dtype, DataType::Ref(reference) if reference.model == target.id)
    })
}
