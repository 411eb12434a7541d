use super::Response;
use crate::{
    context::Context,
    page::{self, Page},
    query::{self, QueryPlan, ROOT},
    redirect,
    result::ResultBuilder,
    transaction::{Conn, Executor},
    write, Action, UrlParams,
};

use datagate_core::{
    object,
    schema::{DataType, Manifest, Model, Namespace, ID},
    stmt::{ColumnRef, Direction, Filter, OrderBy, Select, SelectColumn, Type, Value},
    Error, ErrorCode, Result,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, instrument};

fn model_of<'a>(cx: &'a Context, params: &UrlParams) -> Result<&'a Model> {
    match params.model {
        Some(model) => Ok(cx.manifest.model(model)),
        None => Err(Error::new(ErrorCode::ModelNotFound).with("model", &params.path)),
    }
}

/// Lists rows of a model, paginated by its keyset.
#[instrument(name = "getall", skip_all, fields(model = %params.path))]
pub(super) async fn getall(mut conn: Conn, cx: &Context, params: &UrlParams) -> Result<Response> {
    let model = model_of(cx, params)?;
    cx.gate.authorize_model(model, params.action)?;

    let mut plan = query::plan(cx, model.id, params)?;
    let page = Page::plan(&cx.manifest, &mut plan, params, &cx.config)?;
    let fetched = page::fetch(&mut conn, &plan, page.as_ref(), params.limit, params.offset).await?;

    let mut results = ResultBuilder::new(cx.manifest.clone());
    let mut data = fetched
        .rows
        .iter()
        .map(|row| results.row(&plan.output, row))
        .collect::<Result<Vec<_>>>()?;
    expand_backrefs(&mut conn, &cx.manifest, &plan, &fetched.rows, &mut data).await?;
    debug!(rows = data.len(), next = fetched.next.is_some(), "listing read");

    let mut body = IndexMap::new();
    body.insert("_data".to_string(), Value::List(data));
    if let Some(next) = fetched.next {
        body.insert("_page".to_string(), object! { "next" => next });
    }
    Ok(Response::ok(Value::Object(body), &params.format))
}

/// Reads one row by id. Ids of moved rows answer with `301` and the row
/// they were moved into.
#[instrument(name = "getone", skip_all, fields(model = %params.path, id = ?params.pk))]
pub(super) async fn getone(mut conn: Conn, cx: &Context, params: &UrlParams) -> Result<Response> {
    let model = model_of(cx, params)?;
    cx.gate.authorize_model(model, Action::GetOne)?;
    let Some(pk) = params.pk.as_deref() else {
        return Err(Error::new(ErrorCode::ItemDoesNotExist).with("model", &model.name));
    };

    let plan = query::plan(cx, model.id, params)?;
    let mut found = read_one(&mut conn, cx, &plan, pk).await?;

    let mut moved = None;
    if found.is_none() {
        if let Some(target) = redirect::lookup(&mut conn, model, pk).await? {
            debug!(from = pk, to = %target, "redirected");
            found = read_one(&mut conn, cx, &plan, &target).await?;
            moved = Some(target);
        }
    }

    let Some(mut row) = found else {
        return Err(Error::new(ErrorCode::ItemDoesNotExist)
            .with("id", pk)
            .with("model", &model.name));
    };

    if let Some(prop) = params.prop {
        let prop = cx.manifest.prop(prop);
        cx.gate.authorize_prop(model, prop, Action::GetOne)?;
        let value = row.get_path(&prop.place).cloned().unwrap_or_default();
        let mut sub = IndexMap::new();
        for key in ["_type", "_id", "_revision"] {
            sub.insert(key.to_string(), row.get(key).cloned().unwrap_or_default());
        }
        sub.insert(prop.name.clone(), value);
        row = Value::Object(sub);
    }

    Ok(match moved {
        Some(target) => {
            let mut response = Response::with_status(301, row, &params.format);
            response
                .headers
                .insert("location".to_string(), format!("/{}/{target}", model.name));
            response
        }
        None => Response::ok(row, &params.format),
    })
}

async fn read_one(conn: &mut Conn, cx: &Context, plan: &QueryPlan, id: &str) -> Result<Option<Value>> {
    let mut select = plan.select.clone();
    select.and_filter(Filter::eq(ColumnRef::new(ROOT, ID), id));
    select.limit = Some(2);

    let rows = conn.query(select).await?;
    if rows.len() > 1 {
        let model = cx.manifest.model(plan.model);
        return Err(Error::new(ErrorCode::MultipleRowsFound).with("model", &model.name));
    }

    let mut results = ResultBuilder::new(cx.manifest.clone());
    let mut data = rows
        .iter()
        .map(|row| results.row(&plan.output, row))
        .collect::<Result<Vec<_>>>()?;
    expand_backrefs(conn, &cx.manifest, plan, &rows, &mut data).await?;
    Ok(data.pop())
}

/// Fills expanded back references with `{_id}` of the referring rows, read
/// with one query per back reference.
async fn expand_backrefs<E: Executor + ?Sized>(
    exec: &mut E,
    manifest: &Manifest,
    plan: &QueryPlan,
    rows: &[Vec<Value>],
    data: &mut [Value],
) -> Result<()> {
    let Some(id_item) = plan.id_item else {
        return Ok(());
    };
    if plan.backrefs.is_empty() || rows.is_empty() {
        return Ok(());
    }
    let ids: Vec<Value> = rows.iter().map(|row| row[id_item].clone()).collect();

    for (key, prop) in &plan.backrefs {
        let DataType::BackRef(backref) = &manifest.prop(*prop).dtype else {
            continue;
        };
        let referrer = manifest.model(backref.model);
        let Some(column) = manifest.prop(backref.refprop).columns.first() else {
            continue;
        };

        let mut select = Select::new(&referrer.table, ROOT);
        select.push_column(SelectColumn::Column(ColumnRef::new(ROOT, ID), Type::String));
        select.push_column(SelectColumn::Column(ColumnRef::new(ROOT, column), Type::String));
        select.filter = Some(Filter::InList {
            column: ColumnRef::new(ROOT, column),
            values: ids.clone(),
        });
        select.order_by.push(OrderBy::new(ColumnRef::new(ROOT, ID), Direction::Asc));

        let mut referring: HashMap<String, Vec<Value>> = HashMap::new();
        for row in exec.query(select).await? {
            if let [id, Value::String(target)] = row.as_slice() {
                referring
                    .entry(target.clone())
                    .or_default()
                    .push(object! { "_id" => id.clone() });
            }
        }

        for (row, out) in rows.iter().zip(data.iter_mut()) {
            let list = row[id_item]
                .as_str()
                .and_then(|id| referring.get(id))
                .cloned()
                .unwrap_or_default();
            if let Some(object) = out.as_object_mut() {
                if object.contains_key(key) {
                    object.insert(key.clone(), Value::List(list));
                }
            }
        }
    }
    Ok(())
}

/// `GET /Model/:changes/<offset>`
pub(super) async fn changes(mut conn: Conn, cx: &Context, params: &UrlParams) -> Result<Response> {
    let model = model_of(cx, params)?;
    cx.gate.authorize_model(model, Action::Changes)?;

    let offset = params.changes.unwrap_or(0);
    let data = write::changes(&mut conn, model, params.pk.as_deref(), offset, params.limit).await?;
    Ok(Response::ok(object! { "_data" => Value::List(data) }, &params.format))
}

/// `GET /<ns>/:ns` lists child namespaces and the models the client may
/// read; `:all` descends into every child namespace.
pub(super) fn namespace(cx: &Context, params: &UrlParams) -> Result<Response> {
    let name = params.ns.as_deref().unwrap_or_default();
    cx.gate.authorize_ns(name, Action::GetAll)?;
    let namespace = cx
        .manifest
        .namespace(name)
        .ok_or_else(|| Error::new(ErrorCode::NamespaceNotFound).with("namespace", name))?;

    let mut data = vec![];
    list(cx, namespace, params.all, &mut data);
    Ok(Response::ok(object! { "_data" => Value::List(data) }, &params.format))
}

fn list(cx: &Context, namespace: &Namespace, all: bool, data: &mut Vec<Value>) {
    for child in &namespace.children {
        let Some(child) = cx.manifest.namespace(child) else {
            continue;
        };
        data.push(object! {
            "_type" => "ns",
            "name" => format!("{}/:ns", child.name),
            "title" => child.title.as_str(),
            "description" => child.description.as_str(),
        });
        if all {
            list(cx, child, all, data);
        }
    }

    for model in &namespace.models {
        let model = cx.manifest.model(*model);
        if cx.gate.authorize_model(model, Action::GetAll).is_err() {
            continue;
        }
        data.push(object! {
            "_type" => "model",
            "name" => model.name.as_str(),
            "title" => model.title.as_str(),
            "description" => "",
        });
    }
}
