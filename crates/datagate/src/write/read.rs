use super::{open, stage, DataItem, ItemStream, State, WriteContext};
use crate::{
    query::{QueryBuilder, ROOT},
    redirect,
    result::ResultBuilder,
    Action,
};

use datagate_core::{
    expr::Node,
    schema::{Model, ID},
    stmt::{ColumnRef, Filter, Value},
    Error, ErrorCode, Result,
};
use std::sync::Arc;
use tracing::debug;

/// Reads the stored row of every item that addresses one.
///
/// Upserts become inserts when nothing is found and patches otherwise.
/// Ids of moved rows are followed to the row they were merged into.
pub(super) fn read(wcx: Arc<WriteContext>, items: ItemStream) -> ItemStream {
    stage!(
        items,
        if item.saved.is_some() {
            State::Fetched
        } else {
            State::Checked
        },
        |item| read_item(&wcx, &mut item).await
    )
}

async fn read_item(wcx: &WriteContext, item: &mut DataItem) -> Result<()> {
    if item.action == Action::Insert {
        return Ok(());
    }
    let manifest = wcx.cx.manifest.clone();
    let model = manifest.model(item.model_id()?);
    let filter = item.filter.as_ref().map(|(_, node)| node);

    let mut rows = find(wcx, model, item.id.as_deref(), filter).await?;
    if rows.is_empty() && filter.is_none() {
        if let Some(id) = &item.id {
            let moved = {
                let mut txn = wcx.txn.lock().await;
                redirect::lookup(open(&mut txn)?, model, id).await?
            };
            if let Some(moved) = moved {
                debug!(model = %model.name, from = %id, to = %moved, "following redirect");
                rows = find(wcx, model, Some(&moved), None).await?;
                item.id = Some(moved);
            }
        }
    }

    if rows.len() > 1 {
        return Err(Error::new(ErrorCode::MultipleRowsFound).with("model", &model.name));
    }

    let Some(saved) = rows.pop() else {
        if item.action == Action::Upsert {
            item.action = Action::Insert;
            return Ok(());
        }
        return Err(not_found(model, item));
    };

    if item.action == Action::Upsert {
        item.action = Action::Patch;
    }
    if item.id.is_none() {
        item.id = saved.get(ID).and_then(Value::as_str).map(str::to_string);
    }
    if let Some(given) = item.payload.get("_revision") {
        if saved.get("_revision") != Some(given) {
            return Err(Error::new(ErrorCode::InvalidValue)
                .with("reason", format!("_revision {given} is not the current revision")));
        }
    }
    item.saved = Some(saved);

    if item.action == Action::Move {
        let target = item.target.clone().unwrap_or_default();
        if item.id.as_deref() == Some(target.as_str()) {
            return Err(Error::new(ErrorCode::InvalidValue).with("reason", "can't move a row onto itself"));
        }
        if find(wcx, model, Some(&target), None).await?.is_empty() {
            return Err(Error::new(ErrorCode::ItemDoesNotExist)
                .with("id", target)
                .with("model", &model.name));
        }
    }

    debug!(index = item.index, model = %model.name, action = %item.action, "existing row read");
    Ok(())
}

/// Rows of `model` with the given id and matching the filter, read the way
/// a client would see them. At most two rows are read.
pub(super) async fn find(
    wcx: &WriteContext,
    model: &Model,
    id: Option<&str>,
    filter: Option<&Node>,
) -> Result<Vec<Value>> {
    let mut builder = QueryBuilder::internal(wcx.cx.manifest.clone(), model.id);
    builder.select(None)?;
    if let Some(filter) = filter {
        builder.filter(std::slice::from_ref(filter))?;
    }
    let mut plan = builder.build()?;
    if let Some(id) = id {
        plan.select.and_filter(Filter::eq(ColumnRef::new(ROOT, ID), id));
    }
    plan.select.limit = Some(2);

    let rows = wcx.query(plan.select.clone()).await?;
    let mut results = ResultBuilder::new(wcx.cx.manifest.clone());
    rows.iter().map(|row| results.row(&plan.output, row)).collect()
}

fn not_found(model: &Model, item: &DataItem) -> Error {
    let id = match (&item.id, &item.filter) {
        (Some(id), _) => id.clone(),
        (None, Some((filter, _))) => filter.clone(),
        (None, None) => String::new(),
    };
    Error::new(ErrorCode::ItemDoesNotExist)
        .with("id", id)
        .with("model", &model.name)
}
