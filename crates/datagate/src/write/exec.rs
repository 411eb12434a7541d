use super::{open, DataItem, ItemStream, State, WriteContext};
use crate::{
    redirect,
    transaction::{Executor, Transaction},
    Action,
};

use datagate_core::{
    schema::{DataType, Manifest, Model, ID},
    stmt::{ColumnRef, Delete, Filter, Insert, Select, SelectColumn, Type, Update, Value},
    Error, ErrorCode, Integrity, Result,
};
use std::sync::Arc;
use tracing::debug;

/// Writes prepared items.
///
/// Consecutive items of the same model and action are written as a group
/// under one lock of the transaction. Every item runs inside its own
/// savepoint so that a failed item leaves no partial writes behind.
pub(super) fn exec(wcx: Arc<WriteContext>, items: ItemStream) -> ItemStream {
    let group_size = wcx.cx.config.group_size.max(1);

    Box::pin(async_stream::stream! {
        let mut group: Vec<DataItem> = Vec::with_capacity(group_size);

        for await item in items {
            let full = group.len() >= group_size
                || group.last().is_some_and(|last| group_key(last) != group_key(&item));
            if full {
                for item in write_group(&wcx, std::mem::take(&mut group)).await {
                    yield item;
                }
            }
            group.push(item);
        }

        for item in write_group(&wcx, group).await {
            yield item;
        }
    })
}

fn group_key(item: &DataItem) -> (Option<usize>, Action) {
    (item.model.map(|model| model.0), item.action)
}

async fn write_group(wcx: &WriteContext, mut group: Vec<DataItem>) -> Vec<DataItem> {
    let pending = group.iter().filter(|item| item.error.is_none()).count();
    if pending == 0 {
        return group;
    }
    if let Some(first) = group.iter().find(|item| item.error.is_none()) {
        let model = first.model.map(|id| wcx.cx.manifest.model(id).name.as_str());
        debug!(model = ?model, action = %first.action, size = pending, "writing group");
    }

    let mut txn = wcx.txn.lock().await;
    for item in group.iter_mut().filter(|item| item.error.is_none()) {
        let result = match open(&mut txn) {
            Ok(txn) => write_item(&wcx.cx.manifest, txn, item).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => item.state = State::Written,
            Err(err) => item.fail(err),
        }
    }
    group
}

async fn write_item(manifest: &Manifest, txn: &mut Transaction, item: &DataItem) -> Result<()> {
    if item.noop {
        return Ok(());
    }
    let model = manifest.model(item.model_id()?);
    let Some(id) = item.id.as_deref() else {
        datagate_core::bail!("write item {} has no id", item.index);
    };

    let mut savepoint = txn.savepoint().await?;
    match write(&mut savepoint, model, item, id).await {
        Ok(()) => savepoint.release().await,
        Err(err) => {
            savepoint.rollback().await?;
            Err(explain(manifest, txn, model, item, id, err).await)
        }
    }
}

async fn write<E: Executor + ?Sized>(exec: &mut E, model: &Model, item: &DataItem, id: &str) -> Result<()> {
    let by_id = || Filter::eq(ColumnRef::new("", ID), id);

    match item.action {
        Action::Insert => {
            let mut insert = Insert::new(&model.table);
            for (column, value) in &item.columns {
                insert.set(column, value.clone());
            }
            exec.exec(insert.into()).await?;
        }
        Action::Update | Action::Patch => {
            let update = Update {
                table: model.table.clone(),
                assignments: item.columns.clone(),
                filter: by_id(),
            };
            exec.exec(update.into()).await?;
        }
        Action::Delete => {
            let delete = Delete {
                table: model.table.clone(),
                filter: Some(by_id()),
            };
            exec.exec(delete.into()).await?;
        }
        Action::Move => {
            let Some(target) = item.target.as_deref() else {
                datagate_core::bail!("move of {id} has no target");
            };
            let delete = Delete {
                table: model.table.clone(),
                filter: Some(by_id()),
            };
            exec.exec(delete.into()).await?;
            redirect::record(exec, model, id, target).await?;
        }
        action => datagate_core::bail!("{action} does not write"),
    }
    Ok(())
}

/// Turns a backend integrity violation into the error clients see.
async fn explain(
    manifest: &Manifest,
    txn: &mut Transaction,
    model: &Model,
    item: &DataItem,
    id: &str,
    err: Error,
) -> Error {
    let Some(violation) = err.as_integrity().cloned() else {
        return err;
    };

    match violation {
        Integrity::ForeignKey { table } if matches!(item.action, Action::Delete | Action::Move) => {
            let referrer = manifest
                .models()
                .find(|referrer| referrer.table == table && referrer.id != model.id)
                .or_else(|| referrers(manifest, model).next())
                .map_or(table, |referrer| referrer.name.clone());
            Error::new(ErrorCode::ReferringObjectFound)
                .with("id", id)
                .with("model", &model.name)
                .with("referrer", referrer)
        }
        Integrity::ForeignKey { .. } => match missing_reference(manifest, txn, model, item).await {
            Ok(Some(err)) => err,
            Ok(None) => err,
            Err(lookup) => lookup,
        },
        Integrity::Unique { columns, .. } => {
            let props: Vec<&str> = model
                .flatprops
                .values()
                .map(|prop| model.prop(*prop))
                .filter(|prop| prop.columns.iter().any(|column| columns.contains(column)))
                .map(|prop| prop.place.as_str())
                .collect();
            match props.as_slice() {
                [property] => Error::new(ErrorCode::UniqueConstraint)
                    .with("model", &model.name)
                    .with("property", property),
                _ => Error::new(ErrorCode::CompositeUniqueConstraint)
                    .with("model", &model.name)
                    .with("properties", props.join(", ")),
            }
        }
    }
}

/// Models with a ref pointing at `model`.
fn referrers<'a>(manifest: &'a Manifest, model: &'a Model) -> impl Iterator<Item = &'a Model> + 'a {
    manifest.models().filter(move |referrer| {
        referrer.props.iter().any(|prop| {
            matches!(&prop.dtype, DataType::Ref(reference) if reference.model == model.id)
        })
    })
}

/// Finds the first ref of the patch that points at a missing row.
async fn missing_reference(
    manifest: &Manifest,
    txn: &mut Transaction,
    model: &Model,
    item: &DataItem,
) -> Result<Option<Error>> {
    for (place, value) in &item.patch {
        let Some(prop) = model.flatprop(place) else {
            continue;
        };
        let DataType::Ref(reference) = &prop.dtype else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let target = manifest.model(reference.model);
        let mut select = Select::new(&target.table, "t0");
        select.push_column(SelectColumn::Column(ColumnRef::new("t0", ID), Type::String));
        let mut key = vec![];
        for refprop in &reference.refprops {
            let refprop = target.prop(*refprop);
            let value = value.get(&refprop.name).cloned().unwrap_or_default();
            if let Some(column) = refprop.column() {
                select.and_filter(Filter::eq(ColumnRef::new("t0", column), value.clone()));
            }
            key.push(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        }
        select.limit = Some(1);

        if txn.query(select).await?.is_empty() {
            return Ok(Some(
                Error::new(ErrorCode::ReferencedObjectNotFound)
                    .with("id", key.join(", "))
                    .with("property", place),
            ));
        }
    }
    Ok(None)
}
