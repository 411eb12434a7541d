use super::{open, stage, unflatten, DataItem, ItemStream, State, WriteContext};
use crate::{transaction::Executor, Action};

use datagate_core::{
    schema::{db, Model},
    stmt::{BinaryOp, ColumnRef, Direction, Filter, Insert, OrderBy, Select, SelectColumn, Type, Value},
    Result,
};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

const COLUMNS: [(&str, Type); 6] = [
    ("_cid", Type::Integer),
    ("_created", Type::String),
    ("_op", Type::String),
    ("_rid", Type::String),
    ("_revision", Type::String),
    ("_txn", Type::String),
];

/// Appends a changelog entry for every written item.
///
/// Items that changed nothing are not journaled, which keeps repeated
/// upserts of the same data invisible in the changes feed.
pub(super) fn changelog(wcx: Arc<WriteContext>, items: ItemStream) -> ItemStream {
    stage!(items, State::Journaled, |item| journal(&wcx, &item).await)
}

async fn journal(wcx: &WriteContext, item: &DataItem) -> Result<()> {
    if item.noop {
        return Ok(());
    }
    let model = wcx.cx.manifest.model(item.model_id()?);

    let data = match (item.action, &item.target) {
        (Action::Move, Some(target)) => datagate_core::object! { "redirect" => target.as_str() },
        _ => {
            let changed: IndexMap<String, Value> = item
                .patch
                .iter()
                .filter(|(place, _)| !place.starts_with('_'))
                .map(|(place, value)| (place.clone(), value.clone()))
                .collect();
            Value::Object(unflatten(&changed))
        }
    };

    let mut insert = Insert::new(db::changelog_table(&model.table));
    insert.set("_rid", item.id.clone());
    insert.set("_revision", item.revision.clone());
    insert.set("_op", item.action.name());
    insert.set("_txn", wcx.txn_id.as_str());
    insert.set("_created", chrono::Utc::now().to_rfc3339());
    insert.set("data", data);

    let mut txn = wcx.txn.lock().await;
    open(&mut txn)?.exec(insert.into()).await?;

    debug!(model = %model.name, id = ?item.id, action = %item.action, "change journaled");
    Ok(())
}

/// Reads the changes feed of a model, oldest first.
///
/// A non-negative `offset` starts at that change id; a negative one returns
/// the last `-offset` changes. With `id` only changes of that row are read.
pub(crate) async fn changes<E: Executor + ?Sized>(
    exec: &mut E,
    model: &Model,
    id: Option<&str>,
    offset: i64,
    limit: Option<u64>,
) -> Result<Vec<Value>> {
    let mut select = Select::new(db::changelog_table(&model.table), "t0");
    for (column, ty) in COLUMNS {
        select.push_column(SelectColumn::Column(ColumnRef::new("t0", column), ty));
    }
    select.push_column(SelectColumn::Column(ColumnRef::new("t0", "data"), Type::Json));

    let cid = || ColumnRef::new("t0", "_cid");
    if offset >= 0 {
        select.filter = Some(Filter::compare(cid(), BinaryOp::Ge, Value::Integer(offset)));
        select.order_by.push(OrderBy::new(cid(), Direction::Asc));
        select.limit = limit;
    } else {
        let last = offset.unsigned_abs();
        select.order_by.push(OrderBy::new(cid(), Direction::Desc));
        select.limit = Some(limit.map_or(last, |limit| limit.min(last)));
    }
    if let Some(id) = id {
        select.and_filter(Filter::eq(ColumnRef::new("t0", "_rid"), id));
    }

    let mut rows = exec.query(select).await?;
    if offset < 0 {
        rows.reverse();
    }
    Ok(rows.into_iter().map(change).collect())
}

/// `{_cid, _created, _op, _id, _revision, _txn, ...data}`
fn change(row: Vec<Value>) -> Value {
    let mut values = row.into_iter();
    let mut entry = IndexMap::new();
    for (column, _) in COLUMNS {
        let name = if column == "_rid" { "_id" } else { column };
        entry.insert(name.to_string(), values.next().unwrap_or_default());
    }

    let data = match values.next() {
        Some(Value::String(text)) => serde_json::from_str(&text)
            .map(Value::from_json)
            .unwrap_or(Value::String(text)),
        Some(data) => data,
        None => Value::Null,
    };
    if let Value::Object(fields) = data {
        entry.extend(fields);
    }
    Value::Object(entry)
}
