//! The write stream.
//!
//! A write request is decoded into [`DataItem`]s which flow through a chain
//! of lazy stages, each consuming the stream of the previous one:
//!
//! ```text
//! parse -> check -> read -> validate -> patch -> prepare -> exec -> changelog
//! ```
//!
//! A stage that fails on an item records the error on the item and passes it
//! on; later stages skip errored items. The caller decides what an error
//! means: without `fault-tolerant()` the first one aborts the transaction,
//! otherwise errors are collected until `max_error_count` is reached.

mod changelog;
pub(crate) use changelog::changes;

mod check;

mod exec;

mod parse;
pub(crate) use parse::Body;

mod patch;

mod prepare;

mod read;

mod validate;

use crate::{
    context::Context,
    transaction::{Executor, Transaction},
    Action, UrlParams,
};

use datagate_core::{
    expr::Node,
    schema::{ModelId, PropId},
    stmt::{Select, Value},
    Error, Result,
};
use indexmap::IndexMap;
use std::pin::Pin;
use tokio::sync::Mutex;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

pub(crate) type ItemStream = Pin<Box<dyn Stream<Item = DataItem> + Send>>;

/// Runs a stage body on every item that has not failed yet.
///
/// On success the item moves to `$state`; on failure it carries the error.
macro_rules! stage {
    ($items:expr, $state:expr, |$item:ident| $body:expr) => {
        Box::pin(async_stream::stream! {
            for await mut $item in $items {
                if $item.error.is_none() {
                    let result: datagate_core::Result<()> = $body;
                    match result {
                        Ok(()) => $item.state = $state,
                        Err(err) => $item.fail(err),
                    }
                }
                yield $item;
            }
        })
    };
}
pub(crate) use stage;

/// How far an item got through the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum State {
    Parsed,
    Checked,
    Fetched,
    Validated,
    Patched,
    Prepared,
    Written,
    Journaled,
    Error,
}

/// One record of a write request.
#[derive(Debug, Clone)]
pub(crate) struct DataItem {
    /// Position in the request body
    pub(crate) index: usize,

    pub(crate) state: State,

    pub(crate) model: Option<ModelId>,

    /// Property addressed by the URL, e.g. `PATCH /City/<id>/address`
    pub(crate) prop: Option<PropId>,
    pub(crate) propref: bool,

    pub(crate) action: Action,

    /// Fields as sent, reserved ones included
    pub(crate) payload: IndexMap<String, Value>,

    /// Id of the addressed row; for inserts the id of the new row
    pub(crate) id: Option<String>,

    /// Id a moved row is merged into
    pub(crate) target: Option<String>,

    /// `_where` as written and parsed
    pub(crate) filter: Option<(String, Node)>,

    /// Validated user values keyed by property place
    pub(crate) given: IndexMap<String, Value>,

    /// The stored row, as a client would read it
    pub(crate) saved: Option<Value>,

    /// Changed values keyed by property place
    pub(crate) patch: IndexMap<String, Value>,

    pub(crate) revision: Option<String>,

    /// Nothing changed; the row is not written
    pub(crate) noop: bool,

    /// Storage columns to write
    pub(crate) columns: Vec<(String, Value)>,

    pub(crate) error: Option<Error>,
}

impl DataItem {
    pub(crate) fn new(index: usize, action: Action) -> DataItem {
        DataItem {
            index,
            state: State::Parsed,
            model: None,
            prop: None,
            propref: false,
            action,
            payload: IndexMap::new(),
            id: None,
            target: None,
            filter: None,
            given: IndexMap::new(),
            saved: None,
            patch: IndexMap::new(),
            revision: None,
            noop: false,
            columns: vec![],
            error: None,
        }
    }

    pub(crate) fn fail(&mut self, err: Error) {
        self.state = State::Error;
        self.error = Some(err);
    }

    /// The model of an item that passed parsing.
    pub(crate) fn model_id(&self) -> Result<ModelId> {
        self.model
            .ok_or_else(|| datagate_core::err!("write item {} has no model", self.index))
    }

    /// The saved revision, if a row was read.
    pub(crate) fn saved_revision(&self) -> Option<&str> {
        self.saved
            .as_ref()
            .and_then(|saved| saved.get("_revision"))
            .and_then(Value::as_str)
    }
}

/// State shared by the stages of one write stream.
#[derive(Debug)]
pub(crate) struct WriteContext {
    pub(crate) cx: Context,
    pub(crate) params: UrlParams,

    /// `None` once committed or rolled back
    pub(crate) txn: Mutex<Option<Transaction>>,

    /// Shared by every changelog entry of the stream
    pub(crate) txn_id: String,
}

impl WriteContext {
    pub(crate) fn new(cx: Context, params: UrlParams, txn: Transaction) -> WriteContext {
        WriteContext {
            cx,
            params,
            txn: Mutex::new(Some(txn)),
            txn_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        match self.txn.lock().await.take() {
            Some(txn) => txn.commit().await,
            None => datagate_core::bail!("write transaction already closed"),
        }
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        match self.txn.lock().await.take() {
            Some(txn) => txn.rollback().await,
            None => Ok(()),
        }
    }

    /// Runs a query inside the write transaction.
    pub(crate) async fn query(&self, select: Select) -> Result<Vec<Vec<Value>>> {
        let mut txn = self.txn.lock().await;
        open(&mut txn)?.query(select).await
    }
}

/// The transaction of a stream that has not finished yet.
pub(crate) fn open(txn: &mut Option<Transaction>) -> Result<&mut Transaction> {
    txn.as_mut()
        .ok_or_else(|| datagate_core::err!("write transaction already closed"))
}

/// Chains every stage over the decoded body.
///
/// `:check` requests stop after the patch is computed.
pub(crate) fn pipeline(wcx: std::sync::Arc<WriteContext>, body: Body) -> ItemStream {
    let items = parse::parse(wcx.clone(), body);
    let items = check::check(wcx.clone(), items);
    let items = read::read(wcx.clone(), items);
    let items = validate::validate(wcx.clone(), items);
    let items = patch::patch(wcx.clone(), items);
    if wcx.params.action == Action::Check {
        return items;
    }
    let items = prepare::prepare(wcx.clone(), items);
    let items = exec::exec(wcx.clone(), items);
    changelog::changelog(wcx, items)
}

/// What a finished write stream produced.
#[derive(Debug, Default)]
pub(crate) struct Written {
    pub(crate) items: Vec<DataItem>,
    pub(crate) errors: Vec<Error>,
}

/// Drains the stream and commits, or rolls back on failure.
///
/// Without `fault-tolerant()` the first failed item rolls everything back
/// and its error is returned. Fault-tolerant streams keep going and report
/// failed items alongside the written ones, unless `max_error_count` errors
/// pile up.
pub(crate) async fn run(wcx: std::sync::Arc<WriteContext>, body: Body) -> Result<Written> {
    let fault_tolerant = wcx.params.fault_tolerant;
    let max_errors = wcx.cx.config.max_error_count.max(1);

    let mut written = Written::default();
    let mut items = pipeline(wcx.clone(), body);

    while let Some(mut item) = items.next().await {
        let Some(err) = item.error.take() else {
            written.items.push(item);
            continue;
        };

        if !fault_tolerant {
            drop(items);
            wcx.rollback().await?;
            return Err(err);
        }

        debug!(index = item.index, error = %err, "write item failed");
        written.errors.push(err);
        if written.errors.len() >= max_errors {
            drop(items);
            wcx.rollback().await?;
            return Err(Error::multiple(written.errors));
        }
    }
    drop(items);

    if wcx.params.action == Action::Check {
        wcx.rollback().await?;
    } else {
        wcx.commit().await?;
    }
    Ok(written)
}

/// Nests `place`-keyed values into objects: `address.city` becomes
/// `{"address": {"city": ...}}`.
pub(crate) fn unflatten(values: &IndexMap<String, Value>) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    for (place, value) in values {
        insert_path(&mut out, place, value.clone());
    }
    out
}

fn insert_path(object: &mut IndexMap<String, Value>, place: &str, value: Value) {
    match place.split_once('.') {
        None => {
            object.insert(place.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(IndexMap::new()));
            if !entry.is_object() {
                *entry = Value::Object(IndexMap::new());
            }
            if let Some(nested) = entry.as_object_mut() {
                insert_path(nested, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests;
