//! Keyset pagination.
//!
//! Rows are read in windows ordered by the sort keys followed by the model's
//! page keys. The next window starts after the keys of the last row read,
//! so no offsets are used. The client-facing cursor is the base64 encoded
//! JSON list of those keys.

use crate::{
    query::{QueryPlan, ROOT},
    transaction::Executor,
    Config, UrlParams,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use datagate_core::{
    stmt::{BinaryOp, ColumnRef, Direction, Filter, OrderBy, SelectColumn, Type, Value},
    Error, ErrorCode, Manifest, Result,
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub(crate) struct Page {
    model: String,
    keys: Vec<Key>,

    /// Rows per window
    pub(crate) size: u64,

    /// Keys of the row read before this page
    prior: Option<Vec<Value>>,
}

#[derive(Debug, Clone)]
struct Key {
    name: String,

    /// Position of the key in a row
    item: usize,

    column: ColumnRef,
    direction: Direction,
}

/// Rows read by [`fetch`].
#[derive(Debug, Default)]
pub(crate) struct Fetched {
    pub(crate) rows: Vec<Vec<Value>>,

    /// Cursor of the next page when rows remain after the last one read
    pub(crate) next: Option<String>,
}

impl Page {
    /// Sets up pagination of a query, adding the page keys to its columns
    /// and ordering.
    ///
    /// Returns `None` when pagination is disabled, when an offset is given,
    /// for counts and when the requested ordering can't be paginated.
    pub(crate) fn plan(
        manifest: &Manifest,
        query: &mut QueryPlan,
        params: &UrlParams,
        config: &Config,
    ) -> Result<Option<Page>> {
        if params.page.disabled || params.offset.is_some() || query.count {
            return Ok(None);
        }
        let model = manifest.model(query.model);

        let mut keys = vec![];
        for sort in query.sort.clone() {
            if sort.prop.is_none() {
                warn!(model = %model.name, key = %sort.key, "pagination disabled: sorting by a foreign key");
                return Ok(None);
            }
            let item = push_column(query, &sort.column, sort.ty);
            keys.push(Key {
                name: sort.key,
                item,
                column: sort.column,
                direction: sort.direction,
            });
        }

        for page_key in &model.page {
            let prop = model.prop(page_key.prop);
            let Some(column) = prop.column() else {
                continue;
            };
            let column = ColumnRef::new(ROOT, column);

            if let Some(existing) = keys.iter().find(|key| key.column == column) {
                if existing.direction != page_key.direction {
                    warn!(
                        model = %model.name,
                        key = %prop.place,
                        "pagination disabled: sort direction conflicts with the page key"
                    );
                    return Ok(None);
                }
                continue;
            }

            let ty = prop.dtype.storage().unwrap_or(Type::String);
            let item = push_column(query, &column, ty);
            query
                .select
                .order_by
                .push(OrderBy::new(column.clone(), page_key.direction));
            keys.push(Key {
                name: prop.place.clone(),
                item,
                column,
                direction: page_key.direction,
            });
        }

        let size = params.page.size.unwrap_or(config.page_size);
        if size == 0 {
            return Err(Error::new(ErrorCode::InvalidValue).with("reason", "page size must be positive"));
        }

        let mut page = Page {
            model: model.name.clone(),
            keys,
            size,
            prior: None,
        };
        if let Some(cursor) = &params.page.cursor {
            page.prior = Some(page.decode(cursor)?);
        }
        Ok(Some(page))
    }

    fn decode(&self, cursor: &str) -> Result<Vec<Value>> {
        let invalid = |reason: &str| Error::new(ErrorCode::InvalidPageKey).with("reason", reason);

        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| invalid("not a base64 string"))?;
        let json: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|_| invalid("not a JSON list"))?;
        let Value::List(values) = Value::from_json(json) else {
            return Err(invalid("not a JSON list"));
        };
        if values.len() != self.keys.len() {
            return Err(invalid(&format!(
                "expected {} keys, got {}",
                self.keys.len(),
                values.len()
            )));
        }
        Ok(values)
    }

    fn encode(keys: &[Value]) -> String {
        let json = Value::List(keys.to_vec()).to_json().to_string();
        URL_SAFE_NO_PAD.encode(json)
    }

    fn key_of(&self, row: &[Value]) -> Vec<Value> {
        self.keys
            .iter()
            .map(|key| row.get(key.item).cloned().unwrap_or_default())
            .collect()
    }

    /// Rows ordered after `prior`.
    ///
    /// Ascending keys place nulls last and descending keys place them
    /// first, so a null prior value has nothing after it when ascending
    /// and every non-null value after it when descending.
    fn after(&self, prior: &[Value]) -> Filter {
        let mut alternatives = vec![];
        for (index, key) in self.keys.iter().enumerate() {
            let equal = self.keys[..index].iter().zip(prior).map(|(key, value)| {
                if value.is_null() {
                    Filter::is_null(key.column.clone())
                } else {
                    Filter::eq(key.column.clone(), value.clone())
                }
            });

            let value = &prior[index];
            let column = key.column.clone();
            let beyond = match (key.direction, value.is_null()) {
                (Direction::Asc, false) => Filter::or([
                    Filter::compare(column.clone(), BinaryOp::Gt, value.clone()),
                    Filter::is_null(column),
                ]),
                (Direction::Asc, true) => Filter::Const(false),
                (Direction::Desc, false) => Filter::compare(column, BinaryOp::Lt, value.clone()),
                (Direction::Desc, true) => Filter::is_not_null(column),
            };

            alternatives.push(Filter::and(equal.chain([beyond])));
        }
        Filter::or(alternatives)
    }

    fn describe(&self, keys: &[Value]) -> String {
        self.keys
            .iter()
            .zip(keys)
            .map(|(key, value)| format!("{}={}", key.name, value.to_json()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Reads the rows of a query, window by window when paginated.
///
/// Reading stops when the rows run out or `limit` rows were read; in the
/// latter case the cursor of the last row is returned if more rows remain.
pub(crate) async fn fetch<E: Executor + ?Sized>(
    exec: &mut E,
    query: &QueryPlan,
    page: Option<&Page>,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Fetched> {
    let Some(page) = page else {
        let mut select = query.select.clone();
        if !query.count {
            select.limit = limit;
            select.offset = offset;
        }
        let rows = exec.query(select).await?;
        debug!(rows = rows.len(), "rows fetched");
        return Ok(Fetched { rows, next: None });
    };

    let mut fetched = Fetched::default();
    let mut prior = page.prior.clone();
    let mut first_of_page: Option<Vec<Value>> = None;

    loop {
        let remaining = limit.map(|limit| limit.saturating_sub(fetched.rows.len() as u64));
        let window = remaining.map_or(page.size, |remaining| remaining.min(page.size));

        let mut select = query.select.clone();
        if let Some(prior) = &prior {
            if !prior.iter().all(Value::is_null) {
                select.and_filter(page.after(prior));
            }
        }
        select.limit = Some(window + 1);

        let mut rows = exec.query(select).await?;
        debug!(model = %page.model, rows = rows.len(), window, "page fetched");

        let more = rows.len() as u64 > window;
        let following = more.then(|| page.key_of(&rows[window as usize]));
        rows.truncate(window as usize);

        let Some(last) = rows.last() else {
            return Ok(fetched);
        };
        let last = page.key_of(last);

        let first = page.key_of(&rows[0]);
        if first_of_page.as_ref() == Some(&first) {
            return Err(Error::new(ErrorCode::InfiniteLoopWithPagination).with("model", &page.model));
        }
        first_of_page = Some(first);

        // The next window starts after `last` and would skip rows sharing
        // its keys.
        if following.as_ref() == Some(&last) {
            return Err(Error::new(ErrorCode::TooShortPageSize)
                .with("size", page.size)
                .with("key", page.describe(&last)));
        }

        fetched.rows.extend(rows);
        if !more {
            return Ok(fetched);
        }
        if remaining == Some(window) {
            fetched.next = Some(Page::encode(&last));
            return Ok(fetched);
        }
        prior = Some(last);
    }
}

fn push_column(query: &mut QueryPlan, column: &ColumnRef, ty: Type) -> usize {
    match query.select.position(column) {
        Some(item) => item,
        None => query
            .select
            .push_column(SelectColumn::Column(column.clone(), ty)),
    }
}
