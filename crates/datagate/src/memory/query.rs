use super::store::Store;

use datagate_core::{
    schema::db::Table,
    stmt::{ColumnRef, Filter, Like, Nulls, OrderBy, Select, SelectColumn, Value},
    Result,
};
use std::cmp::Ordering;

/// One row of a joined query: a slot per table in `FROM` / `JOIN` order.
/// `None` is the null row of an unmatched left join.
pub(super) struct Frame<'a> {
    slots: Vec<Slot<'a>>,
}

struct Slot<'a> {
    alias: &'a str,
    table: &'a Table,
    row: Option<&'a [Value]>,
}

impl<'a> Frame<'a> {
    /// A frame over a single table row. Columns match with any alias.
    pub(super) fn single(table: &'a Table, row: &'a [Value]) -> Frame<'a> {
        Frame {
            slots: vec![Slot {
                alias: "",
                table,
                row: Some(row),
            }],
        }
    }

    fn value(&self, column: &ColumnRef) -> Result<Value> {
        let slot = if column.alias.is_empty() || self.slots.len() == 1 {
            self.slots.first()
        } else {
            self.slots.iter().find(|slot| slot.alias == column.alias)
        };
        let Some(slot) = slot else {
            datagate_core::bail!("unknown table alias {:?}", column.alias);
        };
        let Some(index) = slot.table.column_index(&column.column) else {
            datagate_core::bail!("table {} has no column {}", slot.table.name, column.column);
        };

        let value = match slot.row {
            Some(row) => row[index].clone(),
            None => Value::Null,
        };
        Ok(match &column.key {
            Some(key) => value.get(key).cloned().unwrap_or_default(),
            None => value,
        })
    }
}

pub(super) fn select(store: &Store, select: &Select) -> Result<Vec<Value>> {
    let source = store.table(&select.source.table)?;
    let mut frames: Vec<Frame<'_>> = source
        .rows
        .iter()
        .map(|row| Frame {
            slots: vec![Slot {
                alias: &select.source.alias,
                table: &source.schema,
                row: Some(row),
            }],
        })
        .collect();

    for join in &select.joins {
        let data = store.table(&join.table.table)?;
        let mut joined = vec![];
        for frame in frames {
            let mut matches = vec![];
            for row in &data.rows {
                let candidate = Frame::single(&data.schema, row);
                let mut all = true;
                for (left, right) in &join.on {
                    if !frame.value(left)?.sql_eq(&candidate.value(right)?) {
                        all = false;
                        break;
                    }
                }
                if all {
                    matches.push(row.as_slice());
                }
            }
            if matches.is_empty() {
                matches.push(&[]);
            }
            for row in matches {
                let mut slots: Vec<Slot<'_>> = frame
                    .slots
                    .iter()
                    .map(|slot| Slot {
                        alias: slot.alias,
                        table: slot.table,
                        row: slot.row,
                    })
                    .collect();
                slots.push(Slot {
                    alias: &join.table.alias,
                    table: &data.schema,
                    row: (!row.is_empty()).then_some(row),
                });
                joined.push(Frame { slots });
            }
        }
        frames = joined;
    }

    let mut kept = vec![];
    for frame in frames {
        let keep = match &select.filter {
            Some(filter) => eval(&frame, filter)?.unwrap_or(false),
            None => true,
        };
        if keep {
            kept.push(frame);
        }
    }

    if select.is_count() {
        let row = select
            .columns
            .iter()
            .map(|column| match column {
                SelectColumn::Count => Ok(Value::Integer(kept.len() as i64)),
                SelectColumn::Const(value) => Ok(value.clone()),
                SelectColumn::Column(column, _) => match kept.first() {
                    Some(frame) => frame.value(column),
                    None => Ok(Value::Null),
                },
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(vec![Value::List(row)]);
    }

    let mut keyed = vec![];
    for frame in kept {
        let key = select
            .order_by
            .iter()
            .map(|order| frame.value(&order.column))
            .collect::<Result<Vec<_>>>()?;
        keyed.push((key, frame));
    }
    keyed.sort_by(|(lhs, _), (rhs, _)| compare_keys(&select.order_by, lhs, rhs));

    let offset = select.offset.unwrap_or(0) as usize;
    let limit = select.limit.map(|limit| limit as usize).unwrap_or(usize::MAX);

    keyed
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(_, frame)| {
            let row = select
                .columns
                .iter()
                .map(|column| match column {
                    SelectColumn::Column(column, _) => frame.value(column),
                    SelectColumn::Const(value) => Ok(value.clone()),
                    SelectColumn::Count => Ok(Value::Null),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(row))
        })
        .collect()
}

fn compare_keys(order_by: &[OrderBy], lhs: &[Value], rhs: &[Value]) -> Ordering {
    for ((order, lhs), rhs) in order_by.iter().zip(lhs).zip(rhs) {
        let ordering = match (lhs.is_null(), rhs.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match order.nulls {
                Nulls::First => Ordering::Less,
                Nulls::Last => Ordering::Greater,
            },
            (false, true) => match order.nulls {
                Nulls::First => Ordering::Greater,
                Nulls::Last => Ordering::Less,
            },
            (false, false) => {
                let ordering = lhs.sort_cmp(rhs);
                if order.direction.is_asc() {
                    ordering
                } else {
                    ordering.reverse()
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Evaluates a filter with SQL three-valued logic; `None` is unknown.
pub(super) fn eval(frame: &Frame<'_>, filter: &Filter) -> Result<Option<bool>> {
    Ok(match filter {
        Filter::And(operands) => {
            let mut result = Some(true);
            for operand in operands {
                match eval(frame, operand)? {
                    Some(false) => return Ok(Some(false)),
                    None => result = None,
                    Some(true) => {}
                }
            }
            result
        }
        Filter::Or(operands) => {
            let mut result = Some(false);
            for operand in operands {
                match eval(frame, operand)? {
                    Some(true) => return Ok(Some(true)),
                    None => result = None,
                    Some(false) => {}
                }
            }
            result
        }
        Filter::Not(operand) => eval(frame, operand)?.map(|value| !value),
        Filter::BinaryOp { column, op, value } => {
            use datagate_core::stmt::BinaryOp::*;

            let ordering = frame.value(column)?.sql_cmp(value);
            ordering.map(|ordering| match op {
                Eq => ordering == Ordering::Equal,
                Ne => ordering != Ordering::Equal,
                Lt => ordering == Ordering::Less,
                Le => ordering != Ordering::Greater,
                Gt => ordering == Ordering::Greater,
                Ge => ordering != Ordering::Less,
            })
        }
        Filter::IsNull { column, negate } => Some(frame.value(column)?.is_null() != *negate),
        Filter::InList { column, values } => {
            let value = frame.value(column)?;
            if value.is_null() {
                None
            } else {
                Some(values.iter().any(|candidate| value.sql_eq(candidate)))
            }
        }
        Filter::Like {
            column,
            like,
            value: pattern,
        } => match frame.value(column)? {
            Value::String(value) => {
                let value = value.to_ascii_lowercase();
                let pattern = pattern.to_ascii_lowercase();
                Some(match like {
                    Like::Contains => value.contains(&pattern),
                    Like::StartsWith => value.starts_with(&pattern),
                })
            }
            Value::Null => None,
            _ => Some(false),
        },
        Filter::Const(value) => Some(*value),
    })
}
