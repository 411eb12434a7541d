use super::query::{self, Frame};

use datagate_core::{
    driver::{Operation, Response},
    schema::db::{ForeignKey, Schema, Table},
    stmt::{Delete, Filter, Insert, Update, Value, ValueStream},
    Error, Integrity, Result,
};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub(super) struct Store {
    tables: IndexMap<String, TableData>,
}

#[derive(Debug, Clone)]
pub(super) struct TableData {
    pub(super) schema: Table,
    pub(super) rows: Vec<Vec<Value>>,

    /// Last value handed out for auto-increment columns
    sequence: i64,
}

impl Store {
    pub(super) fn new(schema: &Schema) -> Store {
        Store {
            tables: schema
                .tables
                .iter()
                .map(|table| {
                    let data = TableData {
                        schema: table.clone(),
                        rows: vec![],
                        sequence: 0,
                    };
                    (table.name.clone(), data)
                })
                .collect(),
        }
    }

    pub(super) fn table(&self, name: &str) -> Result<&TableData> {
        self.tables
            .get(name)
            .ok_or_else(|| datagate_core::err!("no such table: {name}"))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableData> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| datagate_core::err!("no such table: {name}"))
    }

    pub(super) fn exec(&mut self, op: Operation) -> Result<Response> {
        match op {
            Operation::Query(select) => {
                let rows = query::select(self, &select)?;
                Ok(Response::value_stream(ValueStream::from_vec(rows)))
            }
            Operation::Insert(insert) => self.insert(insert),
            Operation::Update(update) => self.update(update),
            Operation::Delete(delete) => self.delete(delete),
            Operation::Transaction(op) => {
                datagate_core::bail!("{op:?} must be handled by the connection")
            }
        }
    }

    fn insert(&mut self, insert: Insert) -> Result<Response> {
        let data = self.table_mut(&insert.table)?;
        let mut row = vec![Value::Null; data.schema.columns.len()];

        for (column, value) in insert.columns.iter().zip(insert.values) {
            let Some(index) = data.schema.column_index(column) else {
                datagate_core::bail!("table {} has no column {column}", insert.table);
            };
            row[index] = value;
        }
        for (index, column) in data.schema.columns.iter().enumerate() {
            if column.auto_increment && row[index].is_null() {
                data.sequence += 1;
                row[index] = Value::Integer(data.sequence);
            }
        }

        self.check_row(&insert.table, &row, None)?;
        self.table_mut(&insert.table)?.rows.push(row);
        Ok(Response::count(1))
    }

    fn update(&mut self, update: Update) -> Result<Response> {
        let data = self.table(&update.table)?;
        let matching = matching_rows(data, Some(&update.filter))?;

        let mut assignments = vec![];
        for (column, value) in &update.assignments {
            let Some(index) = data.schema.column_index(column) else {
                datagate_core::bail!("table {} has no column {column}", update.table);
            };
            assignments.push((index, value.clone()));
        }

        let mut rows = data.rows.clone();
        for &position in &matching {
            for (index, value) in &assignments {
                rows[position][*index] = value.clone();
            }
        }

        for &position in &matching {
            self.check_row(&update.table, &rows[position], Some((&rows, position)))?;
            self.check_referrers(&update.table, &data.rows[position], &rows[position], &[])?;
        }

        self.table_mut(&update.table)?.rows = rows;
        Ok(Response::count(matching.len() as u64))
    }

    fn delete(&mut self, delete: Delete) -> Result<Response> {
        let data = self.table(&delete.table)?;
        let matching = matching_rows(data, delete.filter.as_ref())?;

        for &position in &matching {
            self.check_referrers(&delete.table, &data.rows[position], &[], &matching)?;
        }

        let data = self.table_mut(&delete.table)?;
        let mut position = 0;
        data.rows.retain(|_| {
            let keep = !matching.contains(&position);
            position += 1;
            keep
        });
        Ok(Response::count(matching.len() as u64))
    }

    /// Checks primary key, unique and outgoing foreign key constraints of a
    /// new or updated row. `updated` holds the table rows after an update
    /// and the position of the row being checked.
    fn check_row(
        &self,
        table: &str,
        row: &[Value],
        updated: Option<(&Vec<Vec<Value>>, usize)>,
    ) -> Result<()> {
        let data = self.table(table)?;
        let others: Vec<&Vec<Value>> = match updated {
            Some((rows, position)) => rows
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != position)
                .map(|(_, row)| row)
                .collect(),
            None => data.rows.iter().collect(),
        };

        let unique_sets = std::iter::once(&data.schema.primary_key).chain(&data.schema.unique);
        for columns in unique_sets {
            let indexes = column_indexes(&data.schema, columns)?;
            let key: Vec<&Value> = indexes.iter().map(|index| &row[*index]).collect();
            if key.iter().any(|value| value.is_null()) {
                continue;
            }
            let taken = others.iter().any(|other| {
                indexes
                    .iter()
                    .zip(&key)
                    .all(|(index, value)| other[*index].sql_eq(value))
            });
            if taken {
                return Err(Error::integrity(Integrity::Unique {
                    table: table.to_string(),
                    columns: columns.clone(),
                }));
            }
        }

        for fk in &data.schema.foreign_keys {
            let indexes = column_indexes(&data.schema, &fk.columns)?;
            let key: Vec<&Value> = indexes.iter().map(|index| &row[*index]).collect();
            if key.iter().any(|value| value.is_null()) {
                continue;
            }
            if !self.references_exist(fk, &key)? {
                return Err(Error::integrity(Integrity::ForeignKey {
                    table: table.to_string(),
                }));
            }
        }

        Ok(())
    }

    fn references_exist(&self, fk: &ForeignKey, key: &[&Value]) -> Result<bool> {
        let target = self.table(&fk.table)?;
        let indexes = column_indexes(&target.schema, &fk.references)?;
        Ok(target.rows.iter().any(|row| {
            indexes
                .iter()
                .zip(key)
                .all(|(index, value)| row[*index].sql_eq(value))
        }))
    }

    /// Fails when a row of any table still refers to the referenced columns
    /// of `old` after they changed to `new` (empty for deletes). Rows of the
    /// same table at `deleted` positions are ignored.
    fn check_referrers(&self, table: &str, old: &[Value], new: &[Value], deleted: &[usize]) -> Result<()> {
        let target = self.table(table)?;

        for (name, data) in &self.tables {
            for fk in data.schema.foreign_keys.iter().filter(|fk| fk.table == table) {
                let references = column_indexes(&target.schema, &fk.references)?;
                let key: Vec<&Value> = references.iter().map(|index| &old[*index]).collect();
                let unchanged = !new.is_empty()
                    && references.iter().all(|index| new[*index].sql_eq(&old[*index]));
                if unchanged || key.iter().any(|value| value.is_null()) {
                    continue;
                }

                let columns = column_indexes(&data.schema, &fk.columns)?;
                let referred = data.rows.iter().enumerate().any(|(position, row)| {
                    let skipped = name == table && deleted.contains(&position);
                    !skipped
                        && columns
                            .iter()
                            .zip(&key)
                            .all(|(index, value)| row[*index].sql_eq(value))
                });
                if referred {
                    return Err(Error::integrity(Integrity::ForeignKey {
                        table: name.clone(),
                    }));
                }
            }
        }
        Ok(())
    }
}

/// Positions of the rows of a single table matching a filter.
fn matching_rows(data: &TableData, filter: Option<&Filter>) -> Result<Vec<usize>> {
    let mut matching = vec![];
    for (position, row) in data.rows.iter().enumerate() {
        let frame = Frame::single(&data.schema, row);
        let keep = match filter {
            Some(filter) => query::eval(&frame, filter)?.unwrap_or(false),
            None => true,
        };
        if keep {
            matching.push(position);
        }
    }
    Ok(matching)
}

fn column_indexes(table: &Table, columns: &[String]) -> Result<Vec<usize>> {
    columns
        .iter()
        .map(|column| {
            table
                .column_index(column)
                .ok_or_else(|| datagate_core::err!("table {} has no column {column}", table.name))
        })
        .collect()
}
