//! Storage-level schema: the tables a backend has to provide for a manifest.

use crate::stmt::Type;

#[derive(Debug, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub unique: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ty: Type,
    pub nullable: bool,

    /// The backend assigns increasing integers on insert
    pub auto_increment: bool,
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub table: String,
    pub references: Vec<String>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }
}

impl Column {
    pub fn new(name: impl Into<String>, ty: Type) -> Column {
        Column {
            name: name.into(),
            ty,
            nullable: true,
            auto_increment: false,
        }
    }
}

/// Table journaling the changes of `table`.
pub fn changelog_table(table: &str) -> String {
    format!("{table}/:changelog")
}

/// Table mapping moved ids of `table` to their new ids.
pub fn redirect_table(table: &str) -> String {
    format!("{table}/:redirect")
}

/// Columns of a changelog table, in order.
pub const CHANGELOG_COLUMNS: [&str; 7] =
    ["_cid", "_rid", "_revision", "_op", "_txn", "_created", "data"];

/// Columns of a redirect table, in order.
pub const REDIRECT_COLUMNS: [&str; 2] = ["_id", "redirect"];

pub(crate) fn changelog(table: &str) -> Table {
    let mut cid = Column::new("_cid", Type::Integer);
    cid.nullable = false;
    cid.auto_increment = true;

    let mut columns = vec![cid];
    for name in &CHANGELOG_COLUMNS[1..6] {
        columns.push(Column::new(*name, Type::String));
    }
    columns.push(Column::new("data", Type::Json));

    Table {
        name: changelog_table(table),
        columns,
        primary_key: vec!["_cid".to_string()],
        foreign_keys: vec![],
        unique: vec![],
    }
}

pub(crate) fn redirect(table: &str) -> Table {
    let mut id = Column::new("_id", Type::String);
    id.nullable = false;

    Table {
        name: redirect_table(table),
        columns: vec![id, Column::new("redirect", Type::String)],
        primary_key: vec!["_id".to_string()],
        foreign_keys: vec![],
        unique: vec![],
    }
}
