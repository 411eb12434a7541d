use super::{ColumnRef, Filter, OrderBy, Statement, Type, Value};

/// A relational query plan produced by the query builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub source: TableRef,

    /// Left outer joins, in installation order
    pub joins: Vec<Join>,

    pub columns: Vec<SelectColumn>,

    pub filter: Option<Filter>,

    pub order_by: Vec<OrderBy>,

    pub limit: Option<u64>,

    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

/// `LEFT OUTER JOIN table AS alias ON l1 = r1 AND l2 = r2 ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub on: Vec<(ColumnRef, ColumnRef)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Column(ColumnRef, Type),
    Const(Value),
    Count,
}

impl Select {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Select {
        Select {
            source: TableRef {
                table: table.into(),
                alias: alias.into(),
            },
            joins: vec![],
            columns: vec![],
            filter: None,
            order_by: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Adds a column and returns its index in the row.
    pub fn push_column(&mut self, column: SelectColumn) -> usize {
        self.columns.push(column);
        self.columns.len() - 1
    }

    /// Position of an already selected column, if any.
    pub fn position(&self, column: &ColumnRef) -> Option<usize> {
        self.columns.iter().position(|selected| match selected {
            SelectColumn::Column(selected, _) => selected == column,
            _ => false,
        })
    }

    /// ANDs a predicate with the existing filter.
    pub fn and_filter(&mut self, filter: Filter) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => Filter::and([existing, filter]),
            None => filter,
        });
    }

    /// True when the query is an aggregate count.
    pub fn is_count(&self) -> bool {
        self.columns
            .iter()
            .any(|column| matches!(column, SelectColumn::Count))
    }
}

impl From<Select> for Statement {
    fn from(value: Select) -> Self {
        Statement::Select(value)
    }
}
