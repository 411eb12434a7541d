use super::{Comma, Formatter, Ident, Params, ToSql};

use datagate_core::stmt::{self, Direction, Nulls, SelectColumn, Statement};

impl ToSql for &Statement {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self {
            Statement::Select(stmt) => stmt.to_sql(f),
            Statement::Insert(stmt) => stmt.to_sql(f),
            Statement::Update(stmt) => stmt.to_sql(f),
            Statement::Delete(stmt) => stmt.to_sql(f),
        }
    }
}

impl ToSql for &stmt::Select {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let columns = Comma(&self.columns);
        let source = &self.source;
        fmt!(f, "SELECT " columns " FROM " source);

        for join in &self.joins {
            let table = &join.table;
            fmt!(f, " LEFT JOIN " table " ON ");
            let mut s = "";
            for (lhs, rhs) in &join.on {
                fmt!(f, s lhs " = " rhs);
                s = " AND ";
            }
        }

        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }

        if !self.order_by.is_empty() {
            fmt!(f, " ORDER BY " Comma(&self.order_by));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => fmt!(f, " LIMIT " limit " OFFSET " offset),
            (Some(limit), None) => fmt!(f, " LIMIT " limit),
            (None, Some(offset)) if f.serializer.is_sqlite() => {
                fmt!(f, " LIMIT -1 OFFSET " offset)
            }
            (None, Some(offset)) => fmt!(f, " OFFSET " offset),
            (None, None) => {}
        }
    }
}

impl ToSql for &stmt::TableRef {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, Ident(&self.table) " AS " Ident(&self.alias));
    }
}

impl ToSql for &SelectColumn {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self {
            SelectColumn::Column(column, _) => column.to_sql(f),
            SelectColumn::Const(value) => value.to_sql(f),
            SelectColumn::Count => fmt!(f, "COUNT(*)"),
        }
    }
}

impl ToSql for &stmt::OrderBy {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let direction = match self.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        };
        let nulls = match self.nulls {
            Nulls::First => " NULLS FIRST",
            Nulls::Last => " NULLS LAST",
        };
        fmt!(f, &self.column direction nulls);
    }
}

impl ToSql for &stmt::Insert {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let columns = Comma(self.columns.iter().map(Ident));
        let values = Comma(&self.values);
        fmt!(f, "INSERT INTO " Ident(&self.table) " (" columns ") VALUES (" values ")");
    }
}

impl ToSql for &stmt::Update {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, "UPDATE " Ident(&self.table) " SET ");
        let mut s = "";
        for (column, value) in &self.assignments {
            fmt!(f, s Ident(column) " = " value);
            s = ", ";
        }
        let filter = &self.filter;
        fmt!(f, " WHERE " filter);
    }
}

impl ToSql for &stmt::Delete {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, "DELETE FROM " Ident(&self.table));
        if let Some(filter) = &self.filter {
            fmt!(f, " WHERE " filter);
        }
    }
}
