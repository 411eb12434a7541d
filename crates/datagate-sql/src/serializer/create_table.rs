use super::{Comma, Flavor, Formatter, Ident, Params, ToSql};

use datagate_core::schema::db::{Column, Table};

impl ToSql for &Table {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, "CREATE TABLE " Ident(&self.name) " (" Comma(&self.columns));

        // SQLite declares the auto increment key inline
        let inline_pk = f.serializer.is_sqlite() && self.columns.iter().any(|c| c.auto_increment);
        if !inline_pk {
            fmt!(f, ", PRIMARY KEY (" Comma(self.primary_key.iter().map(Ident)) ")");
        }

        for unique in &self.unique {
            fmt!(f, ", UNIQUE (" Comma(unique.iter().map(Ident)) ")");
        }

        for fk in &self.foreign_keys {
            fmt!(
                f,
                ", FOREIGN KEY (" Comma(fk.columns.iter().map(Ident)) ") REFERENCES "
                Ident(&fk.table) " (" Comma(fk.references.iter().map(Ident)) ")"
            );
        }

        fmt!(f, ")");
    }
}

impl ToSql for &Column {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        fmt!(f, Ident(&self.name) " ");

        match (self.auto_increment, f.serializer.flavor) {
            (true, Flavor::Sqlite) => {
                fmt!(f, "INTEGER PRIMARY KEY AUTOINCREMENT");
                return;
            }
            (true, Flavor::Postgresql) => fmt!(f, "BIGSERIAL"),
            (false, _) => fmt!(f, self.ty),
        }

        if !self.nullable {
            fmt!(f, " NOT NULL");
        }
    }
}
