use super::{Flavor, Formatter, Ident, Params, ToSql};

use datagate_core::stmt::{self, ColumnRef};

impl ToSql for &ColumnRef {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        let column = QualifiedColumn(self);
        match (&self.key, f.serializer.flavor) {
            (None, _) => fmt!(f, column),
            (Some(key), Flavor::Sqlite) => {
                let path = &stmt::Value::String(format!("$.\"{key}\""));
                fmt!(f, "json_extract(" column ", " path ")");
            }
            (Some(key), Flavor::Postgresql) => {
                let key = &stmt::Value::String(key.clone());
                fmt!(f, "(" column " ->> " key ")");
            }
        }
    }
}

/// `"alias"."column"`, or just `"column"` when the statement has no alias.
struct QualifiedColumn<'a>(&'a ColumnRef);

impl ToSql for QualifiedColumn<'_> {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        if !self.0.alias.is_empty() {
            fmt!(f, Ident(&self.0.alias) ".");
        }
        fmt!(f, Ident(&self.0.column));
    }
}
