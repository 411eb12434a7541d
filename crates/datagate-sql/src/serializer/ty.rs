use super::{Flavor, Formatter, Params, ToSql};

use datagate_core::stmt;

impl ToSql for stmt::Type {
    fn to_sql<T: Params>(self, f: &mut Formatter<'_, T>) {
        let sql = match (f.serializer.flavor, self) {
            (_, stmt::Type::Bool) => "BOOLEAN",
            (Flavor::Sqlite, stmt::Type::Integer) => "INTEGER",
            (Flavor::Postgresql, stmt::Type::Integer) => "BIGINT",
            (Flavor::Sqlite, stmt::Type::Number) => "REAL",
            (Flavor::Postgresql, stmt::Type::Number) => "DOUBLE PRECISION",
            (_, stmt::Type::String) => "TEXT",
            (Flavor::Sqlite, stmt::Type::Bytes) => "BLOB",
            (Flavor::Postgresql, stmt::Type::Bytes) => "BYTEA",
            (Flavor::Sqlite, stmt::Type::Json) => "TEXT",
            (Flavor::Postgresql, stmt::Type::Json) => "JSONB",
        };
        f.dst.push_str(sql);
    }
}
