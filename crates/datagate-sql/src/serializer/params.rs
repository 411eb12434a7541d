use super::{Flavor, Formatter, ToSql};

use datagate_core::stmt;

pub trait Params {
    fn push(&mut self, param: &stmt::Value) -> Placeholder;
}

pub struct Placeholder(pub usize);

impl Params for Vec<stmt::Value> {
    fn push(&mut self, value: &stmt::Value) -> Placeholder {
        self.push(value.clone());
        Placeholder(self.len())
    }
}

impl ToSql for Placeholder {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match f.serializer.flavor {
            Flavor::Postgresql => f.dst.push('$'),
            Flavor::Sqlite => f.dst.push('?'),
        }
        f.dst.push_str(&self.0.to_string());
    }
}
