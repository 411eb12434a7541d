use super::{Comma, Delimited, Flavor, Formatter, Params, ToSql};

use datagate_core::stmt::{self, Filter, Like};

impl ToSql for &Filter {
    fn to_sql<P: Params>(self, f: &mut Formatter<'_, P>) {
        match self {
            Filter::And(operands) => {
                fmt!(f, "(" Delimited(operands, " AND ") ")");
            }
            Filter::Or(operands) => {
                fmt!(f, "(" Delimited(operands, " OR ") ")");
            }
            Filter::Not(operand) => {
                let operand: &Filter = operand;
                fmt!(f, "NOT (" operand ")");
            }
            Filter::BinaryOp { column, op, value } => {
                fmt!(f, column " " op.as_str() " " value);
            }
            Filter::IsNull { column, negate } => {
                if *negate {
                    fmt!(f, column " IS NOT NULL");
                } else {
                    fmt!(f, column " IS NULL");
                }
            }
            Filter::InList { values, .. } if values.is_empty() => {
                fmt!(f, "1 = 0");
            }
            Filter::InList { column, values } => {
                fmt!(f, column " IN (" Comma(values) ")");
            }
            Filter::Like {
                column,
                like,
                value,
            } => {
                let escaped = escape_like(value);
                let pattern = stmt::Value::String(match like {
                    Like::Contains => format!("%{escaped}%"),
                    Like::StartsWith => format!("{escaped}%"),
                });
                let pattern = &pattern;
                match f.serializer.flavor {
                    Flavor::Sqlite => fmt!(f, column " LIKE " pattern " ESCAPE '\\'"),
                    Flavor::Postgresql => fmt!(f, column " ILIKE " pattern),
                }
            }
            Filter::Const(true) => fmt!(f, "1 = 1"),
            Filter::Const(false) => fmt!(f, "1 = 0"),
        }
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
