//! Redirects of moved rows.
//!
//! Moving row `A` onto `B` deletes `A` and records `A -> B` in the model's
//! redirect table. Reads and writes addressing `A` follow the redirect.
//! Earlier redirects pointing at `A` are repointed at `B` so that chains
//! never form.

use crate::transaction::Executor;

use datagate_core::{
    schema::{db, Model},
    stmt::{ColumnRef, Delete, Filter, Insert, Select, SelectColumn, Type, Update, Value},
    Result,
};
use tracing::debug;

/// The id a moved row now lives under.
pub(crate) async fn lookup<E: Executor + ?Sized>(exec: &mut E, model: &Model, id: &str) -> Result<Option<String>> {
    let mut select = Select::new(db::redirect_table(&model.table), "t0");
    select.push_column(SelectColumn::Column(ColumnRef::new("t0", "redirect"), Type::String));
    select.filter = Some(Filter::eq(ColumnRef::new("t0", "_id"), id));
    select.limit = Some(1);

    let rows = exec.query(select).await?;
    Ok(rows
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .and_then(|value| match value {
            Value::String(target) => Some(target),
            _ => None,
        }))
}

/// Records that `from` now lives under `to`.
pub(crate) async fn record<E: Executor + ?Sized>(exec: &mut E, model: &Model, from: &str, to: &str) -> Result<()> {
    let table = db::redirect_table(&model.table);

    exec.exec(
        Update {
            table: table.clone(),
            assignments: vec![("redirect".to_string(), Value::from(to))],
            filter: Filter::eq(ColumnRef::new("", "redirect"), from),
        }
        .into(),
    )
    .await?;

    // `to` might have been moved away and back again.
    exec.exec(
        Delete {
            table: table.clone(),
            filter: Some(Filter::or([
                Filter::eq(ColumnRef::new("", "_id"), from),
                Filter::eq(ColumnRef::new("", "_id"), to),
            ])),
        }
        .into(),
    )
    .await?;

    let mut insert = Insert::new(table);
    insert.set("_id", from);
    insert.set("redirect", to);
    exec.exec(insert.into()).await?;

    debug!(model = %model.name, from, to, "redirect recorded");
    Ok(())
}

/// Every table holding rows of a model, referrers first.
pub(crate) fn tables(model: &Model) -> [String; 3] {
    [
        db::redirect_table(&model.table),
        db::changelog_table(&model.table),
        model.table.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{transaction::Conn, Memory};
    use datagate_core::{
        schema::{ModelDef, PropDef},
        Driver, Manifest,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn moves_never_chain() {
        let manifest = Manifest::builder()
            .model(ModelDef::new("City").prop(PropDef::new("name", "string")))
            .build()
            .unwrap();
        let memory = Memory::new();
        memory.reset_db(&manifest.db).await.unwrap();
        let manifest = Arc::new(manifest);
        let model = manifest.get_model("City").unwrap();

        let mut conn = Conn::new(manifest.clone(), memory.connect().await.unwrap());
        record(&mut conn, model, "a", "b").await.unwrap();
        record(&mut conn, model, "b", "c").await.unwrap();

        assert_eq!(lookup(&mut conn, model, "a").await.unwrap().as_deref(), Some("c"));
        assert_eq!(lookup(&mut conn, model, "b").await.unwrap().as_deref(), Some("c"));
        assert_eq!(lookup(&mut conn, model, "c").await.unwrap(), None);

        // Moving back removes the redirect of the target.
        record(&mut conn, model, "c", "a").await.unwrap();
        assert_eq!(lookup(&mut conn, model, "a").await.unwrap(), None);
        assert_eq!(lookup(&mut conn, model, "b").await.unwrap().as_deref(), Some("a"));
    }
}
