use super::{stage, DataItem, ItemStream, State, WriteContext};
use crate::Action;

use datagate_core::{
    schema::{DataType, Manifest, Property, ID, REVISION},
    stmt::Value,
    Result,
};
use std::sync::Arc;

/// Encodes a patch into storage columns: refs spread over their key
/// columns, files over id and content, enums are stored by their prepared
/// value.
pub(super) fn prepare(wcx: Arc<WriteContext>, items: ItemStream) -> ItemStream {
    stage!(items, State::Prepared, |item| prepare_item(&wcx.cx.manifest, &mut item))
}

fn prepare_item(manifest: &Manifest, item: &mut DataItem) -> Result<()> {
    let model = manifest.model(item.model_id()?);
    let mut columns = vec![];

    if item.action == Action::Insert {
        columns.push((ID.to_string(), Value::from(item.id.clone())));
    }
    if !item.noop && matches!(item.action, Action::Insert | Action::Update | Action::Patch) {
        columns.push((REVISION.to_string(), Value::from(item.revision.clone())));
    }

    for (place, value) in &item.patch {
        let Some(prop) = model.flatprop(place) else {
            datagate_core::bail!("patch of {} names unknown property {place}", model.name);
        };
        encode(manifest, prop, value, &mut columns);
    }

    item.columns = columns;
    Ok(())
}

fn encode(manifest: &Manifest, prop: &Property, value: &Value, columns: &mut Vec<(String, Value)>) {
    match &prop.dtype {
        DataType::Ref(reference) => {
            let target = manifest.model(reference.model);
            for (column, refprop) in prop.columns.iter().zip(&reference.refprops) {
                let name = &target.prop(*refprop).name;
                let value = value.get(name).cloned().unwrap_or_default();
                columns.push((column.clone(), value));
            }
        }
        DataType::File => {
            for (column, key) in prop.columns.iter().zip(["_id", "_content"]) {
                columns.push((column.clone(), value.get(key).cloned().unwrap_or_default()));
            }
        }
        _ => {
            let value = match prop.enum_prepare(value) {
                Some(prepared) if prop.is_enum() => prepared.clone(),
                _ => value.clone(),
            };
            for column in &prop.columns {
                columns.push((column.clone(), value.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{
        object,
        schema::{ModelDef, PropDef},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn refs_files_and_enums() {
        let manifest = Manifest::builder()
            .model(ModelDef::new("Country").prop(PropDef::new("code", "string")))
            .model(
                ModelDef::new("City")
                    .prop(PropDef::new("status", "string").enum_item("open", 1))
                    .prop(PropDef::new("flag", "file"))
                    .prop(PropDef::reference("country", "Country")),
            )
            .build()
            .unwrap();
        let city = manifest.get_model("City").unwrap();

        let mut columns = vec![];
        let status = city.property("status").unwrap();
        encode(&manifest, status, &Value::from("open"), &mut columns);
        let flag = city.property("flag").unwrap();
        encode(
            &manifest,
            flag,
            &object! { "_id" => "flag.png", "_content" => Value::Bytes(vec![1]) },
            &mut columns,
        );
        let country = city.property("country").unwrap();
        encode(&manifest, country, &object! { "_id" => "lt" }, &mut columns);
        encode(&manifest, country, &Value::Null, &mut columns);

        assert_eq!(
            columns,
            [
                ("status".to_string(), Value::from(1)),
                ("flag._id".to_string(), Value::from("flag.png")),
                ("flag._content".to_string(), Value::Bytes(vec![1])),
                ("country._id".to_string(), Value::from("lt")),
                ("country._id".to_string(), Value::Null),
            ]
        );
    }
}
