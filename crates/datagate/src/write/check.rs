use super::{stage, DataItem, ItemStream, State, WriteContext};
use crate::Action;

use datagate_core::{Error, ErrorCode, Result};
use std::sync::Arc;
use tracing::debug;

/// Reserved fields a payload may carry.
const RESERVED: &[&str] = &["_type", "_op", "_where", "_id", "_revision"];

/// Structural checks that need no stored data: known fields, managed
/// fields, id format and permissions.
pub(super) fn check(wcx: Arc<WriteContext>, items: ItemStream) -> ItemStream {
    stage!(items, State::Checked, |item| check_item(&wcx, &item))
}

fn check_item(wcx: &WriteContext, item: &DataItem) -> Result<()> {
    let manifest = &wcx.cx.manifest;
    let model = manifest.model(item.model_id()?);

    for key in item.payload.keys() {
        let known = if key.starts_with('_') {
            RESERVED.contains(&key.as_str())
        } else {
            model.property(key).is_some()
        };
        if !known {
            return Err(Error::new(ErrorCode::FieldNotInResource)
                .with("property", key)
                .with("model", &model.name));
        }
    }

    if item.action == Action::Insert && item.payload.contains_key("_revision") {
        return Err(Error::new(ErrorCode::ManagedProperty).with("property", "_revision"));
    }

    let id_format = wcx.cx.capability.id_format;
    for id in [&item.id, &item.target].into_iter().flatten() {
        if !id_format.is_valid(id) {
            return Err(Error::new(ErrorCode::InvalidValue)
                .with("reason", format!("{id:?} is not a valid id")));
        }
    }

    match item.action {
        Action::Insert => {}
        Action::Move if item.target.is_none() => {
            return Err(Error::new(ErrorCode::InvalidValue)
                .with("reason", "move needs the _id of the target row"))
        }
        _ if item.id.is_none() && item.filter.is_none() => {
            return Err(Error::new(ErrorCode::InvalidValue)
                .with("reason", format!("{} needs an _id or _where", item.action)))
        }
        _ => {}
    }

    let gate = &wcx.cx.gate;
    gate.authorize_model(model, item.action)?;
    for key in item.payload.keys().filter(|key| !key.starts_with('_')) {
        if let Some(prop) = model.property(key) {
            gate.authorize_prop(model, prop, item.action)?;
        }
    }

    debug!(index = item.index, model = %model.name, action = %item.action, "item checked");
    Ok(())
}
