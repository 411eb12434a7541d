use crate::{Action, Config};

use datagate_core::{
    schema::{Access, Model, Property},
    Error, ErrorCode, Result,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Decides whether the client may run an action on a model or property.
///
/// Scopes are opaque strings carried by the client. An action on a model is
/// granted by any of
///
/// ```text
/// datagate_getall
/// datagate_getall_datasets              (every ancestor namespace)
/// datagate_getall_datasets_gov
/// datagate_getall_datasets_gov_city     (the model itself)
/// ```
///
/// Private models only accept the model scope. A property adds one more
/// scope, `datagate_getall_datasets_gov_city_name`, which is the only one
/// accepted for private properties. Open models and properties can be read
/// without any scope.
#[derive(Debug, Clone)]
pub(crate) struct AccessGate {
    scopes: Arc<HashSet<String>>,
    prefix: String,
    strict: bool,
}

impl AccessGate {
    pub(crate) fn new(scopes: Arc<HashSet<String>>, config: &Config) -> AccessGate {
        AccessGate {
            scopes,
            prefix: config.scope_prefix.clone(),
            strict: config.strict_access,
        }
    }

    /// Explicitly selecting an unreadable property is an error.
    pub(crate) fn is_strict(&self) -> bool {
        self.strict
    }

    pub(crate) fn authorize_model(&self, model: &Model, action: Action) -> Result<()> {
        let Some(verb) = action.scope() else {
            return Err(self.denied(&[action.name()]));
        };

        if self.can_model(model, verb, action) {
            Ok(())
        } else {
            Err(self.denied(&[verb, &model.name]))
        }
    }

    /// Namespace listings and wipes are granted by the general scope or a
    /// scope of the namespace or any of its ancestors.
    pub(crate) fn authorize_ns(&self, ns: &str, action: Action) -> Result<()> {
        let Some(verb) = action.scope() else {
            return Err(self.denied(&[action.name()]));
        };

        let granted = self.has(&[verb])
            || ancestors(ns).any(|ancestor| self.has(&[verb, ancestor]));
        if granted {
            Ok(())
        } else {
            Err(self.denied(&[verb, ns]))
        }
    }

    pub(crate) fn can_prop(&self, model: &Model, prop: &Property, action: Action) -> bool {
        let Some(verb) = action.scope() else {
            return false;
        };

        if prop.access == Access::Open && action.is_read() {
            return true;
        }

        if self.has(&[verb, &model.name, &prop.place]) {
            return true;
        }

        prop.access != Access::Private && self.can_model(model, verb, action)
    }

    pub(crate) fn authorize_prop(&self, model: &Model, prop: &Property, action: Action) -> Result<()> {
        if self.can_prop(model, prop, action) {
            Ok(())
        } else {
            let verb = action.scope().unwrap_or(action.name());
            Err(self.denied(&[verb, &model.name, &prop.place]))
        }
    }

    fn can_model(&self, model: &Model, verb: &str, action: Action) -> bool {
        // The access level of a model is carried by its `_id` property.
        let access = model.id_prop().access;

        if access == Access::Open && action.is_read() {
            return true;
        }

        if self.has(&[verb, &model.name]) {
            return true;
        }

        access != Access::Private
            && (self.has(&[verb]) || ancestors(&model.ns).any(|ns| self.has(&[verb, ns])))
    }

    fn has(&self, parts: &[&str]) -> bool {
        self.scopes.contains(&self.scope_name(parts))
    }

    fn denied(&self, parts: &[&str]) -> Error {
        Error::new(ErrorCode::InsufficientPermission).with("scope", self.scope_name(parts))
    }

    fn scope_name(&self, parts: &[&str]) -> String {
        let mut name = self.prefix.clone();
        for part in parts {
            name.push('_');
            name.extend(part.chars().map(|c| match c {
                '/' | '.' => '_',
                c => c.to_ascii_lowercase(),
            }));
        }
        name
    }
}

/// `a/b/c` yields `a`, `a/b`, `a/b/c`. The root namespace has no ancestors.
fn ancestors(ns: &str) -> impl Iterator<Item = &str> {
    ns.match_indices('/')
        .map(|(end, _)| &ns[..end])
        .chain((!ns.is_empty()).then_some(ns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{
        schema::{ModelDef, PropDef},
        Manifest,
    };
    use pretty_assertions::assert_eq;

    fn manifest() -> Manifest {
        Manifest::builder()
            .model(
                ModelDef::new("datasets/gov/City")
                    .prop(PropDef::new("name", "string"))
                    .prop(PropDef::new("secret", "string").access(Access::Private))
                    .prop(PropDef::new("motto", "string").access(Access::Open)),
            )
            .model(ModelDef::new("datasets/gov/Vault").access(Access::Private))
            .build()
            .unwrap()
    }

    fn gate(scopes: &[&str]) -> AccessGate {
        let scopes = scopes.iter().map(|scope| scope.to_string()).collect();
        AccessGate::new(Arc::new(scopes), &Config::default())
    }

    #[test]
    fn namespace_ancestors() {
        assert_eq!(
            ancestors("datasets/gov/rc").collect::<Vec<_>>(),
            ["datasets", "datasets/gov", "datasets/gov/rc"]
        );
        assert_eq!(ancestors("").count(), 0);
    }

    #[test]
    fn general_namespace_and_model_scopes() {
        let manifest = manifest();
        let city = manifest.get_model("datasets/gov/City").unwrap();

        for scope in [
            "datagate_getall",
            "datagate_getall_datasets",
            "datagate_getall_datasets_gov",
            "datagate_getall_datasets_gov_city",
        ] {
            assert!(gate(&[scope]).authorize_model(city, Action::GetAll).is_ok(), "{scope}");
        }

        let err = gate(&["datagate_insert"])
            .authorize_model(city, Action::GetAll)
            .unwrap_err();
        assert!(err.is(ErrorCode::InsufficientPermission));
        assert_eq!(
            err.context_map().unwrap()["scope"],
            "datagate_getall_datasets_gov_city"
        );
    }

    #[test]
    fn private_model_needs_model_scope() {
        let manifest = manifest();
        let vault = manifest.get_model("datasets/gov/Vault").unwrap();

        assert!(gate(&["datagate_getone"]).authorize_model(vault, Action::GetOne).is_err());
        assert!(gate(&["datagate_getone_datasets_gov_vault"])
            .authorize_model(vault, Action::GetOne)
            .is_ok());
    }

    #[test]
    fn property_access_levels() {
        let manifest = manifest();
        let city = manifest.get_model("datasets/gov/City").unwrap();
        let name = city.property("name").unwrap();
        let secret = city.property("secret").unwrap();
        let motto = city.property("motto").unwrap();

        let reader = gate(&["datagate_search"]);
        assert!(reader.can_prop(city, name, Action::Search));
        assert!(!reader.can_prop(city, secret, Action::Search));
        assert!(gate(&["datagate_search_datasets_gov_city_secret"]).can_prop(
            city,
            secret,
            Action::Search
        ));

        let anonymous = gate(&[]);
        assert!(anonymous.can_prop(city, motto, Action::Search));
        assert!(!anonymous.can_prop(city, motto, Action::Patch));
    }

    #[test]
    fn actions_without_scope_are_denied() {
        let manifest = manifest();
        let city = manifest.get_model("datasets/gov/City").unwrap();
        let err = gate(&["datagate_inspect"])
            .authorize_model(city, Action::Inspect)
            .unwrap_err();
        assert!(err.is(ErrorCode::InsufficientPermission));
    }
}
