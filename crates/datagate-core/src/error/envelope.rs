use super::{domain, Error, ErrorKind};
use indexmap::IndexMap;
use serde::Serialize;

/// Serializable error description sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// What the error is about: `property`, `model` or `system`.
    #[serde(rename = "type")]
    pub ty: &'static str,

    /// The stable error code.
    pub code: String,

    /// Domain identifiers.
    pub context: IndexMap<String, String>,

    /// Message template with `{name}` placeholders.
    pub template: String,

    /// The rendered message.
    pub message: String,
}

impl Error {
    /// Describes the error for a response body.
    ///
    /// Aggregated errors are expanded with [`Error::envelopes`].
    pub fn envelope(&self) -> Envelope {
        match self.kind() {
            ErrorKind::Domain(err) => {
                let ty = if err.context.contains_key("property") {
                    "property"
                } else if err.context.contains_key("model") {
                    "model"
                } else {
                    "system"
                };

                Envelope {
                    ty,
                    code: err.code.name().to_string(),
                    context: err.context.clone(),
                    template: err.code.template().to_string(),
                    message: err.message(),
                }
            }
            ErrorKind::Multiple(multiple) => {
                let mut context = IndexMap::new();
                context.insert("count".to_string(), multiple.errors.len().to_string());
                let template = super::ErrorCode::MultipleErrors.template();

                Envelope {
                    ty: "system",
                    code: super::ErrorCode::MultipleErrors.name().to_string(),
                    message: domain::render(template, &context),
                    template: template.to_string(),
                    context,
                }
            }
            _ => match self.inner.as_ref().and_then(|inner| inner.cause.as_ref()) {
                Some(cause) if cause.code().is_some() => cause.envelope(),
                _ => Envelope {
                    ty: "system",
                    code: "InternalError".to_string(),
                    context: IndexMap::new(),
                    template: "{message}".to_string(),
                    message: self.to_string(),
                },
            },
        }
    }

    /// One envelope per error, expanding aggregated errors.
    pub fn envelopes(&self) -> Vec<Envelope> {
        match self.kind() {
            ErrorKind::Multiple(multiple) => {
                multiple.errors.iter().map(Error::envelope).collect()
            }
            _ => vec![self.envelope()],
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, ErrorCode};
    use pretty_assertions::assert_eq;

    #[test]
    fn property_envelope() {
        let err = Error::new(ErrorCode::FieldNotInResource)
            .with("model", "City")
            .with("property", "size");
        let envelope = err.envelope();

        assert_eq!(envelope.ty, "property");
        assert_eq!(envelope.code, "FieldNotInResource");
        assert_eq!(
            envelope.message,
            "Unknown property \"size\" of model \"City\"."
        );
        assert_eq!(
            serde_json::to_value(&envelope).unwrap()["template"],
            "Unknown property {property:?} of model {model:?}."
        );
    }

    #[test]
    fn multiple_envelopes() {
        let err = Error::multiple(vec![
            Error::new(ErrorCode::UniqueConstraint).with("model", "City"),
            Error::new(ErrorCode::InvalidValue).with("reason", "bad"),
        ]);
        assert_eq!(err.envelope().message, "Multiple errors: 2.");
        let codes: Vec<_> = err.envelopes().into_iter().map(|e| e.code).collect();
        assert_eq!(codes, ["UniqueConstraint", "InvalidValue"]);
    }
}
