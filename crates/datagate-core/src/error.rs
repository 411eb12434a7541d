mod adhoc;
mod code;
mod domain;
mod envelope;
mod integrity;
mod multiple;

pub use code::{ErrorCode, ErrorGroup};
pub use envelope::Envelope;
pub use integrity::Integrity;

use adhoc::AdhocError;
use domain::DomainError;
use multiple::MultipleErrors;
use std::sync::Arc;

/// Returns early with an ad-hoc error built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::from_args(format_args!($($arg)*)))
    };
}

/// Builds an ad-hoc error from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::from_args(format_args!($($arg)*))
    };
}

/// An error raised anywhere in the gateway.
///
/// Domain errors carry an [`ErrorCode`] from the closed taxonomy plus a map of
/// domain identifiers. The request handler is the single place where errors
/// are turned into HTTP statuses (see [`Error::status`]) and envelopes (see
/// [`Error::envelope`]).
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    Domain(DomainError),
    Integrity(Integrity),
    Multiple(MultipleErrors),
    Unknown,
}

impl Error {
    /// Creates a domain error with an empty context.
    pub fn new(code: ErrorCode) -> Error {
        Error::from(ErrorKind::Domain(DomainError::new(code)))
    }

    /// Adds a domain identifier to the error context.
    ///
    /// Only domain errors carry a context; on other kinds this is a no-op.
    pub fn with(mut self, key: &str, value: impl ToString) -> Error {
        if let Some(inner) = self.inner.as_mut().and_then(Arc::get_mut) {
            if let ErrorKind::Domain(domain) = &mut inner.kind {
                domain.context.insert(key.to_string(), value.to_string());
            }
        }
        self
    }

    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context
    /// is shown first, followed by earlier context, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let mut err = consequent;
        if err.inner.is_none() {
            err = Error::from(ErrorKind::Unknown);
        }
        if let Some(inner) = err.inner.as_mut().and_then(Arc::get_mut) {
            if inner.cause.is_none() {
                inner.cause = Some(self);
            }
        }
        err
    }

    pub fn from_args(args: core::fmt::Arguments<'_>) -> Error {
        Error::from(ErrorKind::Adhoc(AdhocError::new(args)))
    }

    /// Reports an integrity violation detected by a backend.
    pub fn integrity(violation: Integrity) -> Error {
        Error::from(ErrorKind::Integrity(violation))
    }

    /// Aggregates several errors collected from a write stream.
    pub fn multiple(errors: Vec<Error>) -> Error {
        Error::from(ErrorKind::Multiple(MultipleErrors { errors }))
    }

    /// The taxonomy code of the outermost error in the chain.
    ///
    /// Errors that are not part of the taxonomy (ad-hoc, bridged) report
    /// `None`; the request handler treats those as internal errors.
    pub fn code(&self) -> Option<ErrorCode> {
        match self.kind() {
            ErrorKind::Domain(err) => Some(err.code),
            ErrorKind::Multiple(_) => Some(ErrorCode::MultipleErrors),
            _ => self
                .inner
                .as_ref()
                .and_then(|inner| inner.cause.as_ref())
                .and_then(Error::code),
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == Some(code)
    }

    pub fn as_integrity(&self) -> Option<&Integrity> {
        self.chain().find_map(|err| match err.kind() {
            ErrorKind::Integrity(violation) => Some(violation),
            _ => None,
        })
    }

    /// Errors aggregated by [`Error::multiple`].
    pub fn errors(&self) -> &[Error] {
        match self.kind() {
            ErrorKind::Multiple(multiple) => &multiple.errors,
            _ => &[],
        }
    }

    /// Domain identifiers recorded on the error.
    pub fn context_map(&self) -> Option<&indexmap::IndexMap<String, String>> {
        match self.kind() {
            ErrorKind::Domain(err) => Some(&err.context),
            _ => None,
        }
    }

    /// HTTP status derived from the error's taxonomy group.
    pub fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Multiple(multiple) => multiple
                .errors
                .first()
                .map(Error::status)
                .unwrap_or(400),
            _ => self.code().map(ErrorCode::status).unwrap_or(500),
        }
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            Domain(err) => core::fmt::Display::fmt(err, f),
            Integrity(err) => core::fmt::Display::fmt(err, f),
            Multiple(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown datagate error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Error {
        Error::new(code)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::new(ErrorCode::JSONError).with("error", err)
    }
}

/// Trait for types that can be converted into an Error.
pub trait IntoError {
    /// Converts this type into an Error.
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}

impl IntoError for ErrorCode {
    fn into_error(self) -> Error {
        Error::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn error_from_args() {
        let err = Error::from_args(format_args!("test error: {}", 42));
        assert_eq!(err.to_string(), "test error: 42");
        assert_eq!(err.code(), None);
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn domain_error_message() {
        let err = Error::new(ErrorCode::ModelNotFound).with("model", "datasets/gov/City");
        assert_eq!(err.to_string(), "Model \"datasets/gov/City\" not found.");
        assert_eq!(err.status(), 404);
        assert!(err.is(ErrorCode::ModelNotFound));
    }

    #[test]
    fn missing_context_keeps_placeholder() {
        let err = Error::new(ErrorCode::ModelNotFound);
        assert_eq!(err.to_string(), "Model \"{model}\" not found.");
    }

    #[test]
    fn error_chain_display() {
        let err = Error::new(ErrorCode::ItemDoesNotExist)
            .with("model", "City")
            .with("id", "abc")
            .context(err!("reading existing row"));

        assert_eq!(
            err.to_string(),
            "reading existing row: Resource \"abc\" of model \"City\" does not exist."
        );
        // the code is found through the cause chain
        assert_eq!(err.code(), Some(ErrorCode::ItemDoesNotExist));
    }

    #[test]
    fn multiple_errors_status_follows_first() {
        let err = Error::multiple(vec![
            Error::new(ErrorCode::UniqueConstraint),
            Error::new(ErrorCode::ReferencedObjectNotFound),
        ]);
        assert_eq!(err.code(), Some(ErrorCode::MultipleErrors));
        assert_eq!(err.status(), 409);
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn integrity_is_found_in_chain() {
        let err = Error::integrity(Integrity::ForeignKey {
            table: "City".into(),
        })
        .context(err!("insert failed"));
        assert!(matches!(
            err.as_integrity(),
            Some(Integrity::ForeignKey { .. })
        ));
    }

    #[test]
    fn anyhow_bridge() {
        let anyhow_err = anyhow::anyhow!("something failed");
        let our_err: Error = anyhow_err.into();
        assert_eq!(our_err.to_string(), "something failed");
    }

    #[test]
    fn json_error_bridge() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.is(ErrorCode::JSONError));
        assert_eq!(err.status(), 400);
    }
}
