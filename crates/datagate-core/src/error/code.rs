use std::fmt;

/// Coarse grouping of error codes, used to derive HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorGroup {
    Syntax,
    NotFound,
    Conflict,
    ForeignKey,
    Auth,
    Schema,
    Format,
    Feature,
    Runtime,
    Pagination,
    Capacity,
    Aggregate,
}

macro_rules! error_codes {
    (
        $(
            $code:ident => $group:ident, $status:literal, $template:literal;
        )*
    ) => {
        /// The closed error taxonomy.
        ///
        /// The variant name is the stable `code` reported in error envelopes.
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(clippy::upper_case_acronyms)]
        pub enum ErrorCode {
            $( $code, )*
        }

        impl ErrorCode {
            pub fn name(self) -> &'static str {
                match self {
                    $( ErrorCode::$code => stringify!($code), )*
                }
            }

            pub fn group(self) -> ErrorGroup {
                match self {
                    $( ErrorCode::$code => ErrorGroup::$group, )*
                }
            }

            pub fn status(self) -> u16 {
                match self {
                    $( ErrorCode::$code => $status, )*
                }
            }

            /// A `{name}`-style template; placeholders are filled from the
            /// error context.
            pub fn template(self) -> &'static str {
                match self {
                    $( ErrorCode::$code => $template, )*
                }
            }
        }
    };
}

error_codes! {
    InvalidSyntax => Syntax, 400, "Invalid syntax at position {offset}: {reason}.";
    InvalidValue => Syntax, 400, "Invalid value: {reason}.";
    InvalidName => Syntax, 400, "Invalid name {name:?}.";
    InvalidPageKey => Syntax, 400, "Invalid page key: {reason}.";
    InvalidSortKey => Syntax, 400, "Can't sort by {key:?}, only leaf properties can be used for sorting.";
    UnknownRequestParameter => Syntax, 400, "Unknown request parameter {name:?}.";
    CannotSelectTextAndSpecifiedLang => Syntax, 400, "Can't select {property:?} and a specific language of it in the same query.";

    ModelNotFound => NotFound, 404, "Model {model:?} not found.";
    PropertyNotFound => NotFound, 404, "Property {property:?} not found in model {model:?}.";
    ItemDoesNotExist => NotFound, 404, "Resource {id:?} of model {model:?} does not exist.";
    NamespaceNotFound => NotFound, 404, "Namespace {namespace:?} not found.";

    UniqueConstraint => Conflict, 409, "Given value already exists in {model:?} for property {property:?}.";
    CompositeUniqueConstraint => Conflict, 409, "Given values already exist in {model:?} for properties {properties:?}.";
    MultipleRowsFound => Conflict, 409, "Multiple rows were found in {model:?}.";
    ReferringObjectFound => Conflict, 409, "Resource {id:?} of {model:?} is referred by {referrer:?}.";

    ReferencedObjectNotFound => ForeignKey, 400, "Referenced object {id:?} of {property:?} not found.";

    InsufficientPermission => Auth, 403, "You need to have {scope:?} in order to access this API endpoint.";
    NoAuthServer => Auth, 401, "Authorization server is not configured.";
    ClientValidationError => Auth, 401, "Invalid client credentials.";

    FieldNotInResource => Schema, 400, "Unknown property {property:?} of model {model:?}.";
    MissingRequiredProperty => Schema, 400, "Property {property:?} of model {model:?} is required.";
    ManagedProperty => Schema, 400, "Value of {property:?} is managed automatically and cannot be set manually.";
    InvalidManifestFile => Schema, 400, "Error while parsing manifest: {reason}.";

    UnknownContentType => Format, 415, "Unknown content type {content_type:?}.";
    UnknownOutputFormat => Format, 400, "Unknown output format {name:?}.";
    JSONError => Format, 400, "Invalid JSON: {error}.";

    NotImplementedFeature => Feature, 501, "{feature} is not implemented yet.";
    UnknownBind => Feature, 501, "Unknown bind {name:?}.";
    UnknownMethod => Feature, 501, "Unknown method {name:?} with args {args}.";

    UnableToCast => Runtime, 400, "Unable to cast {value} to {type} type.";
    InvalidBase64String => Runtime, 400, "Invalid base64 string.";
    InvalidArgumentInExpression => Runtime, 400, "Invalid argument {arg} in expression {expr:?}.";

    TooShortPageSize => Pagination, 500, "Page size {size} is too short, all rows of a page have the same key {key}.";
    InfiniteLoopWithPagination => Pagination, 500, "Pagination returned the same first row twice, ordering of {model:?} is not stable.";

    OutOfMemoryMigrate => Capacity, 507, "Not enough memory to migrate {model:?}.";
    FileSizeTooLarge => Capacity, 413, "File size exceeds the limit of {limit} bytes.";

    MultipleErrors => Aggregate, 400, "Multiple errors: {count}.";
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
