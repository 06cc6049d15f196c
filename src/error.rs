//! Error taxonomy for the GraphQL layer
//!
//! Every error here is local to a single operation: none of them leave the
//! shared catalog or type registry in a different state than before.

use async_graphql::{ErrorExtensionValues, PathSegment, ServerError};
use thiserror::Error;

/// Unknown names and other schema-shape problems found while compiling types
/// or building a request tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown entity type '{entity}'")]
    UnknownEntity { entity: String },

    #[error("unknown field '{attribute}' on type '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("unknown root field '{field}' on type '{root}'")]
    UnknownRootField { root: String, field: String },

    #[error("entity '{entity}' is defined more than once")]
    DuplicateEntity { entity: String },

    #[error("type '{entity}' has no input fields")]
    NoInputFields { entity: String },

    #[error("invalid type string '{type_string}'")]
    InvalidTypeString { type_string: String },

    #[error("field '{attribute}' on type '{entity}' is requested with conflicting arguments")]
    ConflictingArguments { entity: String, attribute: String },

    #[error("field '{attribute}' on type '{entity}' is a scalar and has no sub-fields")]
    ScalarSelection { entity: String, attribute: String },

    #[error("introspection schema could not be built: {reason}")]
    Introspection { reason: String },
}

/// Malformed filter input.
///
/// [`FilterError::UnsupportedShape`] is kept apart from the syntax variants so
/// clients can tell "simplify your filter" from "fix a typo".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter for '{entity}' must be an object")]
    NotAnObject { entity: String },

    #[error("constraint on '{field}' must name exactly one operator, found {count}")]
    OperatorCount { field: String, count: usize },

    #[error("unsupported operator '{operator}' on '{field}'")]
    UnknownOperator { field: String, operator: String },

    #[error("'{field}' is not a filterable attribute of '{entity}'")]
    UnknownAttribute { entity: String, field: String },

    #[error("'_join' must be ANY or ALL, found {found}")]
    InvalidJoin { found: String },

    #[error("'_children' must be a list of filter objects")]
    InvalidChildren,

    #[error("range on '{field}' needs both 'from' and 'to'")]
    IncompleteRange { field: String },

    #[error("operator '{operator}' on '{field}' expects {expected}")]
    InvalidOperand {
        field: String,
        operator: String,
        expected: &'static str,
    },

    #[error("filter too complex, only AND-of-OR supported")]
    UnsupportedShape,
}

impl FilterError {
    /// True when the filter was well formed but nests OR above AND.
    pub fn is_unsupported_shape(&self) -> bool {
        matches!(self, FilterError::UnsupportedShape)
    }
}

/// Crate-level error returned by planning and execution.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("specify either '{first}' or '{second}' on '{field}', not both")]
    ResolutionAmbiguity {
        field: String,
        first: String,
        second: String,
    },

    #[error("you must specify {expected} on '{field}'")]
    MissingArgument { field: String, expected: String },

    #[error("invalid value for argument '{argument}' on '{field}': {reason}")]
    InvalidArgument {
        field: String,
        argument: String,
        reason: String,
    },

    #[error("non-nullable field '{attribute}' on '{entity}' resolved to null")]
    NullViolation { entity: String, attribute: String },

    #[error("query syntax error: {0}")]
    Syntax(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("data source failure: {0:#}")]
    DataSource(#[source] anyhow::Error),
}

impl Error {
    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Schema(_) => "SCHEMA_ERROR",
            Error::Filter(e) if e.is_unsupported_shape() => "UNSUPPORTED_FILTER_SHAPE",
            Error::Filter(_) => "FILTER_FORMAT_ERROR",
            Error::ResolutionAmbiguity { .. } => "RESOLUTION_AMBIGUITY",
            Error::MissingArgument { .. } | Error::InvalidArgument { .. } => "BAD_USER_INPUT",
            Error::NullViolation { .. } => "NULL_VIOLATION",
            Error::Syntax(_) => "GRAPHQL_PARSE_FAILED",
            Error::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Error::DataSource(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Client errors are caused by the request shape; everything else is a
    /// server-side fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::DataSource(_) | Error::NullViolation { .. })
    }

    /// Response error carrying `extensions.code`, and the root field as its
    /// path when the error belongs to one.
    pub fn to_server_error(&self, field: Option<&str>) -> ServerError {
        let mut error = ServerError::new(self.to_string(), None);
        if let Some(field) = field {
            error.path = vec![PathSegment::Field(field.to_string())];
        }
        let mut extensions = ErrorExtensionValues::default();
        extensions.set("code", self.code());
        error.extensions = Some(extensions);
        error
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
