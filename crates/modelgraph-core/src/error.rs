use crate::{
    config::ConfigError, model::ClassBuildError, registry::RegistryError,
    serialize::WireError, validate::ValidationTree,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Runtime failures surfaced by model operations.
/// Every variant carries enough context (entity, field, expected/received)
/// to build a user-facing message without re-deriving it.
///

#[remain::sorted]
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Class(#[from] ClassBuildError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{entity}: identifier '{attribute}' value {value} already belongs to another instance")]
    DuplicateIdentifier {
        entity: String,
        attribute: String,
        value: String,
    },

    #[error("{entity}: field '{field}' is not active")]
    FieldNotActive { entity: String, field: String },

    #[error("{entity}: field '{field}' does not exist")]
    FieldNotFound { entity: String, field: String },

    #[error("{entity}: no identifier is set")]
    IdentifierNotSet { entity: String },

    #[error("{entity}: invalid identifier descriptor: {reason}")]
    InvalidIdentifierDescriptor { entity: String, reason: String },

    #[error("{entity}: no primary identifier attribute")]
    NoPrimaryIdentifierAttribute { entity: String },

    #[error("{entity}: no secondary identifier attribute '{attribute}'")]
    NoSecondaryIdentifierAttribute { entity: String, attribute: String },

    #[error("{entity}: primary identifier '{attribute}' is already set")]
    PrimaryIdentifierAlreadySet { entity: String, attribute: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no type registry available to resolve '{type_name}'")]
    RegistryNotFound { type_name: String },

    #[error("{entity}.{field}: expected {expected}, received {received}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        received: String,
    },

    #[error("{entity}: validation failed")]
    ValidationFailed {
        entity: String,
        failures: ValidationTree,
    },

    #[error(transparent)]
    Wire(#[from] WireError),
}

impl Error {
    pub(crate) fn type_mismatch(
        entity: impl Into<String>,
        field: impl Into<String>,
        expected: impl fmt::Display,
        received: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            entity: entity.into(),
            field: field.into(),
            expected: expected.to_string(),
            received: received.into(),
        }
    }

    pub(crate) fn field_not_found(entity: &str, field: &str) -> Self {
        Self::FieldNotFound {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid_descriptor(entity: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifierDescriptor {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable classification used by callers that map errors onto their own surface.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::TypeMismatch { .. } => ErrorClass::TypeMismatch,
            Self::FieldNotActive { .. }
            | Self::FieldNotFound { .. }
            | Self::NoPrimaryIdentifierAttribute { .. }
            | Self::NoSecondaryIdentifierAttribute { .. }
            | Self::RegistryNotFound { .. }
            | Self::Registry(_) => ErrorClass::NotFound,
            Self::ValidationFailed { .. } => ErrorClass::Validation,
            Self::DuplicateIdentifier { .. } => ErrorClass::Conflict,
            Self::IdentifierNotSet { .. } | Self::PrimaryIdentifierAlreadySet { .. } => {
                ErrorClass::Precondition
            }
            Self::Class(_)
            | Self::Config(_)
            | Self::InvalidIdentifierDescriptor { .. }
            | Self::Wire(_) => ErrorClass::Invalid,
        }
    }

    /// Failure tree for `ValidationFailed`, if this is one.
    #[must_use]
    pub const fn validation_failures(&self) -> Option<&ValidationTree> {
        match self {
            Self::ValidationFailed { failures, .. } => Some(failures),
            _ => None,
        }
    }
}

///
/// ErrorClass
/// Coarse error taxonomy, stable across variant additions.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    TypeMismatch,
    NotFound,
    Validation,
    Conflict,
    Precondition,
    Invalid,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TypeMismatch => "type_mismatch",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Precondition => "precondition",
            Self::Invalid => "invalid",
        };
        write!(f, "{label}")
    }
}
