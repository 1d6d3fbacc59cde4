//! Validation and lifecycle errors raised by the in-memory model.
//!
//! # Responsibility
//! - Describe "your data was invalid" failures separately from storage
//!   failures, so callers can tell the two apart.
//!
//! # Invariants
//! - Errors are raised at the point of violation; the model never coerces
//!   an invalid write into a valid one.

use crate::model::catalog::Species;
use crate::model::entity::Entity;
use crate::model::value::PropertyType;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ModelResult<T> = Result<T, ModelError>;

/// Data rejected by a schema, capability flag or structural rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidName {
        kind: &'static str,
        name: String,
    },
    UnknownProperty {
        aspect_def: String,
        property: String,
    },
    DuplicateProperty {
        aspect_def: String,
        property: String,
    },
    TypeMismatch {
        property: String,
        expected: PropertyType,
        actual: PropertyType,
    },
    InvalidValue {
        property_type: PropertyType,
        text: String,
        message: String,
    },
    NullNotAllowed {
        property: String,
    },
    ExpectedMultivalued {
        property: String,
    },
    ExpectedSingleValued {
        property: String,
    },
    InvalidDefault {
        property: String,
        message: String,
    },
    NotReadable {
        aspect_def: String,
        property: Option<String>,
    },
    NotWritable {
        aspect_def: String,
        property: Option<String>,
    },
    NotRemovable {
        aspect_def: String,
        property: String,
    },
    AddPropertyForbidden {
        aspect_def: String,
    },
    RemovePropertyForbidden {
        aspect_def: String,
    },
    AspectDefMismatch {
        expected: String,
        actual: String,
    },
    ConflictingAspectDef {
        name: String,
    },
    DuplicateHierarchy {
        name: String,
    },
    DuplicateAspectMap {
        aspect_def: String,
    },
    InvalidTreePath {
        path: String,
    },
    IndexOutOfBounds {
        index: usize,
        len: usize,
    },
    InvalidMapping {
        table: String,
        message: String,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName { kind, name } => write!(f, "invalid {kind} name `{name}`"),
            Self::UnknownProperty {
                aspect_def,
                property,
            } => write!(f, "aspect def `{aspect_def}` has no property `{property}`"),
            Self::DuplicateProperty {
                aspect_def,
                property,
            } => write!(
                f,
                "aspect def `{aspect_def}` already has a property `{property}`"
            ),
            Self::TypeMismatch {
                property,
                expected,
                actual,
            } => write!(
                f,
                "property `{property}` expects {expected}, got {actual}"
            ),
            Self::InvalidValue {
                property_type,
                text,
                message,
            } => write!(f, "invalid {property_type} value `{text}`: {message}"),
            Self::NullNotAllowed { property } => {
                write!(f, "property `{property}` is not nullable")
            }
            Self::ExpectedMultivalued { property } => {
                write!(f, "property `{property}` is multivalued and needs a sequence")
            }
            Self::ExpectedSingleValued { property } => {
                write!(f, "property `{property}` is single-valued and needs a scalar")
            }
            Self::InvalidDefault { property, message } => {
                write!(f, "invalid default for property `{property}`: {message}")
            }
            Self::NotReadable {
                aspect_def,
                property: Some(property),
            } => write!(f, "property `{aspect_def}.{property}` is not readable"),
            Self::NotReadable {
                aspect_def,
                property: None,
            } => write!(f, "aspect def `{aspect_def}` is not readable"),
            Self::NotWritable {
                aspect_def,
                property: Some(property),
            } => write!(f, "property `{aspect_def}.{property}` is not writable"),
            Self::NotWritable {
                aspect_def,
                property: None,
            } => write!(f, "aspect def `{aspect_def}` is not writable"),
            Self::NotRemovable {
                aspect_def,
                property,
            } => write!(f, "property `{aspect_def}.{property}` is not removable"),
            Self::AddPropertyForbidden { aspect_def } => {
                write!(f, "aspect def `{aspect_def}` does not allow adding properties")
            }
            Self::RemovePropertyForbidden { aspect_def } => write!(
                f,
                "aspect def `{aspect_def}` does not allow removing properties"
            ),
            Self::AspectDefMismatch { expected, actual } => write!(
                f,
                "aspect def mismatch: expected `{expected}`, got `{actual}`"
            ),
            Self::ConflictingAspectDef { name } => write!(
                f,
                "a structurally different aspect def named `{name}` is already present"
            ),
            Self::DuplicateHierarchy { name } => {
                write!(f, "hierarchy `{name}` already exists in catalog")
            }
            Self::DuplicateAspectMap { aspect_def } => write!(
                f,
                "catalog already holds an aspect map for aspect def `{aspect_def}`"
            ),
            Self::InvalidTreePath { path } => write!(f, "invalid tree path `{path}`"),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            Self::InvalidMapping { table, message } => {
                write!(f, "invalid table mapping for `{table}`: {message}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Object lifecycle rule violated at construction or mutation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A non-transferable aspect was offered to a different entity.
    AspectAlreadyAttached { current: Entity, requested: Entity },
    /// Species and upstream do not agree.
    InvalidUpstream {
        species: Species,
        upstream: Option<Uuid>,
    },
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AspectAlreadyAttached { current, requested } => write!(
                f,
                "aspect is bound to entity {current} and cannot move to {requested}"
            ),
            Self::InvalidUpstream {
                species,
                upstream: Some(upstream),
            } => write!(
                f,
                "catalog species {species} must not declare an upstream (got {upstream})"
            ),
            Self::InvalidUpstream {
                species,
                upstream: None,
            } => write!(f, "catalog species {species} requires an upstream catalog"),
        }
    }
}

impl Error for LifecycleError {}

/// Any error raised by the in-memory model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    Validation(ValidationError),
    Lifecycle(LifecycleError),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Lifecycle(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Lifecycle(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ModelError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LifecycleError> for ModelError {
    fn from(value: LifecycleError) -> Self {
        Self::Lifecycle(value)
    }
}
