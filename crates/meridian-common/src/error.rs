//! Error types for the Meridian ingress compiler
//!
//! Errors are structured with fields to aid debugging. The compiler itself is
//! total; these errors surface from the stages around it (settings parsing,
//! probe insertion) where malformed input has to be rejected.

use thiserror::Error;

/// Main error type for Meridian operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or ingress content
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Resource carrying the invalid value (e.g., "config-contour", "default/hello")
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "visibility.ExternalIP.class")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },
}

impl Error {
    /// Create a validation error with resource context
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Get the resource name if this error is associated with one
    pub fn resource(&self) -> Option<&str> {
        match self {
            Error::Validation { resource, .. } => Some(resource),
            Error::Serialization { .. } => None,
        }
    }

    /// Get the field path if this error points at one
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => field.as_deref(),
            Error::Serialization { .. } => None,
        }
    }
}

impl From<crate::yaml::YamlError> for Error {
    fn from(err: crate::yaml::YamlError) -> Self {
        Error::serialization_for_kind("yaml", err.to_string())
    }
}
