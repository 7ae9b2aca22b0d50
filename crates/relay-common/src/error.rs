//! Error types for relay
//!
//! Errors are structured with fields to aid debugging. Each variant carries
//! the context needed to attribute a failure (resource, type, key) without
//! re-parsing the message.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for relay operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for CRD specs
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the resource with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.broker")
        field: Option<String>,
    },

    /// No kind/version is registered for a type
    #[error("no kind registered for type {type_name}: {message}")]
    SchemaResolution {
        /// Name of the type that could not be resolved
        type_name: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of what failed
        message: String,
        /// The resource kind being encoded (if known)
        kind: Option<String>,
    },

    /// Reconcile key is not of the form `namespace/name` or `name`
    #[error("invalid resource key: {key:?}")]
    InvalidKey {
        /// The offending key
        key: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "tracker")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
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

    /// Create a schema resolution error for the named type
    pub fn schema_resolution(type_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaResolution {
            type_name: type_name.into(),
            message: msg.into(),
        }
    }

    /// Create an encoding error with the given message
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create an encoding error with resource kind context
    pub fn encoding_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Encoding {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation, schema and encoding errors need a fix to the object or the
    /// registry; retrying cannot help. Kubernetes 4xx errors are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Validation { .. } => false,
            Error::SchemaResolution { .. } => false,
            Error::Encoding { .. } => false,
            Error::InvalidKey { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// HTTP status code if this error came back from the API server
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => Some(ae.code),
            _ => None,
        }
    }

    /// Returns true if the API server reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::encoding(e.to_string())
    }
}
