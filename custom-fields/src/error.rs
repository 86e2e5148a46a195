//! Error types for the field rendering engine

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for field engine operations
pub type Result<T> = std::result::Result<T, FieldsError>;

/// Errors that can occur while resolving, rendering or feeding fields.
///
/// Most of these never reach the owning form: the group renderer turns
/// `UnknownFieldType` into a placeholder, the option source turns
/// `RemoteFetch` into an empty option list, and the selection controller
/// ignores a `MalformedReorder`.
#[derive(Debug, Error)]
pub enum FieldsError {
    /// No renderer registered for a descriptor type
    #[error("unknown field type: {field_type}")]
    UnknownFieldType { field_type: String },

    /// Network or backend failure while querying remote options
    #[error("remote option fetch failed for '{endpoint}': {message}")]
    RemoteFetch { endpoint: String, message: String },

    /// A reorder payload that is not a list of plain identifiers
    #[error("malformed reorder payload: {message}")]
    MalformedReorder { message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FieldsError {
    /// Create a remote fetch error for an endpoint
    pub fn remote_fetch(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FieldsError::UnknownFieldType {
            field_type: "colour_wheel".into(),
        };
        assert_eq!(err.to_string(), "unknown field type: colour_wheel");
    }

    #[test]
    fn test_remote_fetch_error() {
        let err = FieldsError::remote_fetch("posts", "status 500");
        assert!(err.to_string().contains("posts"));
        assert!(err.to_string().contains("status 500"));
    }
}
