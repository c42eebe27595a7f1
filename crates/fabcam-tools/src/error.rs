//! Error types for the tool catalogs.

use thiserror::Error;

/// Errors raised while building or querying tool catalogs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolsError {
    /// A lookup by name or number found nothing.
    #[error("{kind} `{key}` not found")]
    NotFound {
        /// Catalog that was searched (`shape`, `bit`, `library`, ...).
        kind: &'static str,
        /// The requested name or number.
        key: String,
    },

    /// A record field does not satisfy its template.
    #[error("{context}: field `{field}` {message}")]
    SchemaViolation {
        /// The record being validated.
        context: String,
        /// The offending field.
        field: String,
        /// What was expected.
        message: String,
    },

    /// Two entries registered under the same name or number.
    #[error("duplicate {kind} `{key}`")]
    DuplicateKey {
        /// Catalog that rejected the entry.
        kind: &'static str,
        /// The repeated name or number.
        key: String,
    },
}

impl ToolsError {
    pub(crate) fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, key: impl ToString) -> Self {
        Self::DuplicateKey {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn schema(context: &str, field: &str, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            context: context.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for tool catalog operations.
pub type Result<T> = std::result::Result<T, ToolsError>;
