//! Error types for operation production.

use std::fmt;

use fabcam_tools::ToolsError;
use thiserror::Error;

use crate::operation::OperationState;

/// A mount whose production failed, with the underlying error text.
#[derive(Debug, Clone, PartialEq)]
pub struct MountFailure {
    /// Owning solid.
    pub solid: String,
    /// Failed mount.
    pub mount: String,
    /// Rendered error.
    pub detail: String,
}

impl fmt::Display for MountFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.solid, self.mount, self.detail)
    }
}

fn summarize(failures: &[MountFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while recording, producing or serializing operations.
#[derive(Error, Debug)]
pub enum FabError {
    /// A lookup by name found nothing.
    #[error("{kind} `{key}` not found")]
    NotFound {
        /// What was searched (`mount`, `fastener size`, ...).
        kind: &'static str,
        /// The requested key.
        key: String,
    },

    /// A record or argument does not have the required shape.
    #[error("{context}: field `{field}` {message}")]
    SchemaViolation {
        /// The record or entity being checked.
        context: String,
        /// The offending field.
        field: String,
        /// What was expected.
        message: String,
    },

    /// The geometry kernel rejected an operation's input.
    #[error("operation `{operation}`: {message}")]
    Geometry {
        /// Operation name.
        operation: String,
        /// Kernel message.
        message: String,
    },

    /// Two entities registered under the same key.
    #[error("duplicate {kind} `{key}`")]
    DuplicateKey {
        /// Collection that rejected the entry.
        kind: &'static str,
        /// The repeated key.
        key: String,
    },

    /// An operation was asked to move backwards or skip a lifecycle state.
    #[error("operation `{operation}` cannot go from {from} to {to}")]
    InvalidState {
        /// Operation name.
        operation: String,
        /// Current state.
        from: OperationState,
        /// Requested state.
        to: OperationState,
    },

    /// One or more mounts failed during a production pass.
    #[error("{} mount(s) failed: {}", .0.len(), summarize(.0))]
    MountsFailed(Vec<MountFailure>),

    /// Tool catalog error.
    #[error(transparent)]
    Tools(#[from] ToolsError),

    /// JSON encoding or decoding error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings file could not be parsed.
    #[error("settings: {0}")]
    Config(#[from] toml::de::Error),

    /// File could not be read.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl FabError {
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

    pub(crate) fn geometry(operation: &str, message: impl Into<String>) -> Self {
        Self::Geometry {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for production operations.
pub type Result<T> = std::result::Result<T, FabError>;
