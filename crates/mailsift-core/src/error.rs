//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested account is not configured.
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// A configuration or rule file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A configuration or rule file is not valid TOML for its schema.
    #[error("Malformed {path}: {source}")]
    Toml {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A predicate value has the wrong shape. Raised before any I/O.
    #[error("Invalid search specification: {0}")]
    InvalidSpecification(String),

    /// The server could not be reached or the session could not be set up.
    #[error("Cannot connect to account {account}: {source}")]
    Connection {
        /// Account name.
        account: String,
        /// Underlying error.
        source: SessionError,
    },

    /// The server refused the credentials. Never retried.
    #[error("Authentication failed for account {account}: {source}")]
    Authentication {
        /// Account name.
        account: String,
        /// Underlying error.
        source: SessionError,
    },

    /// A read-only operation failed mid-session.
    #[error("Query on {folder} failed: {source}")]
    QueryFailed {
        /// Folder being queried.
        folder: String,
        /// Underlying error.
        source: SessionError,
    },

    /// A mutating operation failed mid-session.
    #[error("{action} failed: {source}")]
    MutationFailed {
        /// What was being done, e.g. `move to Junk`.
        action: String,
        /// Underlying error.
        source: SessionError,
    },
}

impl Error {
    pub(crate) fn query(folder: &str) -> impl FnOnce(SessionError) -> Self {
        let folder = folder.to_string();
        move |source| Self::QueryFailed { folder, source }
    }

    pub(crate) fn mutation(action: impl Into<String>) -> impl FnOnce(SessionError) -> Self {
        let action = action.into();
        move |source| Self::MutationFailed { action, source }
    }

    /// True for errors caused by local configuration rather than the server.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownAccount(_) | Self::Io { .. } | Self::Toml { .. }
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
