//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A homeserver call failed; `context` names the step, e.g.
    /// `cannot create Matrix room`.
    #[error("{context}: {source}")]
    Client {
        context: String,
        #[source]
        source: matrix_client::Error,
    },

    /// Update called on an object whose remote counterpart is unknown.
    #[error("{kind} '{name}' has no external identifier")]
    MissingIdentifier { kind: &'static str, name: String },

    /// A provider config cannot be turned into a client.
    #[error("invalid provider config '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },
}

impl Error {
    /// Wrap a client error with the step that failed.
    pub fn client(context: impl Into<String>, source: matrix_client::Error) -> Self {
        Self::Client {
            context: context.into(),
            source,
        }
    }

    /// Create a missing identifier error.
    pub fn missing_identifier(kind: &'static str, name: impl Into<String>) -> Self {
        Self::MissingIdentifier {
            kind,
            name: name.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Classification of the underlying client error, if any.
    pub fn client_kind(&self) -> Option<matrix_client::ErrorKind> {
        match self {
            Self::Client { source, .. } => Some(source.kind()),
            Self::MissingIdentifier { .. } | Self::InvalidConfig { .. } => None,
        }
    }
}
