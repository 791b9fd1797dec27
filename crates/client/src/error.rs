//! Error types for the Matrix client.

use thiserror::Error;

/// Result type for Matrix client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input rejected before any request was sent.
    Validation,
    /// The homeserver reported that the entity does not exist.
    NotFound,
    /// The operation needs the admin API and admin mode is off.
    Capability,
    /// The homeserver answered with any other error status.
    Api,
    /// The request never completed or the response could not be read.
    Transport,
    /// The client configuration is unusable.
    Config,
}

/// Errors that can occur while talking to a homeserver.
#[derive(Error, Debug)]
pub enum Error {
    /// An identifier failed local validation.
    #[error(transparent)]
    InvalidIdentifier(#[from] matrix_core::Error),

    /// Admin-only operation attempted without admin mode.
    #[error("{operation} requires admin API access")]
    AdminRequired { operation: &'static str },

    /// Non-success HTTP status from the homeserver.
    #[error("{operation} failed with status {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        errcode: Option<String>,
        message: String,
    },

    /// Connection, timeout or body transfer failure.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the expected JSON.
    #[error("{operation} returned an unexpected body: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    /// A room was created but a follow-up state write failed.
    #[error("room {room_id} created but {source}")]
    PartialSetup {
        room_id: String,
        #[source]
        source: Box<Error>,
    },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// The `errcode` homeservers return for missing entities.
pub const M_NOT_FOUND: &str = "M_NOT_FOUND";

impl Error {
    /// Create an admin required error.
    pub const fn admin_required(operation: &'static str) -> Self {
        Self::AdminRequired { operation }
    }

    /// Create an API error.
    pub fn api(
        operation: &'static str,
        status: u16,
        errcode: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            operation,
            status,
            errcode,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub const fn transport(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { operation, source }
    }

    /// Create a decode error.
    pub fn decode(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            operation,
            reason: reason.into(),
        }
    }

    /// Create a partial setup error.
    pub fn partial_setup(room_id: impl Into<String>, source: Self) -> Self {
        Self::PartialSetup {
            room_id: room_id.into(),
            source: Box::new(source),
        }
    }

    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) => ErrorKind::Validation,
            Self::AdminRequired { .. } => ErrorKind::Capability,
            Self::Api {
                status, errcode, ..
            } => {
                if *status == 404 || errcode.as_deref() == Some(M_NOT_FOUND) {
                    ErrorKind::NotFound
                } else {
                    ErrorKind::Api
                }
            }
            Self::Transport { .. } | Self::Decode { .. } => ErrorKind::Transport,
            Self::PartialSetup { source, .. } => source.kind(),
            Self::Config { .. } | Self::UrlParse(_) => ErrorKind::Config,
        }
    }

    /// Whether the homeserver reported the entity as absent.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Name of the operation that failed, when one was recorded.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::AdminRequired { operation }
            | Self::Api { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Decode { operation, .. } => Some(*operation),
            Self::PartialSetup { source, .. } => source.operation(),
            Self::InvalidIdentifier(_) | Self::Config { .. } | Self::UrlParse(_) => None,
        }
    }

    /// ID of a room that exists despite the failure.
    pub fn created_room_id(&self) -> Option<&str> {
        match self {
            Self::PartialSetup { room_id, .. } => Some(room_id),
            _ => None,
        }
    }
}
