//! Identifier validation errors.
//!
//! Every error is produced locally, before any request leaves the process.

use thiserror::Error;

use crate::id::IdKind;

/// Result type for identifier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating Matrix identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The identifier does not start with the sigil for its kind.
    #[error("invalid {kind} ID '{value}': must start with '{}'", .kind.sigil())]
    MissingSigil { kind: IdKind, value: String },

    /// The identifier is not `<sigil><localpart>:<server name>`.
    #[error("invalid {kind} ID '{value}': {reason}")]
    Malformed {
        kind: IdKind,
        value: String,
        reason: &'static str,
    },
}

impl Error {
    /// Create a missing sigil error.
    pub fn missing_sigil(kind: IdKind, value: impl Into<String>) -> Self {
        Self::MissingSigil {
            kind,
            value: value.into(),
        }
    }

    /// Create a malformed identifier error.
    pub fn malformed(kind: IdKind, value: impl Into<String>, reason: &'static str) -> Self {
        Self::Malformed {
            kind,
            value: value.into(),
            reason,
        }
    }

    /// The kind of identifier that failed validation.
    pub const fn kind(&self) -> IdKind {
        match self {
            Self::MissingSigil { kind, .. } | Self::Malformed { kind, .. } => *kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sigil_display() {
        let err = Error::missing_sigil(IdKind::User, "alice:example.com");
        assert_eq!(
            err.to_string(),
            "invalid user ID 'alice:example.com': must start with '@'"
        );
        assert_eq!(err.kind(), IdKind::User);
    }

    #[test]
    fn test_malformed_display() {
        let err = Error::malformed(IdKind::RoomAlias, "#a:b:c", "expected exactly one ':'");
        assert!(err.to_string().contains("room alias"));
        assert!(err.to_string().contains("exactly one"));
    }
}
