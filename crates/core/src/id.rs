//! Matrix identifier grammar.
//!
//! Users, rooms and aliases share one shape: a sigil, a localpart, a single
//! `:` and a server name. Neither part may be empty and no further `:` is
//! accepted, so `@alice:example.com:8448` is rejected.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The kinds of identifier the provider sends over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// `@localpart:server`
    User,
    /// `!opaque:server`
    Room,
    /// `#name:server`
    RoomAlias,
}

impl IdKind {
    /// The leading character identifiers of this kind carry.
    pub const fn sigil(self) -> char {
        match self {
            Self::User => '@',
            Self::Room => '!',
            Self::RoomAlias => '#',
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Room => write!(f, "room"),
            Self::RoomAlias => write!(f, "room alias"),
        }
    }
}

/// Validate `value` as an identifier of the given kind.
///
/// # Errors
///
/// Returns [`Error::MissingSigil`] when the sigil is absent and
/// [`Error::Malformed`] when the remainder is not `localpart:server`.
pub fn validate(kind: IdKind, value: &str) -> Result<()> {
    let rest = value
        .strip_prefix(kind.sigil())
        .ok_or_else(|| Error::missing_sigil(kind, value))?;

    let mut parts = rest.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(server), None) if !local.is_empty() && !server.is_empty() => Ok(()),
        (_, None, _) => Err(Error::malformed(kind, value, "missing ':' before server name")),
        (_, _, Some(_)) => Err(Error::malformed(kind, value, "expected exactly one ':'")),
        _ => Err(Error::malformed(
            kind,
            value,
            "localpart and server name must not be empty",
        )),
    }
}

/// Server name of an identifier, or `""` unless it has exactly one `:`.
pub fn extract_domain(id: &str) -> &str {
    let mut parts = id.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(domain), None) => domain,
        _ => "",
    }
}

/// Localpart of an identifier: the text between the sigil and the first `:`.
///
/// `#team:example.com` yields `team`. A value without a sigil is returned up
/// to its first `:`.
pub fn localpart(id: &str) -> &str {
    let rest = id
        .strip_prefix(['@', '!', '#'])
        .unwrap_or(id);
    rest.split(':').next().unwrap_or(rest)
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[inline]
            pub fn localpart(&self) -> &str {
                localpart(&self.0)
            }

            #[inline]
            pub fn server_name(&self) -> &str {
                extract_domain(&self.0)
            }

            #[inline]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                validate($kind, &value)?;
                Ok(Self(value))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                validate($kind, value)?;
                Ok(Self(value.to_string()))
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                Self::try_from(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

identifier! {
    /// A validated user ID, e.g. `@alice:example.com`.
    UserId => IdKind::User
}

identifier! {
    /// A validated room ID, e.g. `!abc:example.com`.
    RoomId => IdKind::Room
}

identifier! {
    /// A validated room alias, e.g. `#team:example.com`.
    RoomAliasId => IdKind::RoomAlias
}

impl UserId {
    /// The user ID for `localpart` on `server_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if either part is empty or contains a `:`.
    pub fn new(localpart: &str, server_name: &str) -> Result<Self> {
        Self::try_from(format!("{}{localpart}:{server_name}", IdKind::User.sigil()))
    }
}
