#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # matrix-core
//!
//! Identifier rules shared by the wire client and the reconcilers.
//!
//! Every user, room and alias identifier is checked here before it is
//! placed into a request path or body, so malformed input never costs a
//! network round trip.
//!
//! ## Example
//!
//! ```ignore
//! use matrix_core::{RoomId, UserId, extract_domain};
//!
//! let user = UserId::try_from("@alice:example.com")?;
//! assert_eq!(user.server_name(), "example.com");
//! assert!(RoomId::try_from("no-sigil:example.com").is_err());
//! assert_eq!(extract_domain("@alice:example.com"), "example.com");
//! ```

pub mod error;
pub mod id;

pub use error::{Error, Result};
pub use id::{IdKind, RoomAliasId, RoomId, UserId, extract_domain, localpart, validate};
