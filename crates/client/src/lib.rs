#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # matrix-client
//!
//! Typed access to a Matrix homeserver for the provider's reconcilers.
//!
//! ## Features
//!
//! - Client-server API calls for rooms, state events, aliases and profiles
//! - Optional Synapse admin API for user and room lifecycle
//! - Identifier validation before any request is sent
//! - [`ErrorKind`] classification, including not-found, for every failure
//!
//! ## Example
//!
//! ```ignore
//! use matrix_client::{ClientConfig, HttpMatrixClient, MatrixClient, RoomRequest};
//!
//! let config = ClientConfig::new("https://matrix.example.com".parse()?, "syt_token")
//!     .admin_mode(true);
//! let client = HttpMatrixClient::new(config)?;
//!
//! let room = client
//!     .create_room(&RoomRequest {
//!         name: Some("Team Discussion".into()),
//!         encryption: Some(true),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("created {}", room.room_id);
//! ```

mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod state;
mod transport;
pub mod types;

// Re-export commonly used items
pub use client::{HttpMatrixClient, MatrixClient};
pub use config::{ClientConfig, ServerType};
pub use error::{Error, ErrorKind, M_NOT_FOUND, Result};
pub use state::{StateWrite, follow_up_writes, update_writes};
pub use transport::USER_AGENT;
pub use types::{
    CanonicalAlias, Device, ENCRYPTION_ALGORITHM, PowerLevelContent, Room, RoomAlias,
    RoomRequest, SPACE_ROOM_TYPE, Space, SpaceChild, SpaceRequest, StateEvent, ThreePid, User,
    UserRequest, event_type,
};
