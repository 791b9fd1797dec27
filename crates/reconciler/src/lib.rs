//! Observe/Create/Update/Delete reconcilers for Matrix resources.
//!
//! Each managed object declares desired state (`spec.forProvider`) and
//! records observed state (`status.atProvider`). One reconcile cycle:
//!
//! 1. **Observe**: fetch the remote entity and compare the declared fields
//! 2. **Create** it if it does not exist, recording its identifier
//! 3. **Update** it if any declared field drifted
//! 4. **Delete** it once the object is marked for deletion
//!
//! # Kinds
//!
//! - `UserKind` - user accounts, deleted by deactivation
//! - `RoomKind` - rooms, keyed by server-assigned room ID
//! - `SpaceKind` - rooms of type `m.space` with child rooms
//! - `PowerLevelKind` - a room's power levels, never deleted
//! - `RoomAliasKind` - aliases, retargeted by delete then create
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use matrix_client::{ClientConfig, HttpMatrixClient};
//! use matrix_reconciler::{Managed, Reconciler, RoomKind, RoomParameters};
//!
//! let client = Arc::new(HttpMatrixClient::new(config)?);
//! let reconciler = Reconciler::new(RoomKind, client);
//!
//! let mut room = Managed::new("team", RoomParameters {
//!     name: Some("Team Discussion".into()),
//!     ..Default::default()
//! });
//! let action = reconciler.reconcile(&mut room).await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod kind;
pub mod managed;
pub mod provider_config;
pub mod reconciler;
pub mod resources;
pub mod types;

// Re-export main types
pub use error::{Error, Result};
pub use kind::{Created, Object, ResourceKind};
pub use managed::{
    API_VERSION, Condition, ConditionStatus, ConditionType, DeletionPolicy,
    EXTERNAL_NAME_ANNOTATION, Managed, ObjectMeta, Reference, ResourceSpec, ResourceStatus,
};
pub use provider_config::{Credentials, EnvSelector, FsSelector, ProviderConfig, ProviderConfigSpec};
pub use reconciler::Reconciler;
pub use resources::{
    PowerLevelKind, PowerLevelObservation, PowerLevelParameters, PowerLevelSettings, RoomAliasKind,
    RoomAliasObservation, RoomAliasParameters, RoomKind, RoomObservation, RoomParameters,
    SpaceChildParameters, SpaceKind, SpaceObservation, SpaceParameters, UserKind, UserObservation,
    UserParameters,
};
pub use types::{ExternalCreation, ExternalObservation, ReconcileAction};
