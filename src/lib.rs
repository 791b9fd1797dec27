#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # provider-matrix
//!
//! Keeps a Matrix homeserver in line with declarative manifests.
//!
//! The daemon loads `User`, `Room`, `Space`, `PowerLevel`, `RoomAlias` and
//! `ProviderConfig` documents from a directory, builds one client per
//! provider config and runs every managed object through its reconciler on
//! a fixed poll interval.
//!
//! ```ignore
//! use provider_matrix::{LoopConfig, ManifestStore, ReconciliationLoop};
//!
//! let store = ManifestStore::new("manifests");
//! let mut daemon = ReconciliationLoop::with_http_clients(store, LoopConfig::default());
//! daemon.sync()?;
//! let stats = daemon.reconcile_all().await;
//! ```

pub mod cli;
pub mod daemon;
pub mod error;
pub mod health;
pub mod manifest;

// Re-export main types
pub use cli::Cli;
pub use daemon::{ClientFactory, LoopConfig, PassStats, ReconciliationLoop, reconcile_manifest};
pub use error::{Error, Result};
pub use manifest::{Kind, Manifest, ManifestStore, ObjectKey, ReloadSummary};
