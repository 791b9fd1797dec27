//! Error types for the provider daemon.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read manifests from {path}: {source}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest in {path}: {source}")]
    ParseManifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot access state file {path}: {source}")]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state file {path}: {source}")]
    StateFormat {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{kind} '{name}' is declared twice (again in {path})")]
    DuplicateObject {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("no usable provider config named '{name}'")]
    MissingProviderConfig { name: String },

    #[error(transparent)]
    Reconcile(#[from] matrix_reconciler::Error),

    #[error(transparent)]
    Client(#[from] matrix_client::Error),
}

impl Error {
    pub fn read_manifest(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadManifest {
            path: path.into(),
            source,
        }
    }

    pub fn parse_manifest(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::ParseManifest {
            path: path.into(),
            source,
        }
    }

    pub fn state(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::State {
            path: path.into(),
            source,
        }
    }

    pub fn state_format(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::StateFormat {
            path: path.into(),
            source,
        }
    }

    pub fn missing_provider_config(name: impl Into<String>) -> Self {
        Self::MissingProviderConfig { name: name.into() }
    }
}
