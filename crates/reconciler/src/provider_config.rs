//! Provider configuration: which homeserver to talk to and with what
//! credentials.

use std::path::PathBuf;

use matrix_client::{ClientConfig, ServerType};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::managed::ObjectMeta;

/// API group and version of `ProviderConfig`.
pub const PROVIDER_CONFIG_API_VERSION: &str = "matrix.crossplane.io/v1beta1";

/// A `ProviderConfig` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub metadata: ObjectMeta,
    pub spec: ProviderConfigSpec,
}

fn default_api_version() -> String {
    PROVIDER_CONFIG_API_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    pub credentials: Credentials,
    #[serde(rename = "homeserverURL")]
    pub homeserver_url: Url,
    #[serde(default, rename = "adminAPIURL", skip_serializing_if = "Option::is_none")]
    pub admin_api_url: Option<Url>,
    #[serde(default, rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_type: Option<ServerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_mode: Option<bool>,
}

/// Where the access token comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum Credentials {
    Environment { env: EnvSelector },
    Filesystem { fs: FsSelector },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSelector {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsSelector {
    pub path: PathBuf,
}

impl ProviderConfig {
    /// Build a client configuration, reading the token from the process
    /// environment or the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be read or is empty.
    pub fn resolve(&self) -> Result<ClientConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Like [`resolve`](Self::resolve) with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be read or is empty.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<ClientConfig> {
        let name = &self.metadata.name;
        let raw = match &self.spec.credentials {
            Credentials::Environment { env } => lookup(&env.name).ok_or_else(|| {
                Error::invalid_config(name, format!("environment variable {} is not set", env.name))
            })?,
            Credentials::Filesystem { fs } => std::fs::read_to_string(&fs.path).map_err(|e| {
                Error::invalid_config(name, format!("cannot read {}: {e}", fs.path.display()))
            })?,
        };

        let token = raw.trim();
        if token.is_empty() {
            return Err(Error::invalid_config(
                name,
                "matrix access token not found in credentials",
            ));
        }

        let spec = &self.spec;
        let mut config = ClientConfig::new(spec.homeserver_url.clone(), token)
            .server_type(spec.server_type.unwrap_or_default())
            .admin_mode(spec.admin_mode.unwrap_or_default());
        if let Some(url) = &spec.admin_api_url {
            config = config.admin_api_url(url.clone());
        }
        if let Some(user_id) = &spec.user_id {
            config = config.user_id(user_id);
        }

        debug!(
            provider_config = %name,
            homeserver = %spec.homeserver_url,
            "Resolved provider config"
        );
        Ok(config)
    }
}
