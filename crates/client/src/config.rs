//! Configuration for the Matrix client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Connection settings for one homeserver.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the client-server API.
    pub homeserver_url: Url,

    /// Base URL of the admin API. Defaults to the homeserver URL.
    #[serde(default)]
    pub admin_api_url: Option<Url>,

    /// Bearer token sent with every request.
    pub access_token: String,

    /// User the token belongs to.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Homeserver implementation hint.
    #[serde(default)]
    pub server_type: ServerType,

    /// Route user and room lifecycle calls through the admin API.
    #[serde(default)]
    pub admin_mode: bool,

    /// Timeout for each request.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("homeserver_url", &self.homeserver_url.as_str())
            .field("admin_api_url", &self.admin_api_url.as_ref().map(Url::as_str))
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("server_type", &self.server_type)
            .field("admin_mode", &self.admin_mode)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Create a config for the given homeserver and token.
    pub fn new(homeserver_url: Url, access_token: impl Into<String>) -> Self {
        Self {
            homeserver_url,
            admin_api_url: None,
            access_token: access_token.into(),
            user_id: None,
            server_type: ServerType::default(),
            admin_mode: false,
            timeout: default_timeout(),
        }
    }

    /// Set a separate admin API URL.
    #[must_use]
    pub fn admin_api_url(mut self, url: Url) -> Self {
        self.admin_api_url = Some(url);
        self
    }

    /// Set the user the token belongs to.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the server type hint.
    #[must_use]
    pub const fn server_type(mut self, server_type: ServerType) -> Self {
        self.server_type = server_type;
        self
    }

    /// Enable or disable admin mode.
    #[must_use]
    pub const fn admin_mode(mut self, enabled: bool) -> Self {
        self.admin_mode = enabled;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL admin calls are made against.
    pub fn admin_base(&self) -> &Url {
        self.admin_api_url.as_ref().unwrap_or(&self.homeserver_url)
    }

    /// Server name used to qualify bare localparts.
    ///
    /// Taken from the configured user ID, else from the homeserver host.
    pub fn server_name(&self) -> Option<String> {
        self.user_id
            .as_deref()
            .map(matrix_core::extract_domain)
            .filter(|domain| !domain.is_empty())
            .or_else(|| self.homeserver_url.host_str())
            .map(str::to_string)
    }
}

/// Homeserver implementation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Synapse, whose admin API this client speaks.
    Synapse,
    /// Dendrite.
    Dendrite,
    /// Conduit.
    Conduit,
    /// Unknown; assume the admin API is Synapse compatible.
    #[default]
    Auto,
}

impl ServerType {
    /// Whether the Synapse admin API paths can be expected to exist.
    pub const fn supports_synapse_admin(self) -> bool {
        matches!(self, Self::Synapse | Self::Auto)
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synapse => write!(f, "synapse"),
            Self::Dendrite => write!(f, "dendrite"),
            Self::Conduit => write!(f, "conduit"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ServerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "synapse" => Ok(Self::Synapse),
            "dendrite" => Ok(Self::Dendrite),
            "conduit" => Ok(Self::Conduit),
            "auto" | "" => Ok(Self::Auto),
            other => Err(Error::config_error(format!("unknown server type '{other}'"))),
        }
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
