//! Matrix user accounts.
//!
//! Deleting a user deactivates the account; the homeserver keeps it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matrix_client::{Device, MatrixClient, ThreePid, User, UserRequest};
use matrix_core::{IdKind, UserId};
use serde::{Deserialize, Serialize};

use super::{field_matches, timestamp};
use crate::kind::{Created, ResourceKind};

/// Desired state of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserParameters {
    /// Full user ID. Takes precedence over `localpart`.
    #[serde(default, rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Local part; the server name comes from the provider config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localpart: Option<String>,
    /// Initial password. Only sent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
    #[serde(default, rename = "externalIDs", skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Vec<ExternalId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

/// A third-party identifier such as an email address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalId {
    pub medium: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<bool>,
}

/// Observed state of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserObservation {
    #[serde(default, rename = "userID")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub deactivated: bool,
    #[serde(default)]
    pub shadow_banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceObservation>,
    #[serde(default, rename = "externalIDs", skip_serializing_if = "Vec::is_empty")]
    pub external_ids: Vec<ExternalId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceObservation {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "lastSeenIP", skip_serializing_if = "Option::is_none")]
    pub last_seen_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_time: Option<DateTime<Utc>>,
}

/// The user ID to manage: the declared one, or the localpart on the
/// provider's server.
///
/// # Errors
///
/// Returns a validation error if neither is available.
pub fn resolve_user_id(
    params: &UserParameters,
    server_name: Option<&str>,
) -> matrix_client::Result<String> {
    if let Some(user_id) = params.user_id.as_deref().filter(|id| !id.is_empty()) {
        return Ok(user_id.to_string());
    }

    match (params.localpart.as_deref(), server_name) {
        (Some(localpart), Some(server)) if !localpart.is_empty() && !server.is_empty() => {
            Ok(UserId::new(localpart, server)?.into_string())
        }
        (localpart, _) => Err(matrix_core::Error::malformed(
            IdKind::User,
            localpart.unwrap_or_default(),
            "set userID, or localpart with a known server name",
        )
        .into()),
    }
}

/// Parameters to a wire request for `user_id`.
pub fn to_request(params: &UserParameters, user_id: &str) -> UserRequest {
    UserRequest {
        user_id: user_id.to_string(),
        password: params.password.clone(),
        displayname: params.display_name.clone(),
        avatar_url: params.avatar_url.clone(),
        admin: params.admin,
        deactivated: params.deactivated,
        user_type: params.user_type.clone(),
        threepids: params.external_ids.as_ref().map(|ids| {
            ids.iter()
                .map(|id| ThreePid {
                    medium: id.medium.clone(),
                    address: id.address.clone(),
                    ..ThreePid::default()
                })
                .collect()
        }),
    }
}

fn device_observation(device: &Device) -> DeviceObservation {
    DeviceObservation {
        device_id: device.device_id.clone(),
        display_name: device.display_name.clone(),
        last_seen_ip: device.last_seen_ip.clone(),
        last_seen_time: timestamp(device.last_seen_ts),
    }
}

pub fn observation(user: &User) -> UserObservation {
    UserObservation {
        user_id: user.user_id.clone(),
        display_name: user.displayname.clone(),
        avatar_url: user.avatar_url.clone(),
        admin: user.admin,
        deactivated: user.deactivated,
        shadow_banned: user.shadow_banned,
        creation_time: timestamp(user.creation_ts),
        last_seen_time: timestamp(user.last_seen_ts),
        user_type: user.user_type.clone(),
        devices: user.devices.iter().map(device_observation).collect(),
        external_ids: user
            .threepids
            .iter()
            .map(|pid| ExternalId {
                medium: pid.medium.clone(),
                address: pid.address.clone(),
                validated: Some(pid.validated_at.is_some()),
            })
            .collect(),
    }
}

pub fn is_up_to_date(params: &UserParameters, user: &User) -> bool {
    field_matches(params.display_name.as_deref(), user.displayname.as_deref())
        && field_matches(params.avatar_url.as_deref(), user.avatar_url.as_deref())
        && field_matches(params.admin.as_ref(), Some(&user.admin))
        && field_matches(params.deactivated.as_ref(), Some(&user.deactivated))
        && field_matches(params.user_type.as_deref(), user.user_type.as_deref())
}

/// Users are keyed by their full Matrix user ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserKind;

#[async_trait]
impl ResourceKind for UserKind {
    type Parameters = UserParameters;
    type Observation = UserObservation;
    type Remote = User;

    fn name(&self) -> &'static str {
        "user"
    }

    async fn fetch(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &UserParameters,
    ) -> matrix_client::Result<User> {
        client.get_user(id).await
    }

    async fn create(
        &self,
        client: &dyn MatrixClient,
        params: &UserParameters,
    ) -> matrix_client::Result<Created<User>> {
        let user_id = resolve_user_id(params, client.server_name().as_deref())?;
        let user = client.create_user(&to_request(params, &user_id)).await?;
        Ok(Created {
            external_name: user_id,
            remote: Some(user),
        })
    }

    async fn update(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &UserParameters,
    ) -> matrix_client::Result<Option<User>> {
        let request = UserRequest {
            password: None,
            ..to_request(params, id)
        };
        client.update_user(&request).await.map(Some)
    }

    async fn delete(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &UserParameters,
    ) -> matrix_client::Result<()> {
        client.deactivate_user(id).await
    }

    fn observation(&self, remote: &User) -> UserObservation {
        observation(remote)
    }

    fn is_up_to_date(&self, params: &UserParameters, remote: &User) -> bool {
        is_up_to_date(params, remote)
    }
}
