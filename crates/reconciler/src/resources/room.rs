//! Matrix rooms.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matrix_client::{MatrixClient, Room, RoomRequest, StateEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::power_level::{PowerLevelObservation, PowerLevelSettings};
use super::{field_matches, timestamp};
use crate::kind::{Created, ResourceKind};

/// Desired state of a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Canonical alias, e.g. `#team:example.com`. Its local part is
    /// requested at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// `private_chat`, `public_chat` or `trusted_private_chat`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Directory visibility: `public` or `private`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_content: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial_state: Vec<StateEventParameters>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_level_overrides: Option<PowerLevelSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_rules: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_enabled: Option<bool>,
    #[serde(default, rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A state event sent with the create call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEventParameters {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub state_key: String,
    #[serde(default)]
    pub content: Value,
}

/// Observed state of a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomObservation {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    pub joined_members: u64,
    pub invited_members: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_rules: Option<String>,
    pub encryption_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_levels: Option<PowerLevelObservation>,
}

pub fn to_request(params: &RoomParameters) -> RoomRequest {
    RoomRequest {
        name: params.name.clone(),
        topic: params.topic.clone(),
        room_alias_name: params
            .alias
            .as_deref()
            .map(|alias| matrix_core::localpart(alias).to_string()),
        preset: params.preset.clone(),
        visibility: params.visibility.clone(),
        room_version: params.room_version.clone(),
        creation_content: params.creation_content.clone(),
        initial_state: params
            .initial_state
            .iter()
            .map(|event| StateEvent {
                event_type: event.event_type.clone(),
                state_key: event.state_key.clone(),
                content: event.content.clone(),
            })
            .collect(),
        invite: params.invite.clone(),
        power_level_content_override: params
            .power_level_overrides
            .as_ref()
            .map(PowerLevelSettings::to_content),
        guest_access: params.guest_access.clone(),
        history_visibility: params.history_visibility.clone(),
        join_rules: params.join_rules.clone(),
        encryption: params.encryption_enabled,
        avatar_url: params.avatar_url.clone(),
    }
}

pub fn observation(room: &Room) -> RoomObservation {
    RoomObservation {
        room_id: room.room_id.clone(),
        name: room.name.clone(),
        topic: room.topic.clone(),
        alias: room.canonical_alias.clone(),
        avatar_url: room.avatar.clone(),
        creator: room.creator.clone(),
        creation_time: timestamp(room.creation_ts),
        room_version: room.room_version.clone(),
        room_type: room.room_type.clone(),
        joined_members: room.joined_members,
        invited_members: room.invited_members,
        visibility: room.visibility.clone(),
        guest_access: room.guest_access.clone(),
        history_visibility: room.history_visibility.clone(),
        join_rules: room.join_rules.clone(),
        encryption_enabled: room.encryption,
        power_levels: room.power_levels.as_ref().map(PowerLevelObservation::from),
    }
}

/// Creation-only fields (preset, version, initial state, invites,
/// visibility, power-level overrides) are not compared.
pub fn is_up_to_date(params: &RoomParameters, room: &Room) -> bool {
    field_matches(params.name.as_deref(), room.name.as_deref())
        && field_matches(params.topic.as_deref(), room.topic.as_deref())
        && field_matches(params.alias.as_deref(), room.canonical_alias.as_deref())
        && field_matches(params.guest_access.as_deref(), room.guest_access.as_deref())
        && field_matches(
            params.history_visibility.as_deref(),
            room.history_visibility.as_deref(),
        )
        && field_matches(params.join_rules.as_deref(), room.join_rules.as_deref())
        && field_matches(params.encryption_enabled.as_ref(), Some(&room.encryption))
        && field_matches(params.avatar_url.as_deref(), room.avatar.as_deref())
}

/// Rooms are keyed by the server-assigned room ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomKind;

#[async_trait]
impl ResourceKind for RoomKind {
    type Parameters = RoomParameters;
    type Observation = RoomObservation;
    type Remote = Room;

    fn name(&self) -> &'static str {
        "room"
    }

    async fn fetch(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &RoomParameters,
    ) -> matrix_client::Result<Room> {
        client.get_room(id).await
    }

    async fn create(
        &self,
        client: &dyn MatrixClient,
        params: &RoomParameters,
    ) -> matrix_client::Result<Created<Room>> {
        let room = client.create_room(&to_request(params)).await?;
        Ok(Created {
            external_name: room.room_id.clone(),
            remote: Some(room),
        })
    }

    async fn update(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &RoomParameters,
    ) -> matrix_client::Result<Option<Room>> {
        client.update_room(id, &to_request(params)).await.map(Some)
    }

    async fn delete(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &RoomParameters,
    ) -> matrix_client::Result<()> {
        client.delete_room(id).await
    }

    fn observation(&self, remote: &Room) -> RoomObservation {
        observation(remote)
    }

    fn is_up_to_date(&self, params: &RoomParameters, remote: &Room) -> bool {
        is_up_to_date(params, remote)
    }
}
