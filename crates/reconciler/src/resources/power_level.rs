//! Room power levels.
//!
//! Power levels belong to a room and have no identity of their own, so the
//! room ID is the identifier and deleting the resource leaves the room's
//! levels untouched. Create and update are the same read-modify-write:
//! read the current event, overlay the declared fields, write it back.

use std::collections::BTreeMap;

use async_trait::async_trait;
use matrix_client::{MatrixClient, PowerLevelContent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::map_matches;
use crate::kind::{Created, ResourceKind};
use crate::managed::Managed;

/// Level needed to ban, kick or redact, or to send state, when unset.
pub const DEFAULT_MODERATION_LEVEL: i64 = 50;

/// Level for invites, plain events and users, when unset.
pub const DEFAULT_USER_LEVEL: i64 = 0;

/// Declared power levels. Shared by the PowerLevel kind and room
/// `powerLevelOverrides`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerLevelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_default: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_default: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_default: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kick: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redact: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite: Option<i64>,
}

impl PowerLevelSettings {
    /// Only the declared fields.
    pub fn to_content(&self) -> PowerLevelContent {
        self.overlay(PowerLevelContent::default())
    }

    /// `current` with every declared field replaced.
    pub fn overlay(&self, current: PowerLevelContent) -> PowerLevelContent {
        PowerLevelContent {
            users: self.users.clone().or(current.users),
            events: self.events.clone().or(current.events),
            events_default: self.events_default.or(current.events_default),
            state_default: self.state_default.or(current.state_default),
            users_default: self.users_default.or(current.users_default),
            ban: self.ban.or(current.ban),
            kick: self.kick.or(current.kick),
            redact: self.redact.or(current.redact),
            invite: self.invite.or(current.invite),
            other: current.other,
        }
    }

    /// Declared maps must match exactly; declared scalars must match the
    /// effective observed value.
    pub fn matches(&self, content: &PowerLevelContent) -> bool {
        let effective = PowerLevelObservation::from(content);
        let scalar = |desired: Option<i64>, observed: i64| desired.is_none_or(|d| d == observed);

        map_matches(self.users.as_ref(), content.users.as_ref())
            && map_matches(self.events.as_ref(), content.events.as_ref())
            && scalar(self.events_default, effective.events_default)
            && scalar(self.state_default, effective.state_default)
            && scalar(self.users_default, effective.users_default)
            && scalar(self.ban, effective.ban)
            && scalar(self.kick, effective.kick)
            && scalar(self.redact, effective.redact)
            && scalar(self.invite, effective.invite)
    }
}

/// Desired power levels of one room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLevelParameters {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(flatten)]
    pub levels: PowerLevelSettings,
}

/// Effective power levels, with Matrix defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PowerLevelObservation {
    #[serde(rename = "roomID", skip_serializing_if = "String::is_empty")]
    pub room_id: String,
    pub users: BTreeMap<String, i64>,
    pub events: BTreeMap<String, i64>,
    pub events_default: i64,
    pub state_default: i64,
    pub users_default: i64,
    pub ban: i64,
    pub kick: i64,
    pub redact: i64,
    pub invite: i64,
}

impl Default for PowerLevelObservation {
    fn default() -> Self {
        Self::from(&PowerLevelContent::default())
    }
}

impl From<&PowerLevelContent> for PowerLevelObservation {
    fn from(content: &PowerLevelContent) -> Self {
        Self {
            room_id: String::new(),
            users: content.users.clone().unwrap_or_default(),
            events: content.events.clone().unwrap_or_default(),
            events_default: content.events_default.unwrap_or(DEFAULT_USER_LEVEL),
            state_default: content.state_default.unwrap_or(DEFAULT_MODERATION_LEVEL),
            users_default: content.users_default.unwrap_or(DEFAULT_USER_LEVEL),
            ban: content.ban.unwrap_or(DEFAULT_MODERATION_LEVEL),
            kick: content.kick.unwrap_or(DEFAULT_MODERATION_LEVEL),
            redact: content.redact.unwrap_or(DEFAULT_MODERATION_LEVEL),
            invite: content.invite.unwrap_or(DEFAULT_USER_LEVEL),
        }
    }
}

/// Remote state: the room and its current power-level event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPowerLevels {
    pub room_id: String,
    pub content: PowerLevelContent,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PowerLevelKind;

impl PowerLevelKind {
    async fn write(
        client: &dyn MatrixClient,
        room_id: &str,
        params: &PowerLevelParameters,
    ) -> matrix_client::Result<RoomPowerLevels> {
        let current = client.get_power_levels(room_id).await?;
        let content = params.levels.overlay(current);
        client.set_power_levels(room_id, &content).await?;
        Ok(RoomPowerLevels {
            room_id: room_id.to_string(),
            content,
        })
    }
}

#[async_trait]
impl ResourceKind for PowerLevelKind {
    type Parameters = PowerLevelParameters;
    type Observation = PowerLevelObservation;
    type Remote = RoomPowerLevels;

    fn name(&self) -> &'static str {
        "power levels"
    }

    fn identifier(
        &self,
        object: &Managed<PowerLevelParameters, PowerLevelObservation>,
    ) -> Option<String> {
        Some(object.spec.for_provider.room_id.clone()).filter(|id| !id.is_empty())
    }

    async fn fetch(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &PowerLevelParameters,
    ) -> matrix_client::Result<RoomPowerLevels> {
        let content = client.get_power_levels(id).await?;
        Ok(RoomPowerLevels {
            room_id: id.to_string(),
            content,
        })
    }

    async fn create(
        &self,
        client: &dyn MatrixClient,
        params: &PowerLevelParameters,
    ) -> matrix_client::Result<Created<RoomPowerLevels>> {
        let remote = Self::write(client, &params.room_id, params).await?;
        Ok(Created {
            external_name: params.room_id.clone(),
            remote: Some(remote),
        })
    }

    async fn update(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &PowerLevelParameters,
    ) -> matrix_client::Result<Option<RoomPowerLevels>> {
        Self::write(client, id, params).await.map(Some)
    }

    async fn delete(
        &self,
        _client: &dyn MatrixClient,
        id: &str,
        _params: &PowerLevelParameters,
    ) -> matrix_client::Result<()> {
        debug!(room_id = id, "Power levels cannot be removed, leaving them in place");
        Ok(())
    }

    fn observation(&self, remote: &RoomPowerLevels) -> PowerLevelObservation {
        PowerLevelObservation {
            room_id: remote.room_id.clone(),
            ..PowerLevelObservation::from(&remote.content)
        }
    }

    fn is_up_to_date(&self, params: &PowerLevelParameters, remote: &RoomPowerLevels) -> bool {
        params.levels.matches(&remote.content)
    }
}
