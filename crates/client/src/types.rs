//! Wire types for the client-server and admin APIs.
//!
//! Field names follow the JSON the homeserver speaks. Request types omit
//! every unset field so defaulting stays with the server.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Megolm algorithm written into `m.room.encryption`.
pub const ENCRYPTION_ALGORITHM: &str = "m.megolm.v1.aes-sha2";

/// `creation_content.type` marking a room as a space.
pub const SPACE_ROOM_TYPE: &str = "m.space";

/// State event types the client reads and writes.
pub mod event_type {
    pub const NAME: &str = "m.room.name";
    pub const TOPIC: &str = "m.room.topic";
    pub const AVATAR: &str = "m.room.avatar";
    pub const CANONICAL_ALIAS: &str = "m.room.canonical_alias";
    pub const POWER_LEVELS: &str = "m.room.power_levels";
    pub const GUEST_ACCESS: &str = "m.room.guest_access";
    pub const HISTORY_VISIBILITY: &str = "m.room.history_visibility";
    pub const JOIN_RULES: &str = "m.room.join_rules";
    pub const ENCRYPTION: &str = "m.room.encryption";
    pub const SPACE_CHILD: &str = "m.space.child";
}

// ----------------------------------------------------------------------------
// Users
// ----------------------------------------------------------------------------

/// A user account as reported by the homeserver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "name")]
    pub user_id: String,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub admin: bool,
    #[serde(default, deserialize_with = "flag")]
    pub deactivated: bool,
    #[serde(default, deserialize_with = "flag")]
    pub shadow_banned: bool,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub creation_ts: Option<i64>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub last_seen_ts: Option<i64>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub threepids: Vec<ThreePid>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A third-party identifier (email, phone number) bound to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreePid {
    pub medium: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<i64>,
}

/// A device logged in to a user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_seen_ip: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub last_seen_ts: Option<i64>,
}

/// Create or modify a user through the admin API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserRequest {
    /// Carried in the request path.
    #[serde(skip)]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threepids: Option<Vec<ThreePid>>,
}

/// Profile as served by the client-server API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct Profile {
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
}

// ----------------------------------------------------------------------------
// Rooms
// ----------------------------------------------------------------------------

/// A room as reported by the homeserver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub canonical_alias: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub creation_ts: Option<i64>,
    #[serde(default)]
    pub room_version: Option<String>,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub joined_members: u64,
    #[serde(default)]
    pub invited_members: u64,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub guest_access: Option<String>,
    #[serde(default)]
    pub history_visibility: Option<String>,
    #[serde(default)]
    pub join_rules: Option<String>,
    #[serde(default)]
    pub encryption: bool,
    #[serde(default)]
    pub power_levels: Option<PowerLevelContent>,
}

/// Room details from the admin API.
#[derive(Debug, Deserialize)]
pub(crate) struct AdminRoomDetails {
    room_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    canonical_alias: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    room_type: Option<String>,
    #[serde(default)]
    joined_members: u64,
    #[serde(default)]
    invited_members: u64,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    guest_access: Option<String>,
    #[serde(default)]
    history_visibility: Option<String>,
    #[serde(default)]
    join_rules: Option<String>,
    /// Algorithm name, `null` when unencrypted.
    #[serde(default)]
    encryption: Option<String>,
}

impl From<AdminRoomDetails> for Room {
    fn from(details: AdminRoomDetails) -> Self {
        Self {
            room_id: details.room_id,
            name: details.name,
            topic: details.topic,
            canonical_alias: details.canonical_alias,
            avatar: details.avatar,
            creator: details.creator,
            creation_ts: None,
            room_version: details.version,
            room_type: details.room_type,
            joined_members: details.joined_members,
            invited_members: details.invited_members,
            visibility: Some(if details.public { "public" } else { "private" }.to_string()),
            guest_access: details.guest_access,
            history_visibility: details.history_visibility,
            join_rules: details.join_rules,
            encryption: details.encryption.is_some_and(|algorithm| !algorithm.is_empty()),
            power_levels: None,
        }
    }
}

/// A state event passed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub state_key: String,
    #[serde(default)]
    pub content: Value,
}

/// Everything needed to create or reconfigure a room.
///
/// The first group of fields goes into the `createRoom` body; the second
/// group is applied afterwards as individual state events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomRequest {
    pub name: Option<String>,
    pub topic: Option<String>,
    /// Localpart of the alias to create alongside the room.
    pub room_alias_name: Option<String>,
    pub preset: Option<String>,
    pub visibility: Option<String>,
    pub room_version: Option<String>,
    pub creation_content: Option<Map<String, Value>>,
    pub initial_state: Vec<StateEvent>,
    pub invite: Vec<String>,
    pub power_level_content_override: Option<PowerLevelContent>,

    pub guest_access: Option<String>,
    pub history_visibility: Option<String>,
    pub join_rules: Option<String>,
    pub encryption: Option<bool>,
    pub avatar_url: Option<String>,
}

/// `POST /createRoom` body.
#[derive(Debug, Serialize)]
pub(crate) struct CreateRoomBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_alias_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_content: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub initial_state: &'a [StateEvent],
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub invite: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_level_content_override: Option<&'a PowerLevelContent>,
}

impl<'a> From<&'a RoomRequest> for CreateRoomBody<'a> {
    fn from(request: &'a RoomRequest) -> Self {
        Self {
            name: request.name.as_deref(),
            topic: request.topic.as_deref(),
            room_alias_name: request.room_alias_name.as_deref(),
            preset: request.preset.as_deref(),
            visibility: request.visibility.as_deref(),
            room_version: request.room_version.as_deref(),
            creation_content: request.creation_content.as_ref(),
            initial_state: &request.initial_state,
            invite: &request.invite,
            power_level_content_override: request.power_level_content_override.as_ref(),
        }
    }
}

fn is_empty_slice<T>(slice: &&[T]) -> bool {
    slice.is_empty()
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedRoom {
    pub room_id: String,
}

// ----------------------------------------------------------------------------
// Power levels
// ----------------------------------------------------------------------------

/// Content of `m.room.power_levels`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLevelContent {
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
    /// Keys this client does not model, such as `notifications`. Kept so a
    /// read-modify-write does not drop them.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

// ----------------------------------------------------------------------------
// Aliases
// ----------------------------------------------------------------------------

/// An alias and the room it resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAlias {
    pub alias: String,
    pub room_id: String,
    #[serde(default)]
    pub servers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AliasResolution {
    pub room_id: String,
    #[serde(default)]
    pub servers: Vec<String>,
}

/// Content of `m.room.canonical_alias`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAlias {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alt_aliases: Vec<String>,
}

// ----------------------------------------------------------------------------
// Spaces
// ----------------------------------------------------------------------------

/// A room listed in a space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceChild {
    pub room_id: String,
    #[serde(default)]
    pub via: Vec<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub suggested: bool,
}

/// Content of `m.space.child`. Empty content removes the child.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct SpaceChildContent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suggested: bool,
}

/// A space: a room of type `m.space` plus its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    #[serde(flatten)]
    pub room: Room,
    #[serde(default)]
    pub children: Vec<SpaceChild>,
}

/// Create or reconfigure a space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceRequest {
    pub room: RoomRequest,
    /// `None` leaves the child list untouched on update.
    pub children: Option<Vec<SpaceChild>>,
}

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Standard Matrix error body.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MatrixErrorBody {
    #[serde(default)]
    pub errcode: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Synapse reports some booleans as `0`/`1`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
        Flag::Null(()) => false,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_user_from_admin_payload() -> Result<(), serde_json::Error> {
        let user: User = serde_json::from_value(json!({
            "name": "@alice:example.com",
            "displayname": "Alice",
            "admin": 1,
            "deactivated": false,
            "creation_ts": 1_700_000_000_000_i64,
            "threepids": [{"medium": "email", "address": "alice@example.com", "validated_at": 1}],
            "user_type": null
        }))?;

        assert_eq!(user.user_id, "@alice:example.com");
        assert!(user.admin);
        assert!(!user.deactivated);
        assert_eq!(user.threepids.len(), 1);
        assert_eq!(user.user_type, None);
        Ok(())
    }

    #[test]
    fn test_user_request_omits_unset_fields() -> Result<(), serde_json::Error> {
        let request = UserRequest {
            user_id: "@alice:example.com".into(),
            displayname: Some("Alice".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&request)?, json!({"displayname": "Alice"}));
        Ok(())
    }

    #[test]
    fn test_admin_room_details_conversion() -> Result<(), serde_json::Error> {
        let details: AdminRoomDetails = serde_json::from_value(json!({
            "room_id": "!r:x.com",
            "name": "Team",
            "version": "10",
            "public": false,
            "join_rules": "invite",
            "encryption": ENCRYPTION_ALGORITHM,
            "joined_members": 3
        }))?;
        let room = Room::from(details);

        assert_eq!(room.room_version.as_deref(), Some("10"));
        assert_eq!(room.visibility.as_deref(), Some("private"));
        assert!(room.encryption);
        assert_eq!(room.joined_members, 3);
        Ok(())
    }

    #[test]
    fn test_create_room_body_skips_follow_up_fields() -> Result<(), serde_json::Error> {
        let request = RoomRequest {
            name: Some("Team Discussion".into()),
            preset: Some("private_chat".into()),
            invite: vec!["@bob:x.com".into()],
            encryption: Some(true),
            join_rules: Some("invite".into()),
            ..Default::default()
        };

        let body = serde_json::to_value(CreateRoomBody::from(&request))?;
        assert_eq!(
            body,
            json!({
                "name": "Team Discussion",
                "preset": "private_chat",
                "invite": ["@bob:x.com"]
            })
        );
        Ok(())
    }

    #[test]
    fn test_power_levels_omit_unset() -> Result<(), serde_json::Error> {
        let content = PowerLevelContent {
            users: Some(BTreeMap::from([("@a:x.com".to_string(), 100)])),
            ban: Some(50),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&content)?,
            json!({"users": {"@a:x.com": 100}, "ban": 50})
        );
        Ok(())
    }

    #[test]
    fn test_space_child_removal_content_is_empty() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_value(SpaceChildContent::default())?, json!({}));
        Ok(())
    }
}
