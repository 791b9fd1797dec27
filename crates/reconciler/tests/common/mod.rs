//! In-memory homeserver used by the reconciler tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use async_trait::async_trait;
use matrix_client::{
    CanonicalAlias, Error, M_NOT_FOUND, MatrixClient, PowerLevelContent, Result, Room, RoomAlias,
    RoomRequest, Space, SpaceChild, SpaceRequest, User, UserRequest,
};
use tokio::sync::Mutex;

/// Everything the fake homeserver knows, plus a log of calls in order.
#[derive(Debug, Default)]
pub struct FakeState {
    pub users: BTreeMap<String, User>,
    pub rooms: BTreeMap<String, Room>,
    pub children: BTreeMap<String, Vec<SpaceChild>>,
    pub power_levels: BTreeMap<String, PowerLevelContent>,
    pub aliases: BTreeMap<String, RoomAlias>,
    pub canonical: BTreeMap<String, CanonicalAlias>,
    pub calls: Vec<String>,
    next_room: u32,
}

#[derive(Debug, Default)]
pub struct FakeMatrixClient {
    pub state: Mutex<FakeState>,
    server_name: Option<String>,
}

fn not_found(operation: &'static str) -> Error {
    Error::api(operation, 404, Some(M_NOT_FOUND.to_string()), "not found")
}

impl FakeMatrixClient {
    pub fn new() -> Self {
        Self {
            server_name: Some("x.com".to_string()),
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn insert_room(&self, room: Room) {
        let mut state = self.state.lock().await;
        state.rooms.insert(room.room_id.clone(), room);
    }

    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.lock().await;
        state.users.insert(user.user_id.clone(), user);
    }

    pub async fn insert_alias(&self, alias: &str, room_id: &str) {
        let mut state = self.state.lock().await;
        state.aliases.insert(
            alias.to_string(),
            RoomAlias {
                alias: alias.to_string(),
                room_id: room_id.to_string(),
                servers: vec!["x.com".to_string()],
            },
        );
    }

    async fn record(&self, call: impl Into<String>) -> tokio::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().await;
        state.calls.push(call.into());
        state
    }
}

fn apply_room_request(room: &mut Room, request: &RoomRequest) {
    let fields = [
        (&mut room.name, &request.name),
        (&mut room.topic, &request.topic),
        (&mut room.guest_access, &request.guest_access),
        (&mut room.history_visibility, &request.history_visibility),
        (&mut room.join_rules, &request.join_rules),
        (&mut room.avatar, &request.avatar_url),
    ];
    for (field, value) in fields {
        if value.is_some() {
            field.clone_from(value);
        }
    }
    if let Some(encryption) = request.encryption {
        room.encryption = room.encryption || encryption;
    }
}

#[async_trait]
impl MatrixClient for FakeMatrixClient {
    fn server_name(&self) -> Option<String> {
        self.server_name.clone()
    }

    async fn create_user(&self, request: &UserRequest) -> Result<User> {
        let mut state = self.record(format!("create_user {}", request.user_id)).await;
        let user = User {
            user_id: request.user_id.clone(),
            displayname: request.displayname.clone(),
            avatar_url: request.avatar_url.clone(),
            admin: request.admin.unwrap_or_default(),
            deactivated: request.deactivated.unwrap_or_default(),
            user_type: request.user_type.clone(),
            ..User::default()
        };
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        let state = self.record(format!("get_user {user_id}")).await;
        state.users.get(user_id).cloned().ok_or_else(|| not_found("get user"))
    }

    async fn update_user(&self, request: &UserRequest) -> Result<User> {
        let mut state = self.record(format!("update_user {}", request.user_id)).await;
        let user = state
            .users
            .get_mut(&request.user_id)
            .ok_or_else(|| not_found("update user"))?;
        if request.displayname.is_some() {
            user.displayname.clone_from(&request.displayname);
        }
        if let Some(admin) = request.admin {
            user.admin = admin;
        }
        Ok(user.clone())
    }

    async fn deactivate_user(&self, user_id: &str) -> Result<()> {
        let mut state = self.record(format!("deactivate_user {user_id}")).await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found("deactivate user"))?;
        user.deactivated = true;
        Ok(())
    }

    async fn create_room(&self, request: &RoomRequest) -> Result<Room> {
        let mut state = self.record("create_room").await;
        state.next_room = state.next_room.saturating_add(1);
        let mut room = Room {
            room_id: format!("!room{}:x.com", state.next_room),
            ..Room::default()
        };
        apply_room_request(&mut room, request);
        state.rooms.insert(room.room_id.clone(), room.clone());
        Ok(room)
    }

    async fn get_room(&self, room_id: &str) -> Result<Room> {
        let state = self.record(format!("get_room {room_id}")).await;
        state.rooms.get(room_id).cloned().ok_or_else(|| not_found("get room"))
    }

    async fn update_room(&self, room_id: &str, request: &RoomRequest) -> Result<Room> {
        let mut state = self.record(format!("update_room {room_id}")).await;
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| not_found("update room"))?;
        apply_room_request(room, request);
        Ok(room.clone())
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        let mut state = self.record(format!("delete_room {room_id}")).await;
        state
            .rooms
            .remove(room_id)
            .map(|_| ())
            .ok_or_else(|| not_found("delete room"))
    }

    async fn create_space(&self, request: &SpaceRequest) -> Result<Space> {
        let room = self.create_room(&request.room).await?;
        let children = request.children.clone().unwrap_or_default();
        let mut state = self.record(format!("create_space {}", room.room_id)).await;
        state.children.insert(room.room_id.clone(), children.clone());
        Ok(Space { room, children })
    }

    async fn get_space(&self, space_id: &str) -> Result<Space> {
        let room = self.get_room(space_id).await?;
        let state = self.state.lock().await;
        let children = state.children.get(space_id).cloned().unwrap_or_default();
        Ok(Space { room, children })
    }

    async fn update_space(&self, space_id: &str, request: &SpaceRequest) -> Result<Space> {
        let room = self.update_room(space_id, &request.room).await?;
        let mut state = self.state.lock().await;
        if let Some(children) = &request.children {
            state.children.insert(space_id.to_string(), children.clone());
        }
        let children = state.children.get(space_id).cloned().unwrap_or_default();
        Ok(Space { room, children })
    }

    async fn set_power_levels(&self, room_id: &str, content: &PowerLevelContent) -> Result<()> {
        let mut state = self.record(format!("set_power_levels {room_id}")).await;
        if !state.rooms.contains_key(room_id) {
            return Err(not_found("set power levels"));
        }
        state.power_levels.insert(room_id.to_string(), content.clone());
        Ok(())
    }

    async fn get_power_levels(&self, room_id: &str) -> Result<PowerLevelContent> {
        let state = self.record(format!("get_power_levels {room_id}")).await;
        if !state.rooms.contains_key(room_id) {
            return Err(not_found("get power levels"));
        }
        Ok(state.power_levels.get(room_id).cloned().unwrap_or_default())
    }

    async fn create_room_alias(&self, alias: &str, room_id: &str) -> Result<()> {
        let mut state = self.record(format!("create_room_alias {alias} {room_id}")).await;
        if state.aliases.contains_key(alias) {
            return Err(Error::api(
                "create room alias",
                409,
                Some("M_UNKNOWN".to_string()),
                "Room alias already exists",
            ));
        }
        state.aliases.insert(
            alias.to_string(),
            RoomAlias {
                alias: alias.to_string(),
                room_id: room_id.to_string(),
                servers: vec!["x.com".to_string()],
            },
        );
        Ok(())
    }

    async fn get_room_alias(&self, alias: &str) -> Result<RoomAlias> {
        let state = self.record(format!("get_room_alias {alias}")).await;
        state
            .aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| not_found("resolve room alias"))
    }

    async fn delete_room_alias(&self, alias: &str) -> Result<()> {
        let mut state = self.record(format!("delete_room_alias {alias}")).await;
        state
            .aliases
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| not_found("delete room alias"))
    }

    async fn set_canonical_alias(&self, room_id: &str, content: &CanonicalAlias) -> Result<()> {
        let mut state = self.record(format!("set_canonical_alias {room_id}")).await;
        state.canonical.insert(room_id.to_string(), content.clone());
        Ok(())
    }

    async fn get_canonical_alias(&self, room_id: &str) -> Result<CanonicalAlias> {
        let state = self.record(format!("get_canonical_alias {room_id}")).await;
        state
            .canonical
            .get(room_id)
            .cloned()
            .ok_or_else(|| not_found("get canonical alias"))
    }
}
