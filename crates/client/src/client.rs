//! Matrix client for the reconcilers.
//!
//! This module provides the [`MatrixClient`] trait the reconcilers are written
//! against and [`HttpMatrixClient`], its implementation over the
//! client-server API plus the optional Synapse admin API.

use std::sync::Arc;

use async_trait::async_trait;
use matrix_core::{RoomAliasId, RoomId, UserId};
use reqwest::Method;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::admin::AdminApi;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::state::{StateWrite, follow_up_writes, update_writes};
use crate::transport::{Transport, build_http_client};
use crate::types::{
    AliasResolution, CanonicalAlias, CreateRoomBody, CreatedRoom, PowerLevelContent, Profile,
    Room, RoomAlias, RoomRequest, SPACE_ROOM_TYPE, Space, SpaceChild, SpaceChildContent,
    SpaceRequest, StateEvent, User, UserRequest, event_type,
};

/// Typed operations against a homeserver.
#[async_trait]
pub trait MatrixClient: Send + Sync {
    /// Server name used to qualify bare localparts.
    fn server_name(&self) -> Option<String>;

    /// Create a user. Admin only.
    async fn create_user(&self, request: &UserRequest) -> Result<User>;

    /// Fetch a user.
    async fn get_user(&self, user_id: &str) -> Result<User>;

    /// Modify a user. Without admin mode only the profile can change.
    async fn update_user(&self, request: &UserRequest) -> Result<User>;

    /// Deactivate a user. Admin only.
    async fn deactivate_user(&self, user_id: &str) -> Result<()>;

    /// Create a room and apply its follow-up settings.
    async fn create_room(&self, request: &RoomRequest) -> Result<Room>;

    /// Fetch a room.
    async fn get_room(&self, room_id: &str) -> Result<Room>;

    /// Rewrite every set field of `request` onto an existing room.
    async fn update_room(&self, room_id: &str, request: &RoomRequest) -> Result<Room>;

    /// Purge a room. Admin only.
    async fn delete_room(&self, room_id: &str) -> Result<()>;

    /// Create a space and link its children.
    async fn create_space(&self, request: &SpaceRequest) -> Result<Space>;

    /// Fetch a space and its children.
    async fn get_space(&self, space_id: &str) -> Result<Space>;

    /// Reconfigure a space and, when declared, its child list.
    async fn update_space(&self, space_id: &str, request: &SpaceRequest) -> Result<Space>;

    /// Replace a room's power levels.
    async fn set_power_levels(&self, room_id: &str, content: &PowerLevelContent) -> Result<()>;

    /// Read a room's power levels.
    async fn get_power_levels(&self, room_id: &str) -> Result<PowerLevelContent>;

    /// Point `alias` at `room_id`.
    async fn create_room_alias(&self, alias: &str, room_id: &str) -> Result<()>;

    /// Resolve `alias`.
    async fn get_room_alias(&self, alias: &str) -> Result<RoomAlias>;

    /// Remove `alias` from the directory.
    async fn delete_room_alias(&self, alias: &str) -> Result<()>;

    /// Replace a room's canonical alias event.
    async fn set_canonical_alias(&self, room_id: &str, content: &CanonicalAlias) -> Result<()>;

    /// Read a room's canonical alias event.
    async fn get_canonical_alias(&self, room_id: &str) -> Result<CanonicalAlias>;
}

/// [`MatrixClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMatrixClient {
    config: Arc<ClientConfig>,
    standard: Transport,
    /// Present only in admin mode.
    admin: Option<AdminApi>,
}

impl HttpMatrixClient {
    /// Create a client for the configured homeserver.
    ///
    /// # Errors
    ///
    /// Fails when the access token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(&config)?;

        let admin = config.admin_mode.then(|| {
            if !config.server_type.supports_synapse_admin() {
                warn!(
                    server_type = %config.server_type,
                    "Admin mode uses Synapse admin paths which this server may not provide"
                );
            }
            AdminApi::new(Transport::new(http.clone(), config.admin_base().clone()))
        });

        info!(
            homeserver = %config.homeserver_url,
            admin_mode = config.admin_mode,
            "Matrix client configured"
        );

        Ok(Self {
            standard: Transport::new(http, config.homeserver_url.clone()),
            admin,
            config: Arc::new(config),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn admin(&self, operation: &'static str) -> Result<&AdminApi> {
        self.admin
            .as_ref()
            .ok_or(Error::admin_required(operation))
    }

    fn client_url(&self, segments: &[&str]) -> Result<Url> {
        let mut path = vec!["_matrix", "client", "v3"];
        path.extend_from_slice(segments);
        self.standard.url(&path)
    }

    async fn put_state<B: Serialize + Sync + ?Sized>(
        &self,
        operation: &'static str,
        room_id: &str,
        event_type: &str,
        state_key: &str,
        content: &B,
    ) -> Result<()> {
        let url = self.client_url(&["rooms", room_id, "state", event_type, state_key])?;
        let _: IgnoredAny = self
            .standard
            .send(operation, Method::PUT, url, content)
            .await?;
        Ok(())
    }

    async fn get_state<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        room_id: &str,
        event_type: &str,
        state_key: &str,
    ) -> Result<T> {
        let url = self.client_url(&["rooms", room_id, "state", event_type, state_key])?;
        self.standard.get(operation, url).await
    }

    async fn apply_writes(&self, room_id: &str, writes: &[StateWrite]) -> Result<()> {
        for write in writes {
            debug!(room_id, event_type = write.event_type, "Writing room state");
            self.put_state(write.operation, room_id, write.event_type, "", &write.content)
                .await?;
        }
        Ok(())
    }

    /// `createRoom` followed by the settings it cannot carry itself.
    async fn create_and_configure(&self, request: &RoomRequest) -> Result<String> {
        for user_id in &request.invite {
            UserId::try_from(user_id.as_str())?;
        }

        let url = self.client_url(&["createRoom"])?;
        let created: CreatedRoom = self
            .standard
            .send(
                "create room",
                Method::POST,
                url,
                &CreateRoomBody::from(request),
            )
            .await?;
        info!(room_id = %created.room_id, "Room created");

        self.apply_writes(&created.room_id, &follow_up_writes(request))
            .await
            .map_err(|e| Error::partial_setup(&created.room_id, e))?;

        Ok(created.room_id)
    }

    /// Assemble a room from individual state reads.
    ///
    /// A failed read leaves its field empty; a missing `m.room.encryption`
    /// event means the room is unencrypted. When every read fails the power
    /// level error is returned, so a missing room still reports not found.
    async fn read_room_state(&self, room_id: &str) -> Result<Room> {
        #[derive(serde::Deserialize)]
        struct Name {
            name: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct Topic {
            topic: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct Avatar {
            url: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct GuestAccess {
            guest_access: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct HistoryVisibility {
            history_visibility: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct JoinRules {
            join_rule: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct Encryption {
            algorithm: Option<String>,
        }

        let name = self
            .get_state::<Name>("get room name", room_id, event_type::NAME, "")
            .await;
        let topic = self
            .get_state::<Topic>("get room topic", room_id, event_type::TOPIC, "")
            .await;
        let alias = self.get_canonical_alias(room_id).await;
        let avatar = self
            .get_state::<Avatar>("get room avatar", room_id, event_type::AVATAR, "")
            .await;
        let guest_access = self
            .get_state::<GuestAccess>("get guest access", room_id, event_type::GUEST_ACCESS, "")
            .await;
        let history_visibility = self
            .get_state::<HistoryVisibility>(
                "get history visibility",
                room_id,
                event_type::HISTORY_VISIBILITY,
                "",
            )
            .await;
        let join_rules = self
            .get_state::<JoinRules>("get join rules", room_id, event_type::JOIN_RULES, "")
            .await;
        let encryption = self
            .get_state::<Encryption>("get encryption", room_id, event_type::ENCRYPTION, "")
            .await;
        let power_levels = self.get_power_levels(room_id).await;

        let all_failed = name.is_err()
            && topic.is_err()
            && alias.is_err()
            && avatar.is_err()
            && guest_access.is_err()
            && history_visibility.is_err()
            && join_rules.is_err()
            && encryption.is_err();
        let power_levels = match power_levels {
            Err(e) if all_failed => return Err(e),
            other => tolerate(room_id, other),
        };

        Ok(Room {
            room_id: room_id.to_string(),
            name: tolerate(room_id, name).and_then(|c| c.name),
            topic: tolerate(room_id, topic).and_then(|c| c.topic),
            canonical_alias: tolerate(room_id, alias).and_then(|c| c.alias),
            avatar: tolerate(room_id, avatar).and_then(|c| c.url),
            guest_access: tolerate(room_id, guest_access).and_then(|c| c.guest_access),
            history_visibility: tolerate(room_id, history_visibility)
                .and_then(|c| c.history_visibility),
            join_rules: tolerate(room_id, join_rules).and_then(|c| c.join_rule),
            encryption: tolerate(room_id, encryption).is_some_and(|c| c.algorithm.is_some()),
            power_levels,
            ..Room::default()
        })
    }

    /// Children listed through `m.space.child` events with a non-empty `via`.
    async fn space_children(&self, space_id: &str) -> Result<Vec<SpaceChild>> {
        let url = self.client_url(&["rooms", space_id, "state"])?;
        let events: Vec<StateEvent> = self.standard.get("get space children", url).await?;

        Ok(events
            .into_iter()
            .filter(|event| event.event_type == event_type::SPACE_CHILD)
            .filter_map(|event| {
                let content: SpaceChildContent = serde_json::from_value(event.content).ok()?;
                (!content.via.is_empty()).then(|| SpaceChild {
                    room_id: event.state_key,
                    via: content.via,
                    order: content.order,
                    suggested: content.suggested,
                })
            })
            .collect())
    }

    async fn set_space_child(&self, space_id: &str, child: &SpaceChild) -> Result<()> {
        let content = SpaceChildContent {
            via: child.via.clone(),
            order: child.order.clone(),
            suggested: child.suggested,
        };
        self.put_state(
            "set space child",
            space_id,
            event_type::SPACE_CHILD,
            &child.room_id,
            &content,
        )
        .await
    }

    async fn remove_space_child(&self, space_id: &str, child_id: &str) -> Result<()> {
        self.put_state(
            "remove space child",
            space_id,
            event_type::SPACE_CHILD,
            child_id,
            &SpaceChildContent::default(),
        )
        .await
    }
}

fn tolerate<T>(room_id: &str, result: Result<T>) -> Option<T> {
    result
        .map_err(|e| debug!(room_id, error = %e, "Ignoring failed state read"))
        .ok()
}

fn space_request_room(request: &SpaceRequest) -> RoomRequest {
    let mut room = request.room.clone();
    room.creation_content
        .get_or_insert_with(Default::default)
        .insert("type".to_string(), Value::from(SPACE_ROOM_TYPE));
    room
}

fn validate_children(request: &SpaceRequest) -> Result<()> {
    for child in request.children.iter().flatten() {
        RoomId::try_from(child.room_id.as_str())?;
    }
    Ok(())
}

#[async_trait]
impl MatrixClient for HttpMatrixClient {
    fn server_name(&self) -> Option<String> {
        self.config.server_name()
    }

    async fn create_user(&self, request: &UserRequest) -> Result<User> {
        let admin = self.admin("create user")?;
        UserId::try_from(request.user_id.as_str())?;

        admin.put_user("create user", request).await?;
        info!(user_id = %request.user_id, "User created");

        self.get_user(&request.user_id).await
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        let user_id = UserId::try_from(user_id)?;

        if let Some(admin) = &self.admin {
            return admin.get_user(&user_id).await;
        }

        let url = self.client_url(&["profile", user_id.as_str()])?;
        let profile: Profile = self.standard.get("get user profile", url).await?;
        Ok(User {
            user_id: user_id.into_string(),
            displayname: profile.displayname,
            avatar_url: profile.avatar_url,
            ..User::default()
        })
    }

    async fn update_user(&self, request: &UserRequest) -> Result<User> {
        UserId::try_from(request.user_id.as_str())?;

        if let Some(admin) = &self.admin {
            admin.put_user("update user", request).await?;
        } else {
            if let Some(displayname) = &request.displayname {
                let url = self.client_url(&["profile", &request.user_id, "displayname"])?;
                let _: IgnoredAny = self
                    .standard
                    .send(
                        "set display name",
                        Method::PUT,
                        url,
                        &json!({ "displayname": displayname }),
                    )
                    .await?;
            }
            if let Some(avatar_url) = &request.avatar_url {
                let url = self.client_url(&["profile", &request.user_id, "avatar_url"])?;
                let _: IgnoredAny = self
                    .standard
                    .send(
                        "set avatar URL",
                        Method::PUT,
                        url,
                        &json!({ "avatar_url": avatar_url }),
                    )
                    .await?;
            }
        }

        self.get_user(&request.user_id).await
    }

    async fn deactivate_user(&self, user_id: &str) -> Result<()> {
        let admin = self.admin("deactivate user")?;
        let user_id = UserId::try_from(user_id)?;

        admin.deactivate_user(&user_id).await?;
        info!(%user_id, "User deactivated");
        Ok(())
    }

    async fn create_room(&self, request: &RoomRequest) -> Result<Room> {
        let room_id = self.create_and_configure(request).await?;
        self.get_room(&room_id).await
    }

    async fn get_room(&self, room_id: &str) -> Result<Room> {
        let room_id = RoomId::try_from(room_id)?;

        if let Some(admin) = &self.admin {
            match admin.room_details(&room_id).await {
                Ok(room) => return Ok(room),
                Err(e) => debug!(%room_id, error = %e, "Admin room details failed, reading state"),
            }
        }

        self.read_room_state(room_id.as_str()).await
    }

    async fn update_room(&self, room_id: &str, request: &RoomRequest) -> Result<Room> {
        let room_id = RoomId::try_from(room_id)?;
        self.apply_writes(room_id.as_str(), &update_writes(request)).await?;
        self.get_room(room_id.as_str()).await
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        let admin = self.admin("delete room")?;
        let room_id = RoomId::try_from(room_id)?;

        admin.delete_room(&room_id).await?;
        info!(%room_id, "Room deleted");
        Ok(())
    }

    async fn create_space(&self, request: &SpaceRequest) -> Result<Space> {
        validate_children(request)?;

        let space_id = self.create_and_configure(&space_request_room(request)).await?;
        for child in request.children.iter().flatten() {
            self.set_space_child(&space_id, child)
                .await
                .map_err(|e| Error::partial_setup(&space_id, e))?;
        }

        self.get_space(&space_id).await
    }

    async fn get_space(&self, space_id: &str) -> Result<Space> {
        let room = self.get_room(space_id).await?;
        let children = self.space_children(space_id).await?;
        Ok(Space { room, children })
    }

    async fn update_space(&self, space_id: &str, request: &SpaceRequest) -> Result<Space> {
        RoomId::try_from(space_id)?;
        validate_children(request)?;

        self.apply_writes(space_id, &update_writes(&request.room))
            .await?;

        if let Some(desired) = &request.children {
            let current = self.space_children(space_id).await?;
            for child in desired {
                self.set_space_child(space_id, child).await?;
            }
            for stale in current
                .iter()
                .filter(|c| !desired.iter().any(|d| d.room_id == c.room_id))
            {
                self.remove_space_child(space_id, &stale.room_id).await?;
            }
        }

        self.get_space(space_id).await
    }

    async fn set_power_levels(&self, room_id: &str, content: &PowerLevelContent) -> Result<()> {
        RoomId::try_from(room_id)?;
        self.put_state(
            "set power levels",
            room_id,
            event_type::POWER_LEVELS,
            "",
            content,
        )
        .await
    }

    async fn get_power_levels(&self, room_id: &str) -> Result<PowerLevelContent> {
        RoomId::try_from(room_id)?;
        self.get_state("get power levels", room_id, event_type::POWER_LEVELS, "")
            .await
    }

    async fn create_room_alias(&self, alias: &str, room_id: &str) -> Result<()> {
        let alias = RoomAliasId::try_from(alias)?;
        let room_id = RoomId::try_from(room_id)?;

        let url = self.client_url(&["directory", "room", alias.as_str()])?;
        let _: IgnoredAny = self
            .standard
            .send(
                "create room alias",
                Method::PUT,
                url,
                &json!({ "room_id": room_id.as_str() }),
            )
            .await?;
        info!(%alias, %room_id, "Room alias created");
        Ok(())
    }

    async fn get_room_alias(&self, alias: &str) -> Result<RoomAlias> {
        let alias = RoomAliasId::try_from(alias)?;

        let url = self.client_url(&["directory", "room", alias.as_str()])?;
        let resolved: AliasResolution = self.standard.get("resolve room alias", url).await?;
        Ok(RoomAlias {
            alias: alias.into_string(),
            room_id: resolved.room_id,
            servers: resolved.servers,
        })
    }

    async fn delete_room_alias(&self, alias: &str) -> Result<()> {
        let alias = RoomAliasId::try_from(alias)?;

        let url = self.client_url(&["directory", "room", alias.as_str()])?;
        let _: IgnoredAny = self.standard.delete("delete room alias", url).await?;
        info!(%alias, "Room alias deleted");
        Ok(())
    }

    async fn set_canonical_alias(&self, room_id: &str, content: &CanonicalAlias) -> Result<()> {
        RoomId::try_from(room_id)?;
        for alias in content.alias.iter().chain(&content.alt_aliases) {
            RoomAliasId::try_from(alias.as_str())?;
        }

        self.put_state(
            "set canonical alias",
            room_id,
            event_type::CANONICAL_ALIAS,
            "",
            content,
        )
        .await
    }

    async fn get_canonical_alias(&self, room_id: &str) -> Result<CanonicalAlias> {
        RoomId::try_from(room_id)?;
        self.get_state(
            "get canonical alias",
            room_id,
            event_type::CANONICAL_ALIAS,
            "",
        )
        .await
    }
}
