//! Synapse admin API calls.
//!
//! Identifiers arrive already parsed into their `matrix_core` types.

use matrix_core::{RoomId, UserId};
use reqwest::Method;
use serde::de::IgnoredAny;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;
use crate::transport::Transport;
use crate::types::{AdminRoomDetails, Device, DeviceList, Room, User, UserRequest};

#[derive(Debug, Clone)]
pub(crate) struct AdminApi {
    transport: Transport,
}

impl AdminApi {
    pub(crate) const fn new(transport: Transport) -> Self {
        Self { transport }
    }

    fn url(&self, version: &str, segments: &[&str]) -> Result<Url> {
        let mut path = vec!["_synapse", "admin", version];
        path.extend_from_slice(segments);
        self.transport.url(&path)
    }

    /// `PUT /_synapse/admin/v2/users/{id}` creates or modifies the account.
    pub(crate) async fn put_user(
        &self,
        operation: &'static str,
        request: &UserRequest,
    ) -> Result<()> {
        let url = self.url("v2", &["users", &request.user_id])?;
        let _: IgnoredAny = self
            .transport
            .send(operation, Method::PUT, url, request)
            .await?;
        Ok(())
    }

    /// Account details plus its devices. A failed device listing leaves the
    /// device list empty.
    pub(crate) async fn get_user(&self, user_id: &UserId) -> Result<User> {
        let url = self.url("v2", &["users", user_id.as_str()])?;
        let mut user: User = self.transport.get("get user", url).await?;

        match self.user_devices(user_id).await {
            Ok(devices) => user.devices = devices,
            Err(e) => warn!(%user_id, error = %e, "Could not list devices"),
        }

        Ok(user)
    }

    async fn user_devices(&self, user_id: &UserId) -> Result<Vec<Device>> {
        let url = self.url("v2", &["users", user_id.as_str(), "devices"])?;
        let list: DeviceList = self.transport.get("list user devices", url).await?;
        Ok(list.devices)
    }

    /// Deactivate without erasing messages.
    pub(crate) async fn deactivate_user(&self, user_id: &UserId) -> Result<()> {
        let url = self.url("v1", &["deactivate", user_id.as_str()])?;
        let _: IgnoredAny = self
            .transport
            .send(
                "deactivate user",
                Method::POST,
                url,
                &json!({ "erase": false }),
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn room_details(&self, room_id: &RoomId) -> Result<Room> {
        let url = self.url("v1", &["rooms", room_id.as_str()])?;
        let details: AdminRoomDetails = self.transport.get("get room details", url).await?;
        Ok(details.into())
    }

    /// Remove every local member and purge the room from the database.
    pub(crate) async fn delete_room(&self, room_id: &RoomId) -> Result<()> {
        let url = self.url("v1", &["rooms", room_id.as_str()])?;
        debug!(%room_id, "Purging room");
        let _: IgnoredAny = self
            .transport
            .send(
                "delete room",
                Method::DELETE,
                url,
                &json!({ "block": false, "purge": true }),
            )
            .await?;
        Ok(())
    }
}
