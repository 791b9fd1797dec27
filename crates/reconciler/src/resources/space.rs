//! Matrix spaces: rooms of type `m.space` with a list of child rooms.

use async_trait::async_trait;
use matrix_client::{MatrixClient, Space, SpaceChild, SpaceRequest};
use serde::{Deserialize, Serialize};

use super::room::{self, RoomObservation, RoomParameters};
use super::field_matches;
use crate::kind::{Created, ResourceKind};

/// Desired state of a space. Room fields sit at the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceParameters {
    #[serde(flatten)]
    pub room: RoomParameters,
    /// `None` leaves existing children alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SpaceChildParameters>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceChildParameters {
    #[serde(rename = "roomID")]
    pub room_id: String,
    /// Servers to join through. Defaults to the child room's own server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested: Option<bool>,
}

impl SpaceChildParameters {
    fn via(&self) -> Vec<String> {
        if !self.via.is_empty() {
            return self.via.clone();
        }
        match matrix_core::extract_domain(&self.room_id) {
            "" => Vec::new(),
            domain => vec![domain.to_string()],
        }
    }

    fn to_child(&self) -> SpaceChild {
        SpaceChild {
            room_id: self.room_id.clone(),
            via: self.via(),
            order: self.order.clone(),
            suggested: self.suggested.unwrap_or_default(),
        }
    }

    fn matches(&self, observed: &SpaceChild) -> bool {
        self.room_id == observed.room_id
            && (self.via.is_empty() || self.via == observed.via)
            && field_matches(self.order.as_deref(), observed.order.as_deref())
            && field_matches(self.suggested.as_ref(), Some(&observed.suggested))
    }
}

/// Observed state of a space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceObservation {
    #[serde(flatten)]
    pub room: RoomObservation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SpaceChildParameters>,
}

pub fn to_request(params: &SpaceParameters) -> SpaceRequest {
    SpaceRequest {
        room: room::to_request(&params.room),
        children: params
            .children
            .as_ref()
            .map(|children| children.iter().map(SpaceChildParameters::to_child).collect()),
    }
}

pub fn observation(space: &Space) -> SpaceObservation {
    SpaceObservation {
        room: room::observation(&space.room),
        children: space
            .children
            .iter()
            .map(|child| SpaceChildParameters {
                room_id: child.room_id.clone(),
                via: child.via.clone(),
                order: child.order.clone(),
                suggested: Some(child.suggested),
            })
            .collect(),
    }
}

pub fn is_up_to_date(params: &SpaceParameters, space: &Space) -> bool {
    room::is_up_to_date(&params.room, &space.room)
        && params.children.as_ref().is_none_or(|desired| {
            desired.len() == space.children.len()
                && desired
                    .iter()
                    .all(|d| space.children.iter().any(|observed| d.matches(observed)))
        })
}

/// Spaces are keyed by the server-assigned room ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaceKind;

#[async_trait]
impl ResourceKind for SpaceKind {
    type Parameters = SpaceParameters;
    type Observation = SpaceObservation;
    type Remote = Space;

    fn name(&self) -> &'static str {
        "space"
    }

    async fn fetch(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &SpaceParameters,
    ) -> matrix_client::Result<Space> {
        client.get_space(id).await
    }

    async fn create(
        &self,
        client: &dyn MatrixClient,
        params: &SpaceParameters,
    ) -> matrix_client::Result<Created<Space>> {
        let space = client.create_space(&to_request(params)).await?;
        Ok(Created {
            external_name: space.room.room_id.clone(),
            remote: Some(space),
        })
    }

    async fn update(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &SpaceParameters,
    ) -> matrix_client::Result<Option<Space>> {
        client.update_space(id, &to_request(params)).await.map(Some)
    }

    async fn delete(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &SpaceParameters,
    ) -> matrix_client::Result<()> {
        client.delete_room(id).await
    }

    fn observation(&self, remote: &Space) -> SpaceObservation {
        observation(remote)
    }

    fn is_up_to_date(&self, params: &SpaceParameters, remote: &Space) -> bool {
        is_up_to_date(params, remote)
    }
}
