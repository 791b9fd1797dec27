//! Room aliases.
//!
//! The alias string is the identity. Matrix cannot retarget an alias, so an
//! update deletes it and creates it again. If the process stops between the
//! two calls the alias is absent until the next reconcile recreates it.

use async_trait::async_trait;
use itertools::Itertools;
use matrix_client::{CanonicalAlias, MatrixClient, RoomAlias};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::kind::{Created, ResourceKind};
use crate::managed::Managed;

/// Desired state of an alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAliasParameters {
    /// Full alias, e.g. `#general:example.com`.
    pub alias: String,
    #[serde(rename = "roomID")]
    pub room_id: String,
    /// Also publish the alias as the room's canonical alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_as_canonical: Option<bool>,
    /// Alternative aliases written with the canonical alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_aliases: Option<Vec<String>>,
}

impl RoomAliasParameters {
    fn wants_canonical(&self) -> bool {
        self.set_as_canonical.unwrap_or_default()
    }
}

/// Observed state of an alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomAliasObservation {
    pub alias: String,
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub is_canonical: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<String>,
}

/// The resolved alias plus the target room's canonical alias event, when
/// it could be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasState {
    pub alias: RoomAlias,
    pub canonical: Option<CanonicalAlias>,
}

impl AliasState {
    fn is_canonical(&self) -> bool {
        self.canonical
            .as_ref()
            .and_then(|c| c.alias.as_deref())
            .is_some_and(|alias| alias == self.alias.alias)
    }
}

pub fn observation(state: &AliasState) -> RoomAliasObservation {
    RoomAliasObservation {
        alias: state.alias.alias.clone(),
        room_id: state.alias.room_id.clone(),
        is_canonical: state.is_canonical(),
        servers: state.alias.servers.clone(),
    }
}

pub fn is_up_to_date(params: &RoomAliasParameters, state: &AliasState) -> bool {
    if state.alias.room_id != params.room_id {
        return false;
    }
    if !params.wants_canonical() {
        return true;
    }

    let alt_aliases_match = params.alt_aliases.as_ref().is_none_or(|desired| {
        let observed = state
            .canonical
            .as_ref()
            .map(|c| c.alt_aliases.as_slice())
            .unwrap_or_default();
        desired.iter().sorted().eq(observed.iter().sorted())
    });

    state.is_canonical() && alt_aliases_match
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoomAliasKind;

impl RoomAliasKind {
    async fn bind(
        client: &dyn MatrixClient,
        alias: &str,
        params: &RoomAliasParameters,
    ) -> matrix_client::Result<()> {
        client.create_room_alias(alias, &params.room_id).await?;

        if params.wants_canonical() {
            let existing = match client.get_canonical_alias(&params.room_id).await {
                Ok(existing) => existing,
                Err(e) if e.is_not_found() => CanonicalAlias::default(),
                Err(e) => return Err(e),
            };
            let content = CanonicalAlias {
                alias: Some(alias.to_string()),
                alt_aliases: params.alt_aliases.clone().unwrap_or(existing.alt_aliases),
            };
            client.set_canonical_alias(&params.room_id, &content).await?;
            debug!(alias, room_id = %params.room_id, "Canonical alias set");
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceKind for RoomAliasKind {
    type Parameters = RoomAliasParameters;
    type Observation = RoomAliasObservation;
    type Remote = AliasState;

    fn name(&self) -> &'static str {
        "room alias"
    }

    fn identifier(
        &self,
        object: &Managed<RoomAliasParameters, RoomAliasObservation>,
    ) -> Option<String> {
        Some(object.spec.for_provider.alias.clone()).filter(|alias| !alias.is_empty())
    }

    /// The alias that was actually created, which may differ from the
    /// declared one if the spec changed since.
    fn deletion_identifier(
        &self,
        object: &Managed<RoomAliasParameters, RoomAliasObservation>,
    ) -> Option<String> {
        object
            .metadata
            .external_name()
            .map(str::to_owned)
            .or_else(|| self.identifier(object))
    }

    /// The previously created alias once the declared alias moves on.
    fn stale_identifier(
        &self,
        object: &Managed<RoomAliasParameters, RoomAliasObservation>,
    ) -> Option<String> {
        let declared = self.identifier(object)?;
        object
            .metadata
            .external_name()
            .filter(|created| *created != declared)
            .map(str::to_owned)
    }

    async fn fetch(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &RoomAliasParameters,
    ) -> matrix_client::Result<AliasState> {
        let alias = client.get_room_alias(id).await?;
        let canonical = match client.get_canonical_alias(&alias.room_id).await {
            Ok(canonical) => Some(canonical),
            Err(e) => {
                debug!(room_id = %alias.room_id, error = %e, "No canonical alias");
                None
            }
        };
        Ok(AliasState { alias, canonical })
    }

    async fn create(
        &self,
        client: &dyn MatrixClient,
        params: &RoomAliasParameters,
    ) -> matrix_client::Result<Created<AliasState>> {
        Self::bind(client, &params.alias, params).await?;
        Ok(Created {
            external_name: params.alias.clone(),
            remote: None,
        })
    }

    async fn update(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &RoomAliasParameters,
    ) -> matrix_client::Result<Option<AliasState>> {
        match client.delete_room_alias(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(alias = id, "Alias already gone"),
            Err(e) => return Err(e),
        }
        Self::bind(client, id, params).await?;
        info!(alias = id, room_id = %params.room_id, "Alias retargeted");
        Ok(None)
    }

    async fn delete(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        _params: &RoomAliasParameters,
    ) -> matrix_client::Result<()> {
        client.delete_room_alias(id).await
    }

    fn observation(&self, remote: &AliasState) -> RoomAliasObservation {
        observation(remote)
    }

    fn is_up_to_date(&self, params: &RoomAliasParameters, remote: &AliasState) -> bool {
        is_up_to_date(params, remote)
    }
}
