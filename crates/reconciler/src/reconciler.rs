//! Reconciler implementation.

use std::sync::Arc;

use matrix_client::MatrixClient;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::kind::{Object, ResourceKind};
use crate::managed::{Condition, DeletionPolicy};
use crate::types::{ExternalCreation, ExternalObservation, ReconcileAction};

/// Observe/Create/Update/Delete for one resource kind.
///
/// Holds no state of its own: everything it learns is written back onto the
/// object passed in.
pub struct Reconciler<K> {
    kind: K,
    client: Arc<dyn MatrixClient>,
}

impl<K: ResourceKind> Reconciler<K> {
    /// Create a new reconciler.
    pub fn new(kind: K, client: Arc<dyn MatrixClient>) -> Self {
        Self { kind, client }
    }

    /// Get the resource kind.
    pub const fn kind(&self) -> &K {
        &self.kind
    }

    fn context(&self, verb: &str) -> String {
        format!("cannot {verb} Matrix {}", self.kind.name())
    }

    /// Refresh `atProvider` and report whether the remote entity exists and
    /// matches the declared parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails for any reason other than the
    /// entity being absent.
    pub async fn observe(&self, object: &mut Object<K>) -> Result<ExternalObservation> {
        let Some(id) = self.kind.identifier(object) else {
            debug!(
                kind = self.kind.name(),
                name = %object.metadata.name,
                "No external identifier yet"
            );
            return Ok(ExternalObservation::absent());
        };

        let remote = match self
            .kind
            .fetch(&*self.client, &id, &object.spec.for_provider)
            .await
        {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                debug!(kind = self.kind.name(), id = %id, "Remote entity not found");
                return Ok(ExternalObservation::absent());
            }
            Err(e) => return Err(Error::client(self.context("get"), e)),
        };

        object.status.at_provider = self.kind.observation(&remote);
        object.set_condition(Condition::available());

        let up_to_date = self.kind.is_up_to_date(&object.spec.for_provider, &remote);
        debug!(kind = self.kind.name(), id = %id, up_to_date, "Observed");
        Ok(ExternalObservation::present(up_to_date))
    }

    /// Create the remote entity and record its identifier.
    ///
    /// A room that was created before a later setup step failed still gets
    /// its ID recorded, so the next cycle updates it instead of creating
    /// another.
    ///
    /// # Errors
    ///
    /// Returns an error if the create call fails.
    pub async fn create(&self, object: &mut Object<K>) -> Result<ExternalCreation> {
        object.set_condition(Condition::creating());

        let created = match self.kind.create(&*self.client, &object.spec.for_provider).await {
            Ok(created) => created,
            Err(e) => {
                if let Some(room_id) = e.created_room_id() {
                    object.metadata.set_external_name(room_id);
                    warn!(
                        kind = self.kind.name(),
                        name = %object.metadata.name,
                        external_name = room_id,
                        "Remote entity created but not fully configured"
                    );
                }
                return Err(Error::client(self.context("create"), e));
            }
        };

        let external_name_assigned =
            object.metadata.external_name() != Some(created.external_name.as_str());
        object.metadata.set_external_name(&created.external_name);

        if let Some(remote) = &created.remote {
            object.status.at_provider = self.kind.observation(remote);
        }

        info!(
            kind = self.kind.name(),
            name = %object.metadata.name,
            external_name = %created.external_name,
            "Created remote entity"
        );
        Ok(ExternalCreation {
            external_name_assigned,
        })
    }

    /// Push the declared parameters to the existing remote entity.
    ///
    /// # Errors
    ///
    /// Returns an error if no identifier is known or the update call fails.
    pub async fn update(&self, object: &mut Object<K>) -> Result<()> {
        let id = self
            .kind
            .identifier(object)
            .ok_or_else(|| Error::missing_identifier(self.kind.name(), &object.metadata.name))?;

        let remote = self
            .kind
            .update(&*self.client, &id, &object.spec.for_provider)
            .await
            .map_err(|e| Error::client(self.context("update"), e))?;

        if let Some(remote) = &remote {
            object.status.at_provider = self.kind.observation(remote);
        }

        info!(kind = self.kind.name(), id = %id, "Updated remote entity");
        Ok(())
    }

    /// Remove the remote entity. Nothing to remove, or a remote that is
    /// already gone, counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails for any other reason.
    pub async fn delete(&self, object: &mut Object<K>) -> Result<()> {
        let Some(id) = self.kind.deletion_identifier(object) else {
            debug!(kind = self.kind.name(), name = %object.metadata.name, "Nothing to delete");
            return Ok(());
        };

        object.set_condition(Condition::deleting());

        match self
            .kind
            .delete(&*self.client, &id, &object.spec.for_provider)
            .await
        {
            Ok(()) => {
                info!(kind = self.kind.name(), id = %id, "Deleted remote entity");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = self.kind.name(), id = %id, "Remote entity already gone");
                Ok(())
            }
            Err(e) => Err(Error::client(self.context("delete"), e)),
        }
    }

    /// One reconcile cycle: delete if the object is going away, otherwise
    /// observe then create or update as needed. The Synced condition
    /// reflects the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first failing verb's error.
    pub async fn reconcile(&self, object: &mut Object<K>) -> Result<ReconcileAction> {
        info!(
            kind = self.kind.name(),
            name = %object.metadata.name,
            "Starting reconciliation"
        );

        let result = if object.metadata.is_being_deleted() {
            self.finalize(object).await
        } else {
            self.converge(object).await
        };

        match &result {
            Ok(action) => {
                object.set_condition(Condition::reconcile_success());
                info!(
                    kind = self.kind.name(),
                    name = %object.metadata.name,
                    action = %action,
                    "Reconciliation complete"
                );
            }
            Err(e) => {
                object.set_condition(Condition::reconcile_error(e.to_string()));
                warn!(
                    kind = self.kind.name(),
                    name = %object.metadata.name,
                    error = %e,
                    "Reconciliation failed"
                );
            }
        }

        result
    }

    async fn finalize(&self, object: &mut Object<K>) -> Result<ReconcileAction> {
        if object.spec.deletion_policy == DeletionPolicy::Orphan {
            debug!(name = %object.metadata.name, "Orphaning remote entity");
            return Ok(ReconcileAction::Orphaned);
        }
        self.delete(object).await?;
        Ok(ReconcileAction::Deleted)
    }

    /// Drop a remote entity the object no longer points at, such as an
    /// alias whose declared name changed.
    async fn retire_stale(&self, object: &mut Object<K>) -> Result<()> {
        let Some(stale) = self.kind.stale_identifier(object) else {
            return Ok(());
        };

        if object.spec.deletion_policy == DeletionPolicy::Orphan {
            debug!(kind = self.kind.name(), id = %stale, "Orphaning superseded remote entity");
        } else {
            match self
                .kind
                .delete(&*self.client, &stale, &object.spec.for_provider)
                .await
            {
                Ok(()) => info!(kind = self.kind.name(), id = %stale, "Deleted superseded entity"),
                Err(e) if e.is_not_found() => {
                    debug!(kind = self.kind.name(), id = %stale, "Superseded entity already gone");
                }
                Err(e) => return Err(Error::client(self.context("delete"), e)),
            }
        }

        object.metadata.clear_external_name();
        Ok(())
    }

    async fn converge(&self, object: &mut Object<K>) -> Result<ReconcileAction> {
        self.retire_stale(object).await?;
        let observation = self.observe(object).await?;

        if !observation.resource_exists {
            self.create(object).await?;
            let external_name = object
                .metadata
                .external_name()
                .unwrap_or_default()
                .to_string();
            return Ok(ReconcileAction::Created { external_name });
        }

        if observation.resource_up_to_date {
            return Ok(ReconcileAction::UpToDate);
        }

        self.update(object).await?;
        Ok(ReconcileAction::Updated)
    }
}
