//! The capability trait each resource kind implements.

use async_trait::async_trait;
use matrix_client::MatrixClient;

use crate::managed::Managed;

/// A managed object of kind `K`.
pub type Object<K> = Managed<<K as ResourceKind>::Parameters, <K as ResourceKind>::Observation>;

/// Outcome of a remote create.
#[derive(Debug, Clone)]
pub struct Created<R> {
    /// Identifier to record in the external-name annotation.
    pub external_name: String,
    /// Remote state returned by the create, if the call yields one.
    pub remote: Option<R>,
}

/// Everything the generic reconciler needs to know about one kind.
///
/// Wire calls return `matrix_client::Result`; the reconciler adds context.
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Desired state (`spec.forProvider`).
    type Parameters: Send + Sync;
    /// Observed state (`status.atProvider`).
    type Observation: Send + Sync + Default;
    /// Whatever `fetch` returns from the homeserver.
    type Remote: Send + Sync;

    /// Human name used in errors and logs, e.g. `room alias`.
    fn name(&self) -> &'static str;

    /// Identifier used to observe and update the remote entity.
    fn identifier(
        &self,
        object: &Managed<Self::Parameters, Self::Observation>,
    ) -> Option<String> {
        object.metadata.external_name().map(str::to_owned)
    }

    /// Identifier used to delete the remote entity.
    fn deletion_identifier(
        &self,
        object: &Managed<Self::Parameters, Self::Observation>,
    ) -> Option<String> {
        self.identifier(object)
    }

    /// A remote identifier recorded earlier that the declared parameters no
    /// longer name. The reconciler deletes it before converging.
    fn stale_identifier(
        &self,
        _object: &Managed<Self::Parameters, Self::Observation>,
    ) -> Option<String> {
        None
    }

    async fn fetch(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &Self::Parameters,
    ) -> matrix_client::Result<Self::Remote>;

    async fn create(
        &self,
        client: &dyn MatrixClient,
        params: &Self::Parameters,
    ) -> matrix_client::Result<Created<Self::Remote>>;

    async fn update(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &Self::Parameters,
    ) -> matrix_client::Result<Option<Self::Remote>>;

    async fn delete(
        &self,
        client: &dyn MatrixClient,
        id: &str,
        params: &Self::Parameters,
    ) -> matrix_client::Result<()>;

    fn observation(&self, remote: &Self::Remote) -> Self::Observation;

    /// Whether every declared parameter matches the remote state.
    fn is_up_to_date(&self, params: &Self::Parameters, remote: &Self::Remote) -> bool;
}
