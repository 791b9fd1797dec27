//! The reconciliation loop.
//!
//! Two clocks drive it: the sync interval reloads manifests and rebuilds
//! one client per provider config, the poll interval reconciles every
//! object in turn. Failures are logged and recorded on the object; the next
//! poll tries again.
//!
//! The store is saved whenever an object gains or loses its remote
//! counterpart, and again after every pass.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use matrix_client::{ClientConfig, HttpMatrixClient, MatrixClient};
use matrix_reconciler::{
    Condition, PowerLevelKind, ReconcileAction, Reconciler, ResourceKind, RoomAliasKind, RoomKind,
    SpaceKind, UserKind,
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestStore};

/// Builds a client from a resolved provider config.
pub type ClientFactory =
    Arc<dyn Fn(&ClientConfig) -> matrix_client::Result<Arc<dyn MatrixClient>> + Send + Sync>;

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Interval between drift checks.
    pub poll_interval: Duration,
    /// Interval between manifest reloads.
    pub sync_interval: Duration,
    /// Maximum reconciles per second.
    pub max_reconcile_rate: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            sync_interval: Duration::from_secs(3600),
            max_reconcile_rate: 100,
        }
    }
}

impl LoopConfig {
    /// Pause between two reconciles.
    pub fn pause(&self) -> Duration {
        Duration::from_secs(1)
            .checked_div(self.max_reconcile_rate.max(1))
            .unwrap_or_default()
    }
}

/// Outcome of one pass over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub succeeded: usize,
    pub failed: usize,
    /// Objects dropped after their remote counterpart was deleted.
    pub removed: usize,
}

/// Reconciliation loop over a manifest store.
pub struct ReconciliationLoop {
    store: ManifestStore,
    clients: HashMap<String, Arc<dyn MatrixClient>>,
    factory: ClientFactory,
    config: LoopConfig,
    ready: Arc<AtomicBool>,
}

impl ReconciliationLoop {
    /// Create a new loop with a custom client factory.
    pub fn new(store: ManifestStore, factory: ClientFactory, config: LoopConfig) -> Self {
        Self {
            store,
            clients: HashMap::new(),
            factory,
            config,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a loop that talks HTTP to real homeservers.
    pub fn with_http_clients(store: ManifestStore, config: LoopConfig) -> Self {
        let factory: ClientFactory = Arc::new(|config: &ClientConfig| {
            let client = HttpMatrixClient::new(config.clone())?;
            Ok(Arc::new(client) as Arc<dyn MatrixClient>)
        });
        Self::new(store, factory, config)
    }

    /// Flag that turns true once the first sync succeeded.
    pub fn readiness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.ready)
    }

    pub const fn store(&self) -> &ManifestStore {
        &self.store
    }

    fn save_state(&self) {
        if let Err(e) = self.store.save() {
            warn!(error = %e, "Failed to save state");
        }
    }

    /// Reload manifests and rebuild clients.
    ///
    /// A provider config that cannot be resolved is skipped; objects that
    /// use it fail until it is fixed.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest directory cannot be loaded.
    pub fn sync(&mut self) -> Result<()> {
        self.store.reload()?;

        let mut clients = HashMap::new();
        for provider_config in self.store.provider_configs() {
            let name = &provider_config.metadata.name;
            let client = provider_config
                .resolve()
                .map_err(Error::from)
                .and_then(|config| (self.factory)(&config).map_err(Error::from));
            match client {
                Ok(client) => {
                    clients.insert(name.clone(), client);
                }
                Err(e) => warn!(provider_config = %name, error = %e, "Skipping provider config"),
            }
        }

        info!(clients = clients.len(), objects = self.store.len(), "Sync complete");
        self.clients = clients;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Reconcile every object once, in store order.
    pub async fn reconcile_all(&mut self) -> PassStats {
        let mut stats = PassStats::default();
        let pause = self.config.pause();

        for key in self.store.keys() {
            let Some(manifest) = self.store.get_mut(&key) else {
                continue;
            };
            let Some(provider) = manifest.provider_config_name().map(str::to_owned) else {
                continue;
            };
            let external_name = manifest.external_name().map(str::to_owned);

            let result = match self.clients.get(&provider) {
                Some(client) => reconcile_manifest(Arc::clone(client), manifest).await,
                None => {
                    let err = Error::missing_provider_config(&provider);
                    manifest.set_condition(Condition::reconcile_error(err.to_string()));
                    Err(err)
                }
            };

            let identity_changed = manifest.external_name() != external_name.as_deref();

            match result {
                Ok(Some(action)) if action.is_terminal() => {
                    self.store.remove(&key);
                    self.save_state();
                    stats.removed = stats.removed.saturating_add(1);
                    stats.succeeded = stats.succeeded.saturating_add(1);
                }
                Ok(_) => stats.succeeded = stats.succeeded.saturating_add(1),
                Err(e) => {
                    warn!(object = %key, error = %e, "Reconcile failed");
                    stats.failed = stats.failed.saturating_add(1);
                }
            }
            if identity_changed {
                self.save_state();
            }

            tokio::time::sleep(pause).await;
        }

        self.save_state();
        debug!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            removed = stats.removed,
            "Pass complete"
        );
        stats
    }

    /// Run until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial sync fails. Later sync failures are
    /// logged and the previous state is kept.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.sync()?;

        let mut sync_ticker = interval(self.config.sync_interval);
        let mut poll_ticker = interval(self.config.poll_interval);
        sync_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of each fires immediately; the sync just happened.
        sync_ticker.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Reconciliation loop stopping");
                    return Ok(());
                }
                _ = sync_ticker.tick() => {
                    if let Err(e) = self.sync() {
                        warn!(error = %e, "Sync failed, keeping previous state");
                    }
                }
                _ = poll_ticker.tick() => {
                    self.reconcile_all().await;
                }
            }
        }
    }
}

async fn reconcile_with<K: ResourceKind>(
    kind: K,
    client: Arc<dyn MatrixClient>,
    object: &mut matrix_reconciler::Object<K>,
) -> Result<ReconcileAction> {
    Ok(Reconciler::new(kind, client).reconcile(object).await?)
}

/// Reconcile one manifest. Provider configs have nothing to reconcile.
///
/// # Errors
///
/// Returns the reconciler's error.
pub async fn reconcile_manifest(
    client: Arc<dyn MatrixClient>,
    manifest: &mut Manifest,
) -> Result<Option<ReconcileAction>> {
    let action = match manifest {
        Manifest::User(object) => reconcile_with(UserKind, client, object).await?,
        Manifest::Room(object) => reconcile_with(RoomKind, client, object).await?,
        Manifest::Space(object) => reconcile_with(SpaceKind, client, object).await?,
        Manifest::PowerLevel(object) => reconcile_with(PowerLevelKind, client, object).await?,
        Manifest::RoomAlias(object) => reconcile_with(RoomAliasKind, client, object).await?,
        Manifest::ProviderConfig(_) => return Ok(None),
    };
    Ok(Some(action))
}
