//! Declarative objects loaded from YAML manifests.
//!
//! A manifest directory holds any number of `*.yaml`/`*.yml` files, each
//! with one or more `---` separated documents. Every document names its
//! `kind`. The store keeps what the reconcilers learned (external names,
//! status) across reloads, and in a state file across restarts.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use matrix_reconciler::{
    Condition, Managed, PowerLevelObservation, PowerLevelParameters, ProviderConfig,
    RoomAliasObservation, RoomAliasParameters, RoomObservation, RoomParameters, SpaceObservation,
    SpaceParameters, UserObservation, UserParameters,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub type UserObject = Managed<UserParameters, UserObservation>;
pub type RoomObject = Managed<RoomParameters, RoomObservation>;
pub type SpaceObject = Managed<SpaceParameters, SpaceObservation>;
pub type PowerLevelObject = Managed<PowerLevelParameters, PowerLevelObservation>;
pub type RoomAliasObject = Managed<RoomAliasParameters, RoomAliasObservation>;

/// One manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Manifest {
    User(UserObject),
    Room(RoomObject),
    Space(SpaceObject),
    PowerLevel(PowerLevelObject),
    RoomAlias(RoomAliasObject),
    ProviderConfig(ProviderConfig),
}

/// Manifest kinds, in the order objects are reconciled: accounts first,
/// then rooms, then what hangs off rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    ProviderConfig,
    User,
    Room,
    Space,
    PowerLevel,
    RoomAlias,
}

impl Kind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProviderConfig => "ProviderConfig",
            Self::User => "User",
            Self::Room => "Room",
            Self::Space => "Space",
            Self::PowerLevel => "PowerLevel",
            Self::RoomAlias => "RoomAlias",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an object in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: Kind,
    pub name: String,
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Take the new declaration, keep what was learned.
fn merge<P, O>(existing: &mut Managed<P, O>, declared: Managed<P, O>) {
    existing.api_version = declared.api_version;
    existing.spec = declared.spec;
    existing.metadata.namespace = declared.metadata.namespace;
    existing.metadata.annotations.extend(declared.metadata.annotations);
    existing.metadata.deletion_timestamp = declared.metadata.deletion_timestamp;
}

impl Manifest {
    pub const fn kind(&self) -> Kind {
        match self {
            Self::User(_) => Kind::User,
            Self::Room(_) => Kind::Room,
            Self::Space(_) => Kind::Space,
            Self::PowerLevel(_) => Kind::PowerLevel,
            Self::RoomAlias(_) => Kind::RoomAlias,
            Self::ProviderConfig(_) => Kind::ProviderConfig,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::User(o) => &o.metadata.name,
            Self::Room(o) => &o.metadata.name,
            Self::Space(o) => &o.metadata.name,
            Self::PowerLevel(o) => &o.metadata.name,
            Self::RoomAlias(o) => &o.metadata.name,
            Self::ProviderConfig(c) => &c.metadata.name,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            kind: self.kind(),
            name: self.name().to_string(),
        }
    }

    /// Provider config a managed object reconciles through.
    pub fn provider_config_name(&self) -> Option<&str> {
        match self {
            Self::User(o) => Some(o.provider_config_name()),
            Self::Room(o) => Some(o.provider_config_name()),
            Self::Space(o) => Some(o.provider_config_name()),
            Self::PowerLevel(o) => Some(o.provider_config_name()),
            Self::RoomAlias(o) => Some(o.provider_config_name()),
            Self::ProviderConfig(_) => None,
        }
    }

    /// Identifier of the remote counterpart, once one was recorded.
    pub fn external_name(&self) -> Option<&str> {
        match self {
            Self::User(o) => o.metadata.external_name(),
            Self::Room(o) => o.metadata.external_name(),
            Self::Space(o) => o.metadata.external_name(),
            Self::PowerLevel(o) => o.metadata.external_name(),
            Self::RoomAlias(o) => o.metadata.external_name(),
            Self::ProviderConfig(_) => None,
        }
    }

    pub fn set_condition(&mut self, condition: Condition) {
        match self {
            Self::User(o) => o.set_condition(condition),
            Self::Room(o) => o.set_condition(condition),
            Self::Space(o) => o.set_condition(condition),
            Self::PowerLevel(o) => o.set_condition(condition),
            Self::RoomAlias(o) => o.set_condition(condition),
            Self::ProviderConfig(_) => {}
        }
    }

    /// Mark a managed object for deletion. Provider configs have no remote
    /// counterpart and are dropped by the store directly.
    fn mark_deleted(&mut self) {
        match self {
            Self::User(o) => o.metadata.mark_deleted(),
            Self::Room(o) => o.metadata.mark_deleted(),
            Self::Space(o) => o.metadata.mark_deleted(),
            Self::PowerLevel(o) => o.metadata.mark_deleted(),
            Self::RoomAlias(o) => o.metadata.mark_deleted(),
            Self::ProviderConfig(_) => {}
        }
    }

    pub fn is_being_deleted(&self) -> bool {
        match self {
            Self::User(o) => o.metadata.is_being_deleted(),
            Self::Room(o) => o.metadata.is_being_deleted(),
            Self::Space(o) => o.metadata.is_being_deleted(),
            Self::PowerLevel(o) => o.metadata.is_being_deleted(),
            Self::RoomAlias(o) => o.metadata.is_being_deleted(),
            Self::ProviderConfig(_) => false,
        }
    }

    fn merge_from(&mut self, declared: Self) {
        match (self, declared) {
            (Self::User(o), Self::User(d)) => merge(o, d),
            (Self::Room(o), Self::Room(d)) => merge(o, d),
            (Self::Space(o), Self::Space(d)) => merge(o, d),
            (Self::PowerLevel(o), Self::PowerLevel(d)) => merge(o, d),
            (Self::RoomAlias(o), Self::RoomAlias(d)) => merge(o, d),
            (existing, declared) => *existing = declared,
        }
    }
}

/// Parse every document in one YAML string.
///
/// # Errors
///
/// Returns an error naming `path` if any document is malformed or of an
/// unknown kind.
pub fn parse_documents(path: &Path, contents: &str) -> Result<Vec<Manifest>> {
    serde_yaml::Deserializer::from_str(contents)
        .map(|document| {
            let value = serde_yaml::Value::deserialize(document)
                .map_err(|e| Error::parse_manifest(path, e))?;
            Ok((!value.is_null()).then_some(value))
        })
        .filter_map_ok(|value| value)
        .map(|value| {
            value.and_then(|v| {
                serde_yaml::from_value(v).map_err(|e| Error::parse_manifest(path, e))
            })
        })
        .collect()
}

/// Every manifest in `dir`, files in name order.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be read or parsed, or
/// if two documents declare the same kind and name.
pub fn load_dir(dir: &Path) -> Result<BTreeMap<ObjectKey, Manifest>> {
    let paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| Error::read_manifest(dir, e))?
        .map_ok(|entry| entry.path())
        .filter_ok(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::read_manifest(dir, e))?
        .into_iter()
        .sorted()
        .collect();

    let mut objects = BTreeMap::new();
    for path in paths {
        let contents = std::fs::read_to_string(&path).map_err(|e| Error::read_manifest(&path, e))?;
        for manifest in parse_documents(&path, &contents)? {
            let key = manifest.key();
            if objects.contains_key(&key) {
                return Err(Error::DuplicateObject {
                    kind: key.kind.as_str(),
                    name: key.name,
                    path,
                });
            }
            objects.insert(key, manifest);
        }
        debug!(path = %path.display(), "Loaded manifest file");
    }
    Ok(objects)
}

/// What a reload changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: usize,
    pub updated: usize,
    pub marked_for_deletion: usize,
}

/// Where the store persists managed objects by default: a sibling of the
/// manifest directory, e.g. `manifests.state.yaml` next to `manifests/`.
///
/// A directory without a name of its own (`.`) keeps a hidden file inside,
/// whose extension the manifest loader ignores.
pub fn default_state_path(dir: &Path) -> PathBuf {
    match dir.file_name() {
        Some(name) => {
            let mut file = name.to_os_string();
            file.push(".state.yaml");
            dir.with_file_name(file)
        }
        None => dir.join(".provider-matrix.state"),
    }
}

/// The objects the daemon reconciles.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
    state_path: PathBuf,
    restored: bool,
    objects: BTreeMap<ObjectKey, Manifest>,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            state_path: default_state_path(&dir),
            dir,
            restored: false,
            objects: BTreeMap::new(),
        }
    }

    /// Persist managed objects to `path` instead of the default location.
    #[must_use]
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Objects saved by an earlier run. A missing file means a fresh start.
    fn read_state(&self) -> Result<Vec<Manifest>> {
        let contents = match std::fs::read_to_string(&self.state_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::state(&self.state_path, e)),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_yaml::from_str(&contents).map_err(|e| Error::state_format(&self.state_path, e))
    }

    /// Write every managed object, external names and status included, to
    /// the state file. Provider configs are not saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn save(&self) -> Result<()> {
        let managed: Vec<&Manifest> = self
            .objects
            .values()
            .filter(|manifest| manifest.kind() != Kind::ProviderConfig)
            .collect();
        let contents =
            serde_yaml::to_string(&managed).map_err(|e| Error::state_format(&self.state_path, e))?;

        let staging = self.state_path.with_extension("tmp");
        std::fs::write(&staging, contents).map_err(|e| Error::state(&staging, e))?;
        std::fs::rename(&staging, &self.state_path).map_err(|e| Error::state(&self.state_path, e))?;

        debug!(path = %self.state_path.display(), objects = managed.len(), "State saved");
        Ok(())
    }

    /// Re-read the manifest directory.
    ///
    /// Declared objects replace the spec of known ones and keep their
    /// annotations and status. Managed objects no longer declared are
    /// marked for deletion; provider configs are dropped. The first reload
    /// starts from the objects in the state file, so anything removed while
    /// the daemon was down is still deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the state file cannot be loaded.
    /// The store is left unchanged in that case.
    pub fn reload(&mut self) -> Result<ReloadSummary> {
        let mut declared = load_dir(&self.dir)?;
        let mut summary = ReloadSummary::default();

        if !self.restored {
            let saved = self.read_state()?;
            info!(path = %self.state_path.display(), objects = saved.len(), "State restored");
            self.objects.extend(
                saved
                    .into_iter()
                    .filter(|manifest| manifest.kind() != Kind::ProviderConfig)
                    .map(|manifest| (manifest.key(), manifest)),
            );
            self.restored = true;
        }

        self.objects.retain(|key, existing| {
            match declared.remove(key) {
                Some(manifest) => {
                    existing.merge_from(manifest);
                    summary.updated = summary.updated.saturating_add(1);
                    true
                }
                None if key.kind == Kind::ProviderConfig => false,
                None => {
                    if !existing.is_being_deleted() {
                        existing.mark_deleted();
                        summary.marked_for_deletion = summary.marked_for_deletion.saturating_add(1);
                    }
                    true
                }
            }
        });

        summary.added = declared.len();
        self.objects.extend(declared);

        info!(
            dir = %self.dir.display(),
            added = summary.added,
            updated = summary.updated,
            marked_for_deletion = summary.marked_for_deletion,
            "Manifests reloaded"
        );
        Ok(summary)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Manifest> {
        self.objects.get(key)
    }

    pub fn get_mut(&mut self, key: &ObjectKey) -> Option<&mut Manifest> {
        self.objects.get_mut(key)
    }

    pub fn remove(&mut self, key: &ObjectKey) -> Option<Manifest> {
        self.objects.remove(key)
    }

    /// Keys in reconcile order.
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.objects.keys().cloned().collect()
    }

    pub fn provider_configs(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.objects.values().filter_map(|manifest| match manifest {
            Manifest::ProviderConfig(config) => Some(config),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM_AND_ALIAS: &str = r##"
kind: Room
metadata:
  name: team
spec:
  forProvider:
    name: Team
---
kind: RoomAlias
metadata:
  name: team-alias
spec:
  forProvider:
    alias: "#team:x.com"
    roomID: "!r:x.com"
"##;

    #[test]
    fn test_parse_multiple_documents() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let manifests = parse_documents(Path::new("team.yaml"), ROOM_AND_ALIAS)?;

        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests.first().map(Manifest::kind), Some(Kind::Room));
        assert_eq!(manifests.get(1).map(Manifest::name), Some("team-alias"));
        Ok(())
    }

    #[test]
    fn test_unknown_kind_names_the_file() {
        let contents = "kind: Widget\nmetadata:\n  name: w\n";
        let err = parse_documents(Path::new("bad.yaml"), contents).err();
        assert!(
            err.map(|e| e.to_string())
                .is_some_and(|msg| msg.contains("bad.yaml"))
        );
    }

    #[test]
    fn test_empty_documents_are_skipped() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let manifests = parse_documents(Path::new("empty.yaml"), "---\n---\n")?;
        assert!(manifests.is_empty());
        Ok(())
    }

    #[test]
    fn test_default_state_path_sits_beside_directory() {
        assert_eq!(
            default_state_path(Path::new("/etc/matrix/manifests")),
            PathBuf::from("/etc/matrix/manifests.state.yaml")
        );
        assert_eq!(
            default_state_path(Path::new(".")),
            PathBuf::from("./.provider-matrix.state")
        );
    }

    #[test]
    fn test_reconcile_order_puts_rooms_before_aliases() {
        let room = ObjectKey {
            kind: Kind::Room,
            name: "z".into(),
        };
        let alias = ObjectKey {
            kind: Kind::RoomAlias,
            name: "a".into(),
        };
        assert!(room < alias);
    }
}
