//! The declarative object every reconciler works on.
//!
//! A managed object carries the caller's desired state under
//! `spec.forProvider` and the last observed remote state under
//! `status.atProvider`, plus the metadata needed to link the two.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API group and version of every managed kind.
pub const API_VERSION: &str = "matrix.crossplane.io/v1alpha1";

/// Annotation holding the remote identifier once it is known.
pub const EXTERNAL_NAME_ANNOTATION: &str = "crossplane.io/external-name";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Set once the object has been asked to go away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The recorded remote identifier, if any. Empty values count as unset.
    pub fn external_name(&self) -> Option<&str> {
        self.annotations
            .get(EXTERNAL_NAME_ANNOTATION)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn set_external_name(&mut self, name: impl Into<String>) {
        self.annotations
            .insert(EXTERNAL_NAME_ANNOTATION.to_string(), name.into());
    }

    pub fn clear_external_name(&mut self) {
        self.annotations.remove(EXTERNAL_NAME_ANNOTATION);
    }

    pub const fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Mark the object for deletion unless it already is.
    pub fn mark_deleted(&mut self) {
        if self.deletion_timestamp.is_none() {
            self.deletion_timestamp = Some(Utc::now());
        }
    }
}

/// What happens to the remote entity when the object is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

/// Reference to another object by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
}

/// Desired state plus provider plumbing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec<P> {
    pub for_provider: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<Reference>,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Observed state plus conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(
    serialize = "O: Serialize",
    deserialize = "O: Deserialize<'de> + Default"
))]
pub struct ResourceStatus<O> {
    #[serde(default)]
    pub at_provider: O,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// Whether the remote entity exists and is usable.
    Ready,
    /// Whether the last reconcile succeeded.
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

/// A status condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    fn new(condition_type: ConditionType, status: ConditionStatus, reason: &str) -> Self {
        Self {
            condition_type,
            status,
            reason: reason.to_string(),
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    pub fn available() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, "Available")
    }

    pub fn creating() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, "Creating")
    }

    pub fn deleting() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, "Deleting")
    }

    pub fn reconcile_success() -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::True, "ReconcileSuccess")
    }

    pub fn reconcile_error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(ConditionType::Synced, ConditionStatus::False, "ReconcileError")
        }
    }

    /// Same state, ignoring the transition time.
    fn same_state(&self, other: &Self) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// A managed object of one kind: `P` is the desired half, `O` the observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(
    serialize = "P: Serialize, O: Serialize",
    deserialize = "P: Deserialize<'de>, O: Deserialize<'de> + Default"
))]
pub struct Managed<P, O> {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub metadata: ObjectMeta,
    pub spec: ResourceSpec<P>,
    #[serde(default)]
    pub status: ResourceStatus<O>,
}

impl<P, O: Default> Managed<P, O> {
    /// A fresh object with no status.
    pub fn new(name: impl Into<String>, for_provider: P) -> Self {
        Self {
            api_version: default_api_version(),
            metadata: ObjectMeta::named(name),
            spec: ResourceSpec {
                for_provider,
                provider_config_ref: None,
                deletion_policy: DeletionPolicy::default(),
            },
            status: ResourceStatus::default(),
        }
    }
}

impl<P, O> Managed<P, O> {
    /// Replace the condition of the same type. The transition time only
    /// moves when the condition actually changes.
    pub fn set_condition(&mut self, condition: Condition) {
        let conditions = &mut self.status.conditions;
        match conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) if existing.same_state(&condition) => {}
            Some(existing) => *existing = condition,
            None => conditions.push(condition),
        }
    }

    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Name of the provider config this object uses.
    pub fn provider_config_name(&self) -> &str {
        self.spec
            .provider_config_ref
            .as_ref()
            .map_or("default", |r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Object = Managed<serde_json::Value, serde_json::Value>;

    #[test]
    fn test_external_name_ignores_empty() {
        let mut meta = ObjectMeta::named("alice");
        assert_eq!(meta.external_name(), None);

        meta.set_external_name("");
        assert_eq!(meta.external_name(), None);

        meta.set_external_name("@alice:example.com");
        assert_eq!(meta.external_name(), Some("@alice:example.com"));

        meta.clear_external_name();
        assert_eq!(meta.external_name(), None);
        assert!(meta.annotations.is_empty());
    }

    #[test]
    fn test_set_condition_keeps_transition_time() {
        let mut object = Object::new("room", serde_json::Value::Null);
        object.set_condition(Condition::available());
        let first = object
            .condition(ConditionType::Ready)
            .map(|c| c.last_transition_time);

        object.set_condition(Condition::available());
        let second = object
            .condition(ConditionType::Ready)
            .map(|c| c.last_transition_time);
        assert_eq!(first, second);

        object.set_condition(Condition::deleting());
        assert_eq!(object.status.conditions.len(), 1);
        assert_eq!(
            object.condition(ConditionType::Ready).map(|c| c.reason.as_str()),
            Some("Deleting")
        );
    }

    #[test]
    fn test_deserialize_without_status() -> Result<(), Box<dyn std::error::Error>> {
        let object: Object = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "team"},
            "spec": {"forProvider": {"name": "Team"}, "deletionPolicy": "Orphan"}
        }))?;

        assert_eq!(object.api_version, API_VERSION);
        assert_eq!(object.spec.deletion_policy, DeletionPolicy::Orphan);
        assert_eq!(object.provider_config_name(), "default");
        assert!(object.status.conditions.is_empty());
        Ok(())
    }
}
