//! State writes derived from a room request.
//!
//! Room creation sends the `createRoom` call first and then these writes one
//! by one. Updates send the same list prefixed with name and topic.

use serde_json::{Value, json};

use crate::types::{ENCRYPTION_ALGORITHM, RoomRequest, event_type};

/// One `PUT /rooms/{id}/state/{type}/` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateWrite {
    /// Operation name reported when the write fails.
    pub operation: &'static str,
    pub event_type: &'static str,
    pub content: Value,
}

impl StateWrite {
    fn new(operation: &'static str, event_type: &'static str, content: Value) -> Self {
        Self {
            operation,
            event_type,
            content,
        }
    }
}

/// Writes issued after `createRoom`, in order: guest access, history
/// visibility, join rules, encryption, avatar.
///
/// Encryption cannot be turned off once enabled, so only `Some(true)`
/// produces a write.
pub fn follow_up_writes(request: &RoomRequest) -> Vec<StateWrite> {
    [
        request.guest_access.as_ref().map(|value| {
            StateWrite::new(
                "set guest access",
                event_type::GUEST_ACCESS,
                json!({ "guest_access": value }),
            )
        }),
        request.history_visibility.as_ref().map(|value| {
            StateWrite::new(
                "set history visibility",
                event_type::HISTORY_VISIBILITY,
                json!({ "history_visibility": value }),
            )
        }),
        request.join_rules.as_ref().map(|value| {
            StateWrite::new(
                "set join rules",
                event_type::JOIN_RULES,
                json!({ "join_rule": value }),
            )
        }),
        request.encryption.filter(|enabled| *enabled).map(|_| {
            StateWrite::new(
                "set encryption",
                event_type::ENCRYPTION,
                json!({ "algorithm": ENCRYPTION_ALGORITHM }),
            )
        }),
        request.avatar_url.as_ref().map(|value| {
            StateWrite::new("set avatar", event_type::AVATAR, json!({ "url": value }))
        }),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Writes that bring an existing room in line with `request`.
pub fn update_writes(request: &RoomRequest) -> Vec<StateWrite> {
    let name = request
        .name
        .as_ref()
        .map(|value| StateWrite::new("set room name", event_type::NAME, json!({ "name": value })));
    let topic = request.topic.as_ref().map(|value| {
        StateWrite::new(
            "set room topic",
            event_type::TOPIC,
            json!({ "topic": value }),
        )
    });

    name.into_iter()
        .chain(topic)
        .chain(follow_up_writes(request))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_writes_for_empty_request() {
        assert!(follow_up_writes(&RoomRequest::default()).is_empty());
        assert!(update_writes(&RoomRequest::default()).is_empty());
    }

    #[test]
    fn test_encryption_only() -> Result<(), Box<dyn std::error::Error>> {
        let request = RoomRequest {
            name: Some("Team Discussion".into()),
            encryption: Some(true),
            ..Default::default()
        };
        let writes = follow_up_writes(&request);
        let [write] = writes.as_slice() else {
            return Err(format!("expected one write, got {}", writes.len()).into());
        };
        assert_eq!(write.event_type, event_type::ENCRYPTION);
        assert_eq!(write.content, json!({"algorithm": ENCRYPTION_ALGORITHM}));
        Ok(())
    }

    #[test]
    fn test_disabling_encryption_writes_nothing() {
        let request = RoomRequest {
            encryption: Some(false),
            ..Default::default()
        };
        assert!(follow_up_writes(&request).is_empty());
    }

    #[test]
    fn test_follow_up_order() {
        let request = RoomRequest {
            guest_access: Some("forbidden".into()),
            history_visibility: Some("shared".into()),
            join_rules: Some("invite".into()),
            encryption: Some(true),
            avatar_url: Some("mxc://x.com/abc".into()),
            ..Default::default()
        };
        let operations: Vec<_> = follow_up_writes(&request)
            .into_iter()
            .map(|write| write.operation)
            .collect();
        assert_eq!(
            operations,
            [
                "set guest access",
                "set history visibility",
                "set join rules",
                "set encryption",
                "set avatar"
            ]
        );
    }

    #[test]
    fn test_update_prefixes_name_and_topic() {
        let request = RoomRequest {
            name: Some("Renamed".into()),
            topic: Some("New topic".into()),
            join_rules: Some("public".into()),
            ..Default::default()
        };
        let types: Vec<_> = update_writes(&request)
            .into_iter()
            .map(|write| write.event_type)
            .collect();
        assert_eq!(
            types,
            [event_type::NAME, event_type::TOPIC, event_type::JOIN_RULES]
        );
    }
}
