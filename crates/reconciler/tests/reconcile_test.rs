//! Reconcile cycles against an in-memory homeserver.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::FakeMatrixClient;
use matrix_client::{MatrixClient, Room, User};
use matrix_reconciler::{
    ConditionStatus, ConditionType, DeletionPolicy, Managed, PowerLevelKind, PowerLevelParameters,
    PowerLevelSettings, ReconcileAction, Reconciler, ResourceKind, RoomAliasKind,
    RoomAliasParameters, RoomKind, RoomParameters, SpaceChildParameters, SpaceKind,
    SpaceParameters, UserKind, UserParameters,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn reconciler<K: ResourceKind>(kind: K, client: &Arc<FakeMatrixClient>) -> Reconciler<K> {
    let client: Arc<dyn MatrixClient> = client.clone();
    Reconciler::new(kind, client)
}

/// GIVEN a room object with no external name
/// WHEN it is observed
/// THEN it does not exist and no call reaches the homeserver
#[tokio::test]
async fn observe_without_identifier_makes_no_call() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(RoomKind, &client);
    let mut room = Managed::new("team", RoomParameters::default());

    let observation = reconciler.observe(&mut room).await?;

    assert!(!observation.resource_exists);
    assert!(client.calls().await.is_empty());
    Ok(())
}

/// GIVEN a room object whose external name points at a deleted room
/// WHEN it is observed
/// THEN it does not exist, which leads to a re-create
#[tokio::test]
async fn observe_missing_remote_reports_absent() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(RoomKind, &client);
    let mut room = Managed::new("team", RoomParameters::default());
    room.metadata.set_external_name("!gone:x.com");

    let observation = reconciler.observe(&mut room).await?;

    assert!(!observation.resource_exists);
    Ok(())
}

/// GIVEN a new room object
/// WHEN it is reconciled twice
/// THEN the first cycle creates it and records the room ID
/// AND the second cycle finds it up to date
#[tokio::test]
async fn room_is_created_then_up_to_date() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(RoomKind, &client);
    let mut room = Managed::new(
        "team",
        RoomParameters {
            name: Some("Team Discussion".into()),
            preset: Some("private_chat".into()),
            encryption_enabled: Some(true),
            invite: vec!["@bob:x.com".into()],
            ..RoomParameters::default()
        },
    );

    let first = reconciler.reconcile(&mut room).await?;
    let second = reconciler.reconcile(&mut room).await?;

    assert_eq!(
        first,
        ReconcileAction::Created {
            external_name: "!room1:x.com".into()
        }
    );
    assert_eq!(second, ReconcileAction::UpToDate);
    assert_eq!(room.metadata.external_name(), Some("!room1:x.com"));
    assert!(room.status.at_provider.encryption_enabled);
    assert_eq!(
        room.condition(ConditionType::Ready).map(|c| c.status),
        Some(ConditionStatus::True)
    );
    assert_eq!(
        room.condition(ConditionType::Synced).map(|c| c.status),
        Some(ConditionStatus::True)
    );
    Ok(())
}

/// GIVEN an existing room whose topic drifted
/// WHEN it is reconciled
/// THEN the room is updated
#[tokio::test]
async fn drifted_room_is_updated() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    client
        .insert_room(Room {
            room_id: "!r:x.com".into(),
            topic: Some("Old".into()),
            ..Room::default()
        })
        .await;
    let reconciler = reconciler(RoomKind, &client);
    let mut room = Managed::new(
        "team",
        RoomParameters {
            topic: Some("New".into()),
            ..RoomParameters::default()
        },
    );
    room.metadata.set_external_name("!r:x.com");

    let action = reconciler.reconcile(&mut room).await?;

    assert_eq!(action, ReconcileAction::Updated);
    assert_eq!(room.status.at_provider.topic.as_deref(), Some("New"));
    assert!(client.calls().await.contains(&"update_room !r:x.com".to_string()));
    Ok(())
}

/// GIVEN a user created from a localpart
/// WHEN the object is deleted
/// THEN the account is deactivated, not erased
#[tokio::test]
async fn user_delete_deactivates() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(UserKind, &client);
    let mut user = Managed::new(
        "alice",
        UserParameters {
            localpart: Some("alice".into()),
            display_name: Some("Alice".into()),
            ..UserParameters::default()
        },
    );

    let created = reconciler.create(&mut user).await?;
    assert!(created.external_name_assigned);
    assert_eq!(user.metadata.external_name(), Some("@alice:x.com"));

    user.metadata.mark_deleted();
    let action = reconciler.reconcile(&mut user).await?;
    assert_eq!(action, ReconcileAction::Deleted);

    let remote = client.get_user("@alice:x.com").await?;
    assert!(remote.deactivated);
    Ok(())
}

/// GIVEN an object with deletion policy Orphan
/// WHEN it is deleted
/// THEN the remote entity is left alone
#[tokio::test]
async fn orphan_policy_skips_remote_delete() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    client
        .insert_user(User {
            user_id: "@carol:x.com".into(),
            ..User::default()
        })
        .await;
    let reconciler = reconciler(UserKind, &client);
    let mut user = Managed::new("carol", UserParameters::default());
    user.metadata.set_external_name("@carol:x.com");
    user.spec.deletion_policy = DeletionPolicy::Orphan;
    user.metadata.mark_deleted();

    let action = reconciler.reconcile(&mut user).await?;

    assert_eq!(action, ReconcileAction::Orphaned);
    assert!(client.calls().await.is_empty());
    Ok(())
}

/// GIVEN a room that no longer exists
/// WHEN its object is deleted
/// THEN deletion succeeds
#[tokio::test]
async fn delete_of_missing_remote_succeeds() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(RoomKind, &client);
    let mut room = Managed::new("team", RoomParameters::default());
    room.metadata.set_external_name("!gone:x.com");

    reconciler.delete(&mut room).await?;

    assert_eq!(client.calls().await, vec!["delete_room !gone:x.com".to_string()]);
    Ok(())
}

/// GIVEN alias A bound to room R1
/// WHEN the desired room becomes R2
/// THEN the alias is deleted and then created pointing at R2
#[tokio::test]
async fn alias_update_deletes_then_creates() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    client.insert_alias("#general:x.com", "!r1:x.com").await;
    let reconciler = reconciler(RoomAliasKind, &client);
    let mut alias = Managed::new(
        "general",
        RoomAliasParameters {
            alias: "#general:x.com".into(),
            room_id: "!r2:x.com".into(),
            ..RoomAliasParameters::default()
        },
    );

    let action = reconciler.reconcile(&mut alias).await?;

    assert_eq!(action, ReconcileAction::Updated);
    let calls = client.calls().await;
    let delete = calls.iter().position(|c| c == "delete_room_alias #general:x.com");
    let create = calls
        .iter()
        .position(|c| c == "create_room_alias #general:x.com !r2:x.com");
    assert!(delete.is_some() && create.is_some() && delete < create);
    assert_eq!(client.get_room_alias("#general:x.com").await?.room_id, "!r2:x.com");
    Ok(())
}

/// GIVEN an alias that vanished between observe and update
/// WHEN the update runs
/// THEN the not-found delete is ignored and the alias is created
#[tokio::test]
async fn alias_update_continues_after_not_found_delete() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(RoomAliasKind, &client);
    let mut alias = Managed::new(
        "general",
        RoomAliasParameters {
            alias: "#general:x.com".into(),
            room_id: "!r2:x.com".into(),
            ..RoomAliasParameters::default()
        },
    );

    reconciler.update(&mut alias).await?;

    assert_eq!(
        client.calls().await,
        vec![
            "delete_room_alias #general:x.com".to_string(),
            "create_room_alias #general:x.com !r2:x.com".to_string(),
        ]
    );
    Ok(())
}

/// GIVEN alias #general created earlier
/// WHEN the declared alias is renamed to #lobby
/// THEN #general is deleted, #lobby is created and recorded
#[tokio::test]
async fn renamed_alias_replaces_old_one() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    client.insert_alias("#general:x.com", "!r1:x.com").await;
    let reconciler = reconciler(RoomAliasKind, &client);
    let mut alias = Managed::new(
        "general",
        RoomAliasParameters {
            alias: "#lobby:x.com".into(),
            room_id: "!r1:x.com".into(),
            ..RoomAliasParameters::default()
        },
    );
    alias.metadata.set_external_name("#general:x.com");

    let action = reconciler.reconcile(&mut alias).await?;

    assert_eq!(
        action,
        ReconcileAction::Created {
            external_name: "#lobby:x.com".into()
        }
    );
    let calls = client.calls().await;
    assert_eq!(
        calls.first().map(String::as_str),
        Some("delete_room_alias #general:x.com")
    );
    assert!(calls.contains(&"create_room_alias #lobby:x.com !r1:x.com".to_string()));
    assert!(client.get_room_alias("#general:x.com").await.is_err_and(|e| e.is_not_found()));
    assert_eq!(client.get_room_alias("#lobby:x.com").await?.room_id, "!r1:x.com");
    assert_eq!(alias.metadata.external_name(), Some("#lobby:x.com"));

    let again = reconciler.reconcile(&mut alias).await?;
    assert_eq!(again, ReconcileAction::UpToDate);
    Ok(())
}

/// GIVEN an orphaned alias whose declared name changed
/// WHEN it is reconciled
/// THEN the old alias is left in place and the new one is created
#[tokio::test]
async fn renamed_orphan_alias_keeps_old_one() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    client.insert_alias("#general:x.com", "!r1:x.com").await;
    let reconciler = reconciler(RoomAliasKind, &client);
    let mut alias = Managed::new(
        "general",
        RoomAliasParameters {
            alias: "#lobby:x.com".into(),
            room_id: "!r1:x.com".into(),
            ..RoomAliasParameters::default()
        },
    );
    alias.spec.deletion_policy = DeletionPolicy::Orphan;
    alias.metadata.set_external_name("#general:x.com");

    reconciler.reconcile(&mut alias).await?;

    assert!(!client.calls().await.iter().any(|c| c.starts_with("delete_room_alias")));
    assert_eq!(client.get_room_alias("#general:x.com").await?.room_id, "!r1:x.com");
    assert_eq!(alias.metadata.external_name(), Some("#lobby:x.com"));
    Ok(())
}

/// GIVEN an alias to be published as canonical
/// WHEN it is created
/// THEN the room's canonical alias event names it
#[tokio::test]
async fn alias_can_become_canonical() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(RoomAliasKind, &client);
    let mut alias = Managed::new(
        "general",
        RoomAliasParameters {
            alias: "#general:x.com".into(),
            room_id: "!r1:x.com".into(),
            set_as_canonical: Some(true),
            alt_aliases: Some(vec!["#chat:x.com".into()]),
        },
    );

    reconciler.reconcile(&mut alias).await?;
    let second = reconciler.reconcile(&mut alias).await?;

    let canonical = client.get_canonical_alias("!r1:x.com").await?;
    assert_eq!(canonical.alias.as_deref(), Some("#general:x.com"));
    assert_eq!(canonical.alt_aliases, vec!["#chat:x.com".to_string()]);
    assert_eq!(second, ReconcileAction::UpToDate);
    assert!(alias.status.at_provider.is_canonical);
    Ok(())
}

/// GIVEN a room with no users in its power levels
/// WHEN a PowerLevel object declares one user at 100
/// THEN it is not up to date and one power-level write follows
#[tokio::test]
async fn power_levels_key_count_drift() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    client
        .insert_room(Room {
            room_id: "!r:x.com".into(),
            ..Room::default()
        })
        .await;
    let reconciler = reconciler(PowerLevelKind, &client);
    let mut levels = Managed::new(
        "levels",
        PowerLevelParameters {
            room_id: "!r:x.com".into(),
            levels: PowerLevelSettings {
                users: Some(BTreeMap::from([("@a:x.com".to_string(), 100)])),
                ..PowerLevelSettings::default()
            },
        },
    );

    let observation = reconciler.observe(&mut levels).await?;
    assert!(observation.resource_exists);
    assert!(!observation.resource_up_to_date);

    reconciler.update(&mut levels).await?;

    let writes = client
        .calls()
        .await
        .into_iter()
        .filter(|c| c.starts_with("set_power_levels"))
        .count();
    assert_eq!(writes, 1);
    assert_eq!(levels.status.at_provider.users.get("@a:x.com"), Some(&100));
    Ok(())
}

/// GIVEN a PowerLevel object
/// WHEN it is deleted
/// THEN nothing is sent to the homeserver
#[tokio::test]
async fn power_level_delete_is_a_no_op() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(PowerLevelKind, &client);
    let mut levels = Managed::new(
        "levels",
        PowerLevelParameters {
            room_id: "!r:x.com".into(),
            ..PowerLevelParameters::default()
        },
    );

    reconciler.delete(&mut levels).await?;

    assert!(client.calls().await.is_empty());
    Ok(())
}

/// GIVEN an unreachable room
/// WHEN power levels are reconciled
/// THEN the failure is recorded on the Synced condition
#[tokio::test]
async fn failures_are_recorded_as_conditions() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(PowerLevelKind, &client);
    let mut levels = Managed::new(
        "levels",
        PowerLevelParameters {
            room_id: "!missing:x.com".into(),
            ..PowerLevelParameters::default()
        },
    );

    let result = reconciler.reconcile(&mut levels).await;

    assert!(result.is_err());
    let synced = levels.condition(ConditionType::Synced);
    assert_eq!(synced.map(|c| c.status), Some(ConditionStatus::False));
    assert!(
        synced
            .and_then(|c| c.message.as_deref())
            .is_some_and(|m| m.starts_with("cannot create Matrix power levels"))
    );
    Ok(())
}

/// GIVEN a space with one declared child
/// WHEN it is created and the children change
/// THEN the observation lists the declared children
#[tokio::test]
async fn space_children_follow_declaration() -> TestResult {
    let client = Arc::new(FakeMatrixClient::new());
    let reconciler = reconciler(SpaceKind, &client);
    let child = |room_id: &str| SpaceChildParameters {
        room_id: room_id.into(),
        ..SpaceChildParameters::default()
    };
    let mut space = Managed::new(
        "engineering",
        SpaceParameters {
            room: RoomParameters {
                name: Some("Engineering".into()),
                ..RoomParameters::default()
            },
            children: Some(vec![child("!a:x.com")]),
        },
    );

    reconciler.reconcile(&mut space).await?;
    assert_eq!(space.status.at_provider.children.len(), 1);
    let first_child = space.status.at_provider.children.first();
    assert_eq!(
        first_child.map(|c| c.via.clone()),
        Some(vec!["x.com".to_string()])
    );

    space.spec.for_provider.children = Some(vec![child("!a:x.com"), child("!b:x.com")]);
    let action = reconciler.reconcile(&mut space).await?;

    assert_eq!(action, ReconcileAction::Updated);
    assert_eq!(space.status.at_provider.children.len(), 2);
    Ok(())
}
