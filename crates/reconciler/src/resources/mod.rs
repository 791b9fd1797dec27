//! One `ResourceKind` per managed kind, with its parameters, observation,
//! mappers and equality check.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub mod power_level;
pub mod room;
pub mod room_alias;
pub mod space;
pub mod user;

pub use power_level::{
    PowerLevelKind, PowerLevelObservation, PowerLevelParameters, PowerLevelSettings,
    RoomPowerLevels,
};
pub use room::{RoomKind, RoomObservation, RoomParameters, StateEventParameters};
pub use room_alias::{AliasState, RoomAliasKind, RoomAliasObservation, RoomAliasParameters};
pub use space::{SpaceChildParameters, SpaceKind, SpaceObservation, SpaceParameters};
pub use user::{DeviceObservation, ExternalId, UserKind, UserObservation, UserParameters};

/// An unset desired value always matches.
pub(crate) fn field_matches<T: PartialEq + ?Sized>(
    desired: Option<&T>,
    observed: Option<&T>,
) -> bool {
    desired.is_none_or(|d| observed == Some(d))
}

/// An unset desired map always matches; a set one needs the same keys and
/// values, so extra observed keys count as drift.
pub(crate) fn map_matches(
    desired: Option<&BTreeMap<String, i64>>,
    observed: Option<&BTreeMap<String, i64>>,
) -> bool {
    desired.is_none_or(|desired| {
        let observed_len = observed.map_or(0, BTreeMap::len);
        desired.len() == observed_len
            && desired
                .iter()
                .all(|(key, value)| observed.and_then(|o| o.get(key)) == Some(value))
    })
}

/// Milliseconds since the epoch to a timestamp.
pub(crate) fn timestamp(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}
