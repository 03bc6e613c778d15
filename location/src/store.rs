//! Persistence of the location snapshot and the permission preference.
//!
//! Two fixed keys in the injected [`StorageAdapter`] back this crate. Reads
//! are always a full fetch-and-parse; a value that fails to parse is dropped
//! and removed rather than surfaced, and failed writes are logged and
//! swallowed. The in-memory state stays authoritative for the session either
//! way.

use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use shopkit_permission::PermissionPreference;
use shopkit_storage::StorageAdapter;

use crate::LocationSnapshot;

/// Storage key for the cached location snapshot.
pub const LOCATION_KEY: &str = "shopwise_user_location";

/// Storage key for the durable permission preference.
pub const PERMISSION_PREFERENCE_KEY: &str = "shopwise_user_location_permission_preference";

/// How long a persisted snapshot stays usable as a startup cache.
pub const SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Wire shape of the persisted snapshot. Accuracy is deliberately not
/// persisted; a re-hydrated snapshot reads back with `accuracy = None`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    latitude: f64,
    longitude: f64,
    timestamp: u64,
}

/// Load the persisted snapshot, regardless of age.
///
/// A malformed value is discarded: the key is removed, a warning is logged
/// and `None` is returned.
pub fn load_snapshot(storage: &dyn StorageAdapter) -> Option<LocationSnapshot> {
    let raw = match storage.get(LOCATION_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!("failed to read cached location: {err}");
            return None;
        }
    };

    match serde_json::from_str::<StoredSnapshot>(&raw) {
        Ok(stored) => Some(LocationSnapshot {
            latitude: stored.latitude,
            longitude: stored.longitude,
            accuracy: None,
            captured_at: stored.timestamp,
        }),
        Err(err) => {
            warn!("discarding corrupt cached location: {err}");
            if let Err(err) = storage.remove(LOCATION_KEY) {
                warn!("failed to remove corrupt cached location: {err}");
            }
            None
        }
    }
}

/// Persist `snapshot` under [`LOCATION_KEY`], replacing any previous value.
pub fn save_snapshot(storage: &dyn StorageAdapter, snapshot: &LocationSnapshot) {
    let stored = StoredSnapshot {
        latitude: snapshot.latitude,
        longitude: snapshot.longitude,
        timestamp: snapshot.captured_at,
    };
    match serde_json::to_string(&stored) {
        Ok(raw) => {
            if let Err(err) = storage.set(LOCATION_KEY, &raw) {
                warn!("failed to persist location snapshot: {err}");
            }
        }
        Err(err) => warn!("failed to serialize location snapshot: {err}"),
    }
}

/// Delete the persisted snapshot.
pub fn clear_snapshot(storage: &dyn StorageAdapter) {
    if let Err(err) = storage.remove(LOCATION_KEY) {
        warn!("failed to clear location snapshot: {err}");
    }
}

/// Load the durable permission preference. Absent or unreadable values read
/// as [`PermissionPreference::Unknown`].
pub fn load_preference(storage: &dyn StorageAdapter) -> PermissionPreference {
    match storage.get(PERMISSION_PREFERENCE_KEY) {
        Ok(Some(raw)) => PermissionPreference::from_stored(&raw),
        Ok(None) => PermissionPreference::Unknown,
        Err(err) => {
            warn!("failed to read permission preference: {err}");
            PermissionPreference::Unknown
        }
    }
}

/// Persist `preference`. [`PermissionPreference::Unknown`] has no stored
/// form and leaves the key untouched.
pub fn save_preference(storage: &dyn StorageAdapter, preference: PermissionPreference) {
    if let Some(stored) = preference.as_stored() {
        if let Err(err) = storage.set(PERMISSION_PREFERENCE_KEY, stored) {
            warn!("failed to persist permission preference: {err}");
        }
    }
}
