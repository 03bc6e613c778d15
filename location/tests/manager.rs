//! End-to-end tests for the location manager against scripted providers and
//! in-memory storage.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shopkit_location::store::{LOCATION_KEY, PERMISSION_PREFERENCE_KEY};
use shopkit_location::{
    AcquisitionOptions, FixedProvider, GeolocationProvider, LocationError, LocationEvent,
    LocationManager, LocationResult, PermissionState, PositionFix,
};
use shopkit_storage::{MemoryStorage, StorageAdapter};

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

fn seed_snapshot(storage: &MemoryStorage, latitude: f64, longitude: f64, timestamp: u64) {
    let raw = format!(
        "{{\"latitude\":{latitude},\"longitude\":{longitude},\"timestamp\":{timestamp}}}"
    );
    storage.set(LOCATION_KEY, &raw).unwrap();
}

/// Provider that pops one scripted response per call and counts calls.
struct ScriptedProvider {
    supported: bool,
    calls: AtomicUsize,
    responses: Mutex<VecDeque<LocationResult<PositionFix>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<LocationResult<PositionFix>>) -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            calls: AtomicUsize::new(0),
            responses: Mutex::new(responses.into()),
        })
    }

    fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: false,
            calls: AtomicUsize::new(0),
            responses: Mutex::new(VecDeque::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeolocationProvider for ScriptedProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn current_position(&self, _: &AcquisitionOptions) -> LocationResult<PositionFix> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LocationError::PositionUnavailable("unscripted call".into())))
    }
}

async fn manager_with(
    provider: Arc<dyn GeolocationProvider>,
    storage: Arc<MemoryStorage>,
) -> LocationManager {
    LocationManager::initialize(provider, storage, AcquisitionOptions::default()).await
}

#[tokio::test]
async fn fresh_cache_hydrates_without_a_platform_call() {
    let storage = Arc::new(MemoryStorage::new());
    seed_snapshot(&storage, 51.5, -0.12, now_millis() - 1_000);
    let provider = ScriptedProvider::new(vec![]);

    let manager = manager_with(provider.clone(), storage).await;

    let state = manager.state();
    let location = state.location.expect("cached location should hydrate");
    assert_eq!(location.latitude, 51.5);
    assert_eq!(location.longitude, -0.12);
    assert_eq!(location.accuracy, None);
    assert!(!state.loading);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn stale_cache_is_treated_as_absent() {
    let storage = Arc::new(MemoryStorage::new());
    let twenty_five_hours = Duration::from_secs(25 * 60 * 60).as_millis() as u64;
    seed_snapshot(&storage, 51.5, -0.12, now_millis() - twenty_five_hours);
    let provider = ScriptedProvider::new(vec![]);

    let manager = manager_with(provider, storage).await;

    let state = manager.state();
    assert_eq!(state.location, None);
    assert!(state.loading);
}

#[tokio::test]
async fn corrupt_cache_is_discarded_and_removed() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(LOCATION_KEY, "{\"latitude\":\"oops\"}").unwrap();
    let provider = ScriptedProvider::new(vec![]);

    let manager = manager_with(provider, storage.clone()).await;

    assert_eq!(manager.state().location, None);
    assert_eq!(storage.get(LOCATION_KEY).unwrap(), None);
}

#[tokio::test]
async fn successful_acquisition_matches_the_durable_snapshot() {
    let storage = Arc::new(MemoryStorage::new());
    let provider = ScriptedProvider::new(vec![Ok(PositionFix {
        latitude: 40.7128,
        longitude: -74.006,
        accuracy: Some(25.0),
    })]);

    let manager = manager_with(provider, storage.clone()).await;
    let snapshot = manager.current_position().await.unwrap();

    let state = manager.state();
    assert_eq!(state.location.as_ref(), Some(&snapshot));
    assert!(!state.loading);
    assert_eq!(state.error, None);
    assert!(state.permission_requested);

    let raw = storage.get(LOCATION_KEY).unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["latitude"], snapshot.latitude);
    assert_eq!(stored["longitude"], snapshot.longitude);
    assert_eq!(stored["timestamp"], snapshot.captured_at);
}

#[tokio::test]
async fn acquisition_optimistically_persists_a_granted_preference() {
    let storage = Arc::new(MemoryStorage::new());
    let provider = ScriptedProvider::new(vec![Ok(PositionFix {
        latitude: 0.0,
        longitude: 0.0,
        accuracy: None,
    })]);

    let manager = manager_with(provider, storage.clone()).await;
    manager.current_position().await.unwrap();

    assert_eq!(
        storage.get(PERMISSION_PREFERENCE_KEY).unwrap().as_deref(),
        Some("granted")
    );
}

#[tokio::test]
async fn permission_denial_persists_and_stops_auto_acquisition() {
    let storage = Arc::new(MemoryStorage::new());
    let provider = ScriptedProvider::new(vec![Err(LocationError::PermissionDenied(
        "User denied Geolocation".into(),
    ))]);

    let manager = manager_with(provider.clone(), storage.clone()).await;
    let error = manager.current_position().await.unwrap_err();
    assert_eq!(error.to_string(), "User denied Geolocation");

    let state = manager.state();
    assert_eq!(state.error, Some(error));
    assert!(!state.loading);
    assert_eq!(
        storage.get(PERMISSION_PREFERENCE_KEY).unwrap().as_deref(),
        Some("denied")
    );

    // A later activation with a denied preference must not re-prompt.
    drop(manager);
    let calls_before = provider.calls();
    let _manager = manager_with(provider.clone(), storage).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(provider.calls(), calls_before);
}

#[tokio::test]
async fn transient_failures_surface_without_touching_the_denied_preference() {
    let storage = Arc::new(MemoryStorage::new());
    let provider = ScriptedProvider::new(vec![Err(LocationError::Timeout(
        "Timeout expired".into(),
    ))]);

    let manager = manager_with(provider, storage.clone()).await;
    let error = manager.current_position().await.unwrap_err();

    assert_eq!(error, LocationError::Timeout("Timeout expired".into()));
    // The optimistic write stays granted; only a denial rewrites it.
    assert_eq!(
        storage.get(PERMISSION_PREFERENCE_KEY).unwrap().as_deref(),
        Some("granted")
    );
}

#[tokio::test]
async fn granted_preference_auto_acquires_on_activation() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(PERMISSION_PREFERENCE_KEY, "granted").unwrap();
    let provider = ScriptedProvider::new(vec![Ok(PositionFix {
        latitude: 1.23,
        longitude: 4.56,
        accuracy: Some(10.0),
    })]);

    let manager = manager_with(provider, storage).await;
    let mut changes = manager.subscribe();

    let state = changes
        .wait_for(|state| state.location.is_some())
        .await
        .unwrap()
        .clone();
    let location = state.location.unwrap();
    assert_eq!(location.latitude, 1.23);
    assert_eq!(location.longitude, 4.56);
    assert_eq!(location.accuracy, Some(10.0));
    assert_eq!(state.error, None);
    assert!(!state.loading);
}

#[tokio::test]
async fn unsupported_platform_short_circuits() {
    let storage = Arc::new(MemoryStorage::new());
    let provider = ScriptedProvider::unsupported();

    let manager = manager_with(provider.clone(), storage.clone()).await;
    assert!(!manager.is_supported());
    assert_eq!(
        manager.state().permission_state,
        PermissionState::Unsupported
    );

    let error = manager.current_position().await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "Geolocation is not supported by your browser"
    );

    let state = manager.state();
    assert!(!state.loading);
    assert_eq!(state.error, Some(LocationError::Unsupported));
    assert_eq!(provider.calls(), 0);

    // No capability means no prompt was engaged: nothing durable is
    // recorded, so a later activation will not auto-acquire either.
    assert!(!state.permission_requested);
    assert_eq!(storage.get(PERMISSION_PREFERENCE_KEY).unwrap(), None);
}

#[tokio::test]
async fn manual_location_overwrites_the_cache() {
    let storage = Arc::new(MemoryStorage::new());
    seed_snapshot(&storage, 10.0, 20.0, now_millis());
    let provider = ScriptedProvider::new(vec![]);

    let manager = manager_with(provider, storage.clone()).await;
    let before = now_millis();
    let snapshot = manager.set_manual_location(-33.86, 151.2);

    assert_eq!(snapshot.accuracy, None);
    assert!(snapshot.captured_at >= before);

    let state = manager.state();
    assert_eq!(state.location, Some(snapshot.clone()));
    assert!(!state.loading);
    assert_eq!(state.error, None);
    // No permission interaction.
    assert!(!state.permission_requested);
    assert_eq!(storage.get(PERMISSION_PREFERENCE_KEY).unwrap(), None);

    let raw = storage.get(LOCATION_KEY).unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["latitude"], -33.86);
    assert_eq!(stored["longitude"], 151.2);
}

#[tokio::test]
async fn clearing_removes_the_durable_snapshot() {
    let storage = Arc::new(MemoryStorage::new());
    seed_snapshot(&storage, 10.0, 20.0, now_millis());
    let provider = ScriptedProvider::new(vec![]);

    let manager = manager_with(provider.clone(), storage.clone()).await;
    assert!(manager.state().location.is_some());

    manager.clear_saved_location();
    let state = manager.state();
    assert_eq!(state.location, None);
    assert!(!state.loading);
    assert_eq!(state.error, None);
    assert_eq!(storage.get(LOCATION_KEY).unwrap(), None);

    // A following activation finds no cache.
    drop(manager);
    let manager = manager_with(provider, storage).await;
    assert_eq!(manager.state().location, None);
}

/// Provider whose calls resolve only when the test releases them, so request
/// ordering can be forced.
struct SequencedProvider {
    gates: Mutex<VecDeque<async_channel::Receiver<LocationResult<PositionFix>>>>,
}

#[async_trait]
impl GeolocationProvider for SequencedProvider {
    async fn current_position(&self, _: &AcquisitionOptions) -> LocationResult<PositionFix> {
        let gate = self
            .gates
            .lock()
            .unwrap()
            .pop_front()
            .expect("more calls than scripted gates");
        gate.recv().await.expect("gate dropped")
    }
}

#[tokio::test]
async fn only_the_most_recent_result_is_retained() {
    let (release_first, first_gate) = async_channel::bounded(1);
    let (release_second, second_gate) = async_channel::bounded(1);
    let provider = Arc::new(SequencedProvider {
        gates: Mutex::new(VecDeque::from([first_gate, second_gate])),
    });
    let storage = Arc::new(MemoryStorage::new());

    let manager = manager_with(provider, storage).await;

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.current_position().await })
    };
    tokio::task::yield_now().await;

    let second = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.current_position().await })
    };
    tokio::task::yield_now().await;

    // Resolve the newer request first, then let the stale one come back.
    release_second
        .send(Ok(PositionFix {
            latitude: 2.0,
            longitude: 2.0,
            accuracy: None,
        }))
        .await
        .unwrap();
    let newest = second.await.unwrap().unwrap();

    release_first
        .send(Ok(PositionFix {
            latitude: 1.0,
            longitude: 1.0,
            accuracy: None,
        }))
        .await
        .unwrap();
    let stale = first.await.unwrap().unwrap();
    assert_eq!(stale.latitude, 1.0);

    // The superseded fix was returned to its caller but never applied.
    let state = manager.state();
    assert_eq!(state.location, Some(newest));
    assert!(!state.loading);
}

#[tokio::test]
async fn delegate_receives_acquisition_events() {
    struct Recorder(Mutex<Vec<LocationEvent>>);
    impl shopkit_location::LocationDelegate for Recorder {
        fn on_event(&self, event: LocationEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    let storage = Arc::new(MemoryStorage::new());
    let provider = Arc::new(FixedProvider::new(PositionFix {
        latitude: 35.68,
        longitude: 139.69,
        accuracy: Some(5.0),
    }));
    let manager = manager_with(provider, storage).await;

    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    manager.set_delegate(recorder.clone());

    let snapshot = manager.current_position().await.unwrap();

    let events = recorder.0.lock().unwrap();
    assert!(matches!(
        events.as_slice(),
        [LocationEvent::Acquired(acquired)] if *acquired == snapshot
    ));
}

/// Provider with a permission-change subscription.
struct WatchedProvider {
    events: async_channel::Receiver<PermissionState>,
}

#[async_trait]
impl GeolocationProvider for WatchedProvider {
    async fn current_position(&self, _: &AcquisitionOptions) -> LocationResult<PositionFix> {
        Err(LocationError::PositionUnavailable("not scripted".into()))
    }

    async fn permission_state(&self) -> PermissionState {
        PermissionState::Prompt
    }

    fn subscribe_permission(&self) -> Option<async_channel::Receiver<PermissionState>> {
        Some(self.events.clone())
    }
}

#[tokio::test]
async fn permission_changes_update_state_and_preference() {
    let (notify, events) = async_channel::unbounded();
    let provider = Arc::new(WatchedProvider { events });
    let storage = Arc::new(MemoryStorage::new());

    let manager = manager_with(provider, storage.clone()).await;
    assert_eq!(manager.state().permission_state, PermissionState::Prompt);
    let mut changes = manager.subscribe();

    notify.send(PermissionState::Denied).await.unwrap();
    changes
        .wait_for(|state| state.permission_state == PermissionState::Denied)
        .await
        .unwrap();
    assert_eq!(
        storage.get(PERMISSION_PREFERENCE_KEY).unwrap().as_deref(),
        Some("denied")
    );

    notify.send(PermissionState::Granted).await.unwrap();
    changes
        .wait_for(|state| state.permission_state == PermissionState::Granted)
        .await
        .unwrap();
    assert_eq!(
        storage.get(PERMISSION_PREFERENCE_KEY).unwrap().as_deref(),
        Some("granted")
    );
}

#[tokio::test]
async fn teardown_releases_the_permission_subscription() {
    let (notify, events) = async_channel::unbounded();
    let provider = Arc::new(WatchedProvider { events });
    let storage = Arc::new(MemoryStorage::new());

    let manager = manager_with(provider.clone(), storage).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // The provider holds one receiver, the pump holds its subscription.
    assert_eq!(notify.receiver_count(), 2);

    // Dropping the last manager clone must release the subscription even
    // though the provider never emits another event.
    drop(manager);
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(notify.receiver_count(), 1);
}
