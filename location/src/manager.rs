//! The location state manager.
//!
//! [`LocationManager`] ties the pieces together: on activation it hydrates
//! from the persisted snapshot and permission preference, then serves live
//! acquisitions, manual overrides and cache clearing. Consumers observe its
//! [`AcquisitionState`] through a watch channel that only ever publishes
//! whole snapshots.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use shopkit_permission::{PermissionPreference, PermissionState};
use shopkit_storage::StorageAdapter;
use tokio::sync::watch;

use crate::provider::{GeolocationProvider, PositionFix};
use crate::{AcquisitionOptions, LocationError, LocationResult, LocationSnapshot, now_millis, store};

/// The transient state exposed to consumers.
///
/// Updates are applied atomically; an observer sees either the pre-update or
/// the fully-updated record, never a mix.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionState {
    /// Best-known location, from cache or a live fix.
    pub location: Option<LocationSnapshot>,
    /// Whether an acquisition is outstanding (or expected on startup).
    pub loading: bool,
    /// The most recent failure, cleared by the next success.
    pub error: Option<LocationError>,
    /// Live permission status as last reported by the platform.
    pub permission_state: PermissionState,
    /// Whether the user has ever been taken through the permission prompt.
    pub permission_requested: bool,
}

/// Events delivered to a registered [`LocationDelegate`].
#[derive(Debug, Clone)]
pub enum LocationEvent {
    /// A live acquisition succeeded.
    Acquired(LocationSnapshot),
    /// An acquisition failed.
    Failed(LocationError),
    /// The platform reported a permission-status change.
    PermissionChanged(PermissionState),
}

/// Receiver for location events, the callback surface for consumers that
/// want notifications rather than polling the state.
pub trait LocationDelegate: Send + Sync {
    /// Called for every event. Runs on the manager's task; keep it cheap.
    fn on_event(&self, event: LocationEvent);
}

/// Manager owning location acquisition, permission tracking and the
/// persisted-location cache.
///
/// Cloning is cheap and shares the same state. Background follow-ups (the
/// startup auto-acquisition and the permission-change pump) hold only weak
/// references, so dropping every clone tears the manager down and any late
/// platform result is discarded instead of being applied to detached state.
#[derive(Clone)]
pub struct LocationManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for LocationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationManager")
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

struct Inner {
    provider: Arc<dyn GeolocationProvider>,
    storage: Arc<dyn StorageAdapter>,
    options: AcquisitionOptions,
    state: watch::Sender<AcquisitionState>,
    // Request generation; a result is applied only while its request is
    // still the most recent one.
    generation: AtomicU64,
    delegate: Mutex<Option<Arc<dyn LocationDelegate>>>,
    // Dropped with the manager; closing it releases the permission
    // subscription even if the provider never emits again.
    shutdown: watch::Sender<()>,
}

impl LocationManager {
    /// Activate a manager over the given platform provider and storage.
    ///
    /// Hydrates from storage: a snapshot younger than
    /// [`store::SNAPSHOT_MAX_AGE`] populates the state immediately, and a
    /// previously granted permission preference schedules an automatic
    /// acquisition without blocking activation.
    pub async fn initialize(
        provider: Arc<dyn GeolocationProvider>,
        storage: Arc<dyn StorageAdapter>,
        options: AcquisitionOptions,
    ) -> Self {
        let preference = store::load_preference(storage.as_ref());
        let cached = store::load_snapshot(storage.as_ref())
            .filter(|snapshot| snapshot.is_fresh(now_millis(), store::SNAPSHOT_MAX_AGE));

        let permission_state = if provider.is_supported() {
            provider.permission_state().await
        } else {
            PermissionState::Unsupported
        };

        let initial = AcquisitionState {
            loading: cached.is_none(),
            location: cached,
            error: None,
            permission_state,
            permission_requested: preference != PermissionPreference::Unknown,
        };

        let (state, _) = watch::channel(initial);
        let (shutdown, _) = watch::channel(());
        let inner = Arc::new(Inner {
            provider,
            storage,
            options,
            state,
            generation: AtomicU64::new(0),
            delegate: Mutex::new(None),
            shutdown,
        });

        if let Some(events) = inner.provider.subscribe_permission() {
            spawn_permission_pump(Arc::downgrade(&inner), inner.shutdown.subscribe(), events);
        }
        if preference == PermissionPreference::Granted {
            spawn_auto_acquire(Arc::downgrade(&inner));
        }

        Self { inner }
    }

    /// Query the platform for a fresh position fix.
    ///
    /// Safe to call while a previous acquisition is outstanding; only the
    /// most recent request's result is applied to the state. Engaging the
    /// prompt is recorded optimistically as a granted preference, rewritten
    /// to denied if the platform reports a permission denial.
    ///
    /// # Errors
    /// Returns the platform failure, which is also surfaced through
    /// [`AcquisitionState::error`].
    pub async fn current_position(&self) -> LocationResult<LocationSnapshot> {
        let request = self.inner.begin_request()?;
        let result = self
            .inner
            .provider
            .current_position(&self.inner.options)
            .await;
        self.inner.finish_request(request, result)
    }

    /// Override the location with manually entered coordinates.
    ///
    /// Persists a snapshot with no accuracy and a fresh capture time, and
    /// clears any loading or error state. No permission interaction.
    pub fn set_manual_location(&self, latitude: f64, longitude: f64) -> LocationSnapshot {
        let snapshot = LocationSnapshot {
            latitude,
            longitude,
            accuracy: None,
            captured_at: now_millis(),
        };
        store::save_snapshot(self.inner.storage.as_ref(), &snapshot);
        let applied = snapshot.clone();
        self.inner.update_state(move |state| {
            state.location = Some(snapshot);
            state.loading = false;
            state.error = None;
        });
        applied
    }

    /// Delete the persisted snapshot and reset the state to its empty form.
    ///
    /// The permission preference and permission fields are left untouched.
    pub fn clear_saved_location(&self) {
        store::clear_snapshot(self.inner.storage.as_ref());
        self.inner.update_state(|state| {
            state.location = None;
            state.loading = false;
            state.error = None;
        });
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> AcquisitionState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes. Every observed value is a complete
    /// snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AcquisitionState> {
        self.inner.state.subscribe()
    }

    /// Whether the underlying platform has a location capability.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.inner.provider.is_supported()
    }

    /// Register a delegate to receive location events.
    pub fn set_delegate(&self, delegate: Arc<dyn LocationDelegate>) {
        let mut guard = self.inner.delegate.lock().expect("delegate mutex poisoned");
        *guard = Some(delegate);
    }

    /// Remove the registered delegate.
    pub fn clear_delegate(&self) {
        let mut guard = self.inner.delegate.lock().expect("delegate mutex poisoned");
        *guard = None;
    }
}

impl Inner {
    fn update_state(&self, apply: impl FnOnce(&mut AcquisitionState)) {
        // send_modify holds the channel lock, so readers never observe a
        // half-applied update.
        self.state.send_modify(apply);
    }

    fn notify(&self, event: LocationEvent) {
        let delegate = self
            .delegate
            .lock()
            .expect("delegate mutex poisoned")
            .clone();
        if let Some(delegate) = delegate {
            delegate.on_event(event);
        }
    }

    /// Record the prompt engagement and enter the loading state. Returns the
    /// request generation, or applies the unsupported error and fails when
    /// there is no platform capability to call.
    fn begin_request(&self) -> LocationResult<u64> {
        // Without a capability there is no prompt to engage, so nothing is
        // recorded as granted.
        if !self.provider.is_supported() {
            let error = LocationError::Unsupported;
            self.update_state(|state| {
                state.loading = false;
                state.error = Some(error.clone());
            });
            self.notify(LocationEvent::Failed(error.clone()));
            return Err(error);
        }

        store::save_preference(self.storage.as_ref(), PermissionPreference::Granted);
        self.update_state(|state| {
            state.permission_requested = true;
            state.loading = true;
        });

        Ok(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Apply a finished platform query, unless a newer request has started
    /// in the meantime.
    fn finish_request(
        &self,
        request: u64,
        result: LocationResult<PositionFix>,
    ) -> LocationResult<LocationSnapshot> {
        let superseded = self.generation.load(Ordering::SeqCst) != request;

        match result {
            Ok(fix) => {
                let snapshot = LocationSnapshot {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    accuracy: fix.accuracy,
                    captured_at: now_millis(),
                };
                if superseded {
                    debug!("discarding superseded location fix");
                    return Ok(snapshot);
                }

                store::save_snapshot(self.storage.as_ref(), &snapshot);
                let applied = snapshot.clone();
                self.update_state(move |state| {
                    state.location = Some(snapshot);
                    state.loading = false;
                    state.error = None;
                });
                self.notify(LocationEvent::Acquired(applied.clone()));
                Ok(applied)
            }
            Err(error) => {
                if superseded {
                    debug!("discarding superseded location error: {error}");
                    return Err(error);
                }

                if matches!(error, LocationError::PermissionDenied(_)) {
                    store::save_preference(self.storage.as_ref(), PermissionPreference::Denied);
                }
                let surfaced = error.clone();
                self.update_state(move |state| {
                    state.loading = false;
                    state.error = Some(error);
                });
                self.notify(LocationEvent::Failed(surfaced.clone()));
                Err(surfaced)
            }
        }
    }

    fn apply_permission_change(&self, permission: PermissionState) {
        self.update_state(|state| state.permission_state = permission);
        let preference = match permission {
            PermissionState::Granted => Some(PermissionPreference::Granted),
            PermissionState::Denied => Some(PermissionPreference::Denied),
            _ => None,
        };
        if let Some(preference) = preference {
            store::save_preference(self.storage.as_ref(), preference);
        }
        self.notify(LocationEvent::PermissionChanged(permission));
    }
}

/// Forward permission-status changes into the state for as long as both the
/// manager and the provider's subscription are alive.
///
/// The shutdown channel closes when the last manager clone is dropped, which
/// releases the subscription eagerly rather than waiting for the provider to
/// emit one more event.
fn spawn_permission_pump(
    inner: Weak<Inner>,
    mut shutdown: watch::Receiver<()>,
    events: async_channel::Receiver<PermissionState>,
) {
    tokio::spawn(async move {
        loop {
            let permission = tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Ok(permission) => permission,
                    Err(_) => break,
                },
            };
            let Some(inner) = inner.upgrade() else { break };
            inner.apply_permission_change(permission);
        }
    });
}

/// Startup acquisition for returning users with a granted preference. Runs
/// detached from activation; the weak reference is re-checked after the
/// platform call so a late result never lands in a torn-down manager.
fn spawn_auto_acquire(weak: Weak<Inner>) {
    tokio::spawn(async move {
        let (provider, options, request) = {
            let Some(inner) = weak.upgrade() else { return };
            let Ok(request) = inner.begin_request() else {
                return;
            };
            (inner.provider.clone(), inner.options, request)
        };

        let result = provider.current_position(&options).await;

        if let Some(inner) = weak.upgrade() {
            let _ = inner.finish_request(request, result);
        } else {
            debug!("discarding location result after teardown");
        }
    });
}
