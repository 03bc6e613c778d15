//! The platform boundary for location queries.
//!
//! A [`GeolocationProvider`] stands in for whatever the host platform offers:
//! a browser `navigator.geolocation`, a native positioning service, or a fake
//! in tests. The permission-status capability is optional, matching platforms
//! that expose a position query but no way to inspect the permission.

use async_trait::async_trait;
use shopkit_permission::PermissionState;

use crate::{AcquisitionOptions, LocationError, LocationResult};

/// A single position fix as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters, if reported.
    pub accuracy: Option<f64>,
}

/// Platform location capability.
///
/// `current_position` may prompt the user for permission as a side effect;
/// callers must treat every invocation as potentially user-visible.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Whether the platform has a location capability at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Query the platform for a fresh position fix.
    ///
    /// # Errors
    /// Returns a [`LocationError`] carrying the platform-supplied message
    /// when the query fails, is denied, or times out.
    async fn current_position(&self, options: &AcquisitionOptions) -> LocationResult<PositionFix>;

    /// The current permission status, if the platform can report one.
    async fn permission_state(&self) -> PermissionState {
        PermissionState::Unknown
    }

    /// Subscribe to permission-status changes, if the platform supports it.
    ///
    /// The returned channel closes when the provider stops emitting; callers
    /// must stop reading when their owning context is torn down.
    fn subscribe_permission(&self) -> Option<async_channel::Receiver<PermissionState>> {
        None
    }
}

/// Fallback provider for platforms without any location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedProvider;

#[async_trait]
impl GeolocationProvider for UnsupportedProvider {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(&self, _options: &AcquisitionOptions) -> LocationResult<PositionFix> {
        Err(LocationError::Unsupported)
    }

    async fn permission_state(&self) -> PermissionState {
        PermissionState::Unsupported
    }
}

/// Provider that always reports the same fix. Useful for demos and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedProvider {
    fix: PositionFix,
}

impl FixedProvider {
    /// Create a provider that always reports `fix`.
    #[must_use]
    pub const fn new(fix: PositionFix) -> Self {
        Self { fix }
    }
}

#[async_trait]
impl GeolocationProvider for FixedProvider {
    async fn current_position(&self, _options: &AcquisitionOptions) -> LocationResult<PositionFix> {
        Ok(self.fix)
    }

    async fn permission_state(&self) -> PermissionState {
        PermissionState::Granted
    }
}
