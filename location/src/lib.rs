//! Location acquisition, permission tracking and persisted caching.
//!
//! This crate owns the "best-known device location" for the ShopWise client:
//! it serves a sufficiently fresh cached position immediately, queries the
//! platform for a live fix when needed, and remembers the user's permission
//! decision so repeat visits do not needlessly re-prompt.
//!
//! The platform boundary is the [`GeolocationProvider`] trait and the
//! persistence boundary is the [`shopkit_storage::StorageAdapter`] trait;
//! both are injected into [`LocationManager`], so the whole crate runs
//! unchanged against fakes in tests.

#![warn(missing_docs)]

mod manager;
pub mod provider;
pub mod store;

pub use manager::{AcquisitionState, LocationDelegate, LocationEvent, LocationManager};
pub use provider::{FixedProvider, GeolocationProvider, PositionFix, UnsupportedProvider};
pub use shopkit_permission::{PermissionPreference, PermissionState};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A cached or live location result.
///
/// Coordinates and capture time are always populated together; a snapshot is
/// never partially filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSnapshot {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Horizontal accuracy in meters, if the platform reported one.
    ///
    /// Manual overrides and snapshots re-hydrated from storage carry no
    /// accuracy.
    pub accuracy: Option<f64>,
    /// Capture time as Unix epoch milliseconds.
    pub captured_at: u64,
}

impl LocationSnapshot {
    /// Whether this snapshot was captured less than `max_age` before
    /// `now_ms` (Unix epoch milliseconds).
    #[must_use]
    pub fn is_fresh(&self, now_ms: u64, max_age: Duration) -> bool {
        u128::from(now_ms.saturating_sub(self.captured_at)) < max_age.as_millis()
    }
}

/// Options passed through to the platform location query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionOptions {
    /// Ask the platform for its most accurate fix. An explicit `false` is
    /// honored and forwarded as-is.
    pub enable_high_accuracy: bool,
    /// How long the platform may spend resolving a fix before it reports a
    /// timeout error.
    pub timeout: Duration,
    /// The oldest platform-cached position the query will accept. Zero means
    /// a fresh fix is always requested.
    pub maximum_age: Duration,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(10_000),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Errors that can occur when acquiring a location.
///
/// Every variant renders as the message shown to the consumer; platform
/// failures carry the platform-supplied text through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The platform has no location capability at all.
    #[error("Geolocation is not supported by your browser")]
    Unsupported,
    /// The user declined location access.
    #[error("{0}")]
    PermissionDenied(String),
    /// The platform query exceeded the configured timeout.
    #[error("{0}")]
    Timeout(String),
    /// The platform could not resolve a fix.
    #[error("{0}")]
    PositionUnavailable(String),
    /// Any other platform failure.
    #[error("{0}")]
    Unknown(String),
}

/// Result alias for location operations.
pub type LocationResult<T> = Result<T, LocationError>;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}
