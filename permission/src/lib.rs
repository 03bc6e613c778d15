//! Permission vocabulary shared across shopkit.
//!
//! This crate defines the two permission records the kit works with: the
//! live platform permission state reported by a capability query, and the
//! durable preference remembering how the user answered the prompt in a
//! previous session.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// The live status of the location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
    /// The platform will prompt the user on the next request.
    Prompt,
    /// The platform has no permission-status capability.
    Unsupported,
    /// The status has not been determined.
    Unknown,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Prompt => write!(f, "prompt"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Durable record of how the user answered the location prompt.
///
/// Unlike [`PermissionState`], which reflects what the platform reports right
/// now, the preference is written by acquisition attempts and survives across
/// sessions. It decides whether a fresh activation re-requests the location
/// without waiting for user interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionPreference {
    /// The user has never been prompted.
    #[default]
    Unknown,
    /// The user engaged the prompt and location access worked.
    Granted,
    /// The user declined location access.
    Denied,
}

impl PermissionPreference {
    /// The string persisted to durable storage, or `None` for
    /// [`PermissionPreference::Unknown`] (which is represented by the absence
    /// of the stored value).
    #[must_use]
    pub const fn as_stored(self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Granted => Some("granted"),
            Self::Denied => Some("denied"),
        }
    }

    /// Parse a value read back from durable storage.
    ///
    /// Unrecognized values read as [`PermissionPreference::Unknown`] rather
    /// than failing; a corrupt preference only costs one extra prompt.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        match value {
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            _ => Self::Unknown,
        }
    }
}

impl From<PermissionPreference> for PermissionState {
    fn from(preference: PermissionPreference) -> Self {
        match preference {
            PermissionPreference::Unknown => Self::Unknown,
            PermissionPreference::Granted => Self::Granted,
            PermissionPreference::Denied => Self::Denied,
        }
    }
}
