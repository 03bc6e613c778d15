//! # Shopkit
//!
//! Client-side device kit for the ShopWise storefront.
//!
//! Shopkit provides the pieces the storefront needs to work with the device
//! it runs on: durable key-value storage behind a swappable adapter,
//! permission bookkeeping, and a location manager that caches the best-known
//! device position across sessions.
//!
//! ## Features
//!
//! Shopkit is modular. Enable only the features you need to keep your
//! dependencies minimal.
//!
//! - `location`: location acquisition, caching and manual override.
//! - `permission`: permission state and durable preference vocabulary.
//! - `storage`: the string key-value storage adapter and its implementations.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! shopkit = { version = "0.1", features = ["location"] }
//! ```
//!
//! ```rust,ignore
//! use shopkit::location::LocationManager;
//!
//! async fn best_known_position(manager: &LocationManager) {
//!     if let Ok(snapshot) = manager.current_position().await {
//!         println!("lat {}, lon {}", snapshot.latitude, snapshot.longitude);
//!     }
//! }
//! ```

#[cfg(feature = "location")]
pub use shopkit_location as location;

#[cfg(feature = "permission")]
pub use shopkit_permission as permission;

#[cfg(feature = "storage")]
pub use shopkit_storage as storage;
