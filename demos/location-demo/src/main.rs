//! Wiring check for shopkit-location.
//!
//! Run with: cargo run -p shopkit-location-demo

use std::sync::Arc;

use shopkit_location::{
    AcquisitionOptions, FixedProvider, LocationManager, PositionFix,
};
use shopkit_storage::MemoryStorage;

#[tokio::main]
async fn main() {
    println!("=== Shopkit Location Demo ===\n");

    let provider = Arc::new(FixedProvider::new(PositionFix {
        latitude: 48.8584,
        longitude: 2.2945,
        accuracy: Some(15.0),
    }));
    let storage = Arc::new(MemoryStorage::new());

    let manager =
        LocationManager::initialize(provider, storage, AcquisitionOptions::default()).await;

    println!("Permission state: {:?}\n", manager.state().permission_state);

    println!("Getting current location...");
    match manager.current_position().await {
        Ok(snapshot) => {
            println!("✓ Location retrieved successfully!");
            println!("  Latitude:  {:.6}°", snapshot.latitude);
            println!("  Longitude: {:.6}°", snapshot.longitude);
            if let Some(accuracy) = snapshot.accuracy {
                println!("  Accuracy:  {accuracy:.1}m");
            }
            println!("  Timestamp: {}", snapshot.captured_at);
        }
        Err(err) => {
            println!("✗ Failed to get location: {err}");
        }
    }

    println!("\nOverriding with a manual address...");
    let manual = manager.set_manual_location(51.5007, -0.1246);
    println!("  Manual fix: {:.4}, {:.4}", manual.latitude, manual.longitude);

    manager.clear_saved_location();
    println!("Saved location cleared.");
}
