//! Durable string key-value storage for shopkit.
//!
//! Components that need to survive a restart persist through the
//! [`StorageAdapter`] trait rather than touching any ambient store directly.
//! The adapter is injected, so production code can run on the file-backed
//! [`FsStorage`] while tests substitute the in-memory [`MemoryStorage`].
//!
//! Values are opaque strings; callers that persist structured data are
//! responsible for their own serialization.

#![warn(missing_docs)]

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

/// Errors that can occur while reading or writing durable storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying I/O operation failed.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The backing store rejected the key.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable string key-value store.
///
/// Implementations must tolerate concurrent readers of the same key; every
/// read returns a complete value or nothing, never a partial write.
pub trait StorageAdapter: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete the value stored under `key`. Removing an absent key is not an
    /// error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}
