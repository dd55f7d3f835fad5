//! Platform interface for local profile persistence.

use super::error::StorageResult;

/// Named-slot store for small documents (browser local storage, app preferences, files).
///
/// Implementations are synchronous; callers treat every failure as non-fatal.
pub trait SlotStore: Send + Sync {
    /// Reads the slot `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the contents of slot `name` in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (including quota exhaustion).
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Removes slot `name`. Removing a missing slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, name: &str) -> StorageResult<()>;
}
