//! In-memory slot store.
//!
//! Nothing survives the process. Useful for tests, for hosts without durable
//! storage, and for simulating storage that is disabled or full.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use super::error::{StorageError, StorageResult};
use super::traits::SlotStore;

/// In-memory slot store backed by a `HashMap`.
pub struct MemorySlotStore {
    slots: RwLock<HashMap<String, Vec<u8>>>,
    available: AtomicBool,
    quota_bytes: Option<usize>,
}

impl MemorySlotStore {
    /// Creates a new, empty and available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            quota_bytes: None,
        }
    }

    /// Creates a store that rejects any write larger than `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }

    /// Switches the store on or off. While off, every operation fails with
    /// [`StorageError::Unavailable`]; stored contents are kept.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Writes raw bytes into a slot, bypassing the availability switch.
    pub fn insert_raw(&self, name: &str, bytes: &[u8]) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes.to_vec());
    }

    /// Returns a copy of a slot, bypassing the availability switch.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<Vec<u8>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("memory store disabled".to_string()))
        }
    }
}

impl Default for MemorySlotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_available()?;
        Ok(self.get_raw(name))
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        self.ensure_available()?;
        if let Some(quota) = self.quota_bytes {
            if bytes.len() > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "{} bytes over a {quota} byte quota",
                    bytes.len()
                )));
            }
        }
        self.insert_raw(name, bytes);
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.ensure_available()?;
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        Ok(())
    }
}
