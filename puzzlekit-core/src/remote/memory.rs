//! In-process implementation of the remote profile store.
//!
//! Holds rows in a `HashMap` guarded by a mutex, so `grant_once` is atomic
//! with respect to every other call on the same store. Supports fault
//! injection for exercising the retry paths of callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Grant, RemoteError, RemoteProfileStore, RemoteResult};
use crate::profile::{AccountId, Profile, PuzzleId};

/// Remote profile store kept in memory.
#[derive(Default)]
pub struct MemoryProfileStore {
    rows: Mutex<HashMap<AccountId, Profile>>,
    fail_next: AtomicU32,
    fetch_calls: AtomicUsize,
    grant_calls: AtomicUsize,
}

impl MemoryProfileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the row of `account_id`.
    pub fn seed(&self, account_id: &AccountId, profile: Profile) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account_id.clone(), profile);
    }

    /// Returns the stored row of `account_id`, if any.
    #[must_use]
    pub fn profile(&self, account_id: &AccountId) -> Option<Profile> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_id)
            .cloned()
    }

    /// Makes the next `count` calls fail with [`RemoteError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of `fetch` calls received, failed ones included.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `grant_once` calls received, failed ones included.
    #[must_use]
    pub fn grant_calls(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }

    fn injected_failure(&self) -> RemoteResult<()> {
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        match consumed {
            Ok(_) => Err(RemoteError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteProfileStore for MemoryProfileStore {
    async fn fetch(&self, account_id: &AccountId) -> RemoteResult<Option<Profile>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        // Suspend like a network call would, so callers interleave.
        tokio::task::yield_now().await;
        self.injected_failure()?;
        Ok(self.profile(account_id))
    }

    async fn grant_once(
        &self,
        account_id: &AccountId,
        puzzle_id: &PuzzleId,
        reward: u64,
    ) -> RemoteResult<Grant> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.injected_failure()?;

        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let profile = rows.entry(account_id.clone()).or_default();
        let granted = profile.record_completion(puzzle_id, reward);
        Ok(Grant {
            granted,
            profile: profile.clone(),
        })
    }
}
