//! Remote profile store: one profile row per authenticated account.
//!
//! The remote service is the only writer that can be raced (retried requests,
//! a reloaded client, a second device), so the reward grant is a single
//! conditional operation on the service side rather than a client-side
//! read-modify-write.

mod error;
pub mod http;
pub mod memory;
mod row;

use async_trait::async_trait;

pub use error::{RemoteError, RemoteResult};
pub use http::HttpProfileStore;
pub use memory::MemoryProfileStore;

use crate::profile::{AccountId, Profile, PuzzleId};

/// Result of a [`RemoteProfileStore::grant_once`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// `true` if this call added the puzzle and its reward; `false` if the
    /// puzzle had already been completed before.
    pub granted: bool,
    /// The account profile after the call.
    pub profile: Profile,
}

/// Read/write access to account profiles held by the remote data service.
#[async_trait]
pub trait RemoteProfileStore: Send + Sync {
    /// Fetches the profile of `account_id`.
    ///
    /// `Ok(None)` means the account has no profile row yet (a brand-new
    /// account); it is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    async fn fetch(&self, account_id: &AccountId) -> RemoteResult<Option<Profile>>;

    /// Atomically marks `puzzle_id` complete and adds `reward` to the account's
    /// XP, unless the puzzle is already complete.
    ///
    /// Creates the profile row if the account has none. Calling this again for
    /// the same puzzle returns `granted: false` and never adds XP twice.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure; the call is then safe to repeat.
    async fn grant_once(
        &self,
        account_id: &AccountId,
        puzzle_id: &PuzzleId,
        reward: u64,
    ) -> RemoteResult<Grant>;
}
