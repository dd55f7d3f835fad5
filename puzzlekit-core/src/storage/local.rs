//! Best-effort persistence of the single guest profile.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::traits::SlotStore;
use crate::profile::{GuestId, GuestRecord, Profile, PuzzleId};

/// Whether a local write reached durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// The slot store accepted the write.
    Durable,
    /// The slot store failed; the data only lives in memory for this session.
    MemoryOnly,
}

/// Stored document layout: `{ id, displayName, xp, completedPuzzles }`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredGuest {
    id: GuestId,
    display_name: String,
    xp: u64,
    completed_puzzles: Vec<PuzzleId>,
}

impl From<&GuestRecord> for StoredGuest {
    fn from(record: &GuestRecord) -> Self {
        Self {
            id: record.guest_id.clone(),
            display_name: record.display_name.clone(),
            xp: record.profile.xp(),
            completed_puzzles: record.profile.completed_puzzles().iter().cloned().collect(),
        }
    }
}

impl From<StoredGuest> for GuestRecord {
    fn from(stored: StoredGuest) -> Self {
        Self {
            guest_id: stored.id,
            display_name: stored.display_name,
            profile: Profile::from_parts(stored.xp, stored.completed_puzzles),
        }
    }
}

/// Guest profile persistence on top of a [`SlotStore`].
///
/// None of the operations fail the caller. Unreadable or malformed data reads
/// as "no guest"; failed writes degrade to [`Durability::MemoryOnly`].
#[derive(Clone)]
pub struct LocalProfileStore {
    slots: Arc<dyn SlotStore>,
    slot: String,
}

impl std::fmt::Debug for LocalProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProfileStore")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl LocalProfileStore {
    /// Creates a store persisting into `slot` of `slots`.
    pub fn new(slots: Arc<dyn SlotStore>, slot: impl Into<String>) -> Self {
        Self {
            slots,
            slot: slot.into(),
        }
    }

    /// Name of the slot holding the guest document.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Loads the persisted guest, if any.
    #[must_use]
    pub fn load(&self) -> Option<GuestRecord> {
        let bytes = match self.slots.read(&self.slot) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(slot = %self.slot, error = %err, "guest slot unreadable");
                return None;
            }
        };

        match serde_json::from_slice::<StoredGuest>(&bytes) {
            Ok(stored) if !stored.id.as_str().is_empty() => Some(stored.into()),
            Ok(_) => {
                tracing::warn!(slot = %self.slot, "ignoring stored guest without an id");
                None
            }
            Err(err) => {
                tracing::warn!(slot = %self.slot, error = %err, "ignoring malformed guest document");
                None
            }
        }
    }

    /// Persists `record`, replacing any previous guest.
    pub fn save(&self, record: &GuestRecord) -> Durability {
        let bytes = match serde_json::to_vec(&StoredGuest::from(record)) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode guest document");
                return Durability::MemoryOnly;
            }
        };

        match self.slots.write_atomic(&self.slot, &bytes) {
            Ok(()) => {
                tracing::debug!(guest_id = %record.guest_id, xp = record.profile.xp(), "guest saved");
                Durability::Durable
            }
            Err(err) => {
                tracing::warn!(
                    slot = %self.slot,
                    error = %err,
                    "guest progress kept in memory only"
                );
                Durability::MemoryOnly
            }
        }
    }

    /// Deletes the persisted guest.
    ///
    /// On [`Durability::MemoryOnly`] the document may reappear on the next start.
    pub fn clear(&self) -> Durability {
        match self.slots.delete(&self.slot) {
            Ok(()) => Durability::Durable,
            Err(err) => {
                tracing::warn!(slot = %self.slot, error = %err, "failed to delete guest document");
                Durability::MemoryOnly
            }
        }
    }
}
