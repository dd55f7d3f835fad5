//! Local storage: slot backends and the guest profile store built on them.

pub mod error;
pub mod file;
pub mod local;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use file::FileSlotStore;
pub use local::{Durability, LocalProfileStore};
pub use memory::MemorySlotStore;
pub use traits::SlotStore;

/// Slot the guest document is written to unless configured otherwise.
pub const DEFAULT_GUEST_SLOT: &str = "puzzlekit.guest_profile";
