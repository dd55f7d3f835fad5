#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! `PuzzleKit` core: guest and account identity reconciliation with
//! exactly-once XP rewards.
//!
//! A player is at any time either anonymous with no progress, a locally
//! persisted guest, or a signed-in account. [`IdentityCoordinator`] decides
//! which one is active and publishes a [`SessionSnapshot`];
//! [`SubmissionGuard`] applies puzzle completions to it so a puzzle's reward
//! is granted at most once per identity.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use puzzlekit_core::remote::MemoryProfileStore;
//! use puzzlekit_core::session::SessionEvent;
//! use puzzlekit_core::storage::{LocalProfileStore, MemorySlotStore, DEFAULT_GUEST_SLOT};
//! use puzzlekit_core::{IdentityCoordinator, PuzzleId, SubmissionGuard};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let local = LocalProfileStore::new(Arc::new(MemorySlotStore::new()), DEFAULT_GUEST_SLOT);
//! let coordinator = Arc::new(IdentityCoordinator::new(
//!     local,
//!     Arc::new(MemoryProfileStore::new()),
//! ));
//! let guard = SubmissionGuard::new(Arc::clone(&coordinator));
//!
//! coordinator.apply_session(SessionEvent::SignedOut).await.unwrap();
//! coordinator.create_guest("Ada").await.unwrap();
//!
//! let puzzle = PuzzleId::from("case-1");
//! assert!(guard.submit(&puzzle, true, 100).await.unwrap().is_granted());
//! assert!(!guard.submit(&puzzle, true, 100).await.unwrap().is_granted());
//! assert_eq!(coordinator.snapshot().profile.unwrap().xp(), 100);
//! # });
//! ```

mod error;
pub use error::*;

mod profile;
pub use profile::*;

pub mod config;
pub mod logger;
pub mod remote;
pub mod session;
pub mod storage;

mod coordinator;
pub use coordinator::{IdentityCoordinator, SessionSnapshot, SessionStatus};

mod submission;
pub use submission::{AnswerChecker, SubmissionGuard, SubmissionOutcome};

#[cfg(feature = "ffi")]
mod ffi;
#[cfg(feature = "ffi")]
pub use ffi::*;

// private modules
mod http_request;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("puzzlekit_core");
