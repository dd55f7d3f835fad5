//! Foreign-language surface: one [`ProgressClient`] object per app session.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::coordinator::{IdentityCoordinator, SessionSnapshot, SessionStatus};
use crate::error::ProgressError;
use crate::profile::{AccountId, Identity, IdentityKind, PuzzleId};
use crate::remote::HttpProfileStore;
use crate::session::SessionEvent;
use crate::storage::{
    FileSlotStore, LocalProfileStore, MemorySlotStore, SlotStore, DEFAULT_GUEST_SLOT,
};
use crate::submission::{SubmissionGuard, SubmissionOutcome};

/// Connection and storage settings for a [`ProgressClient`].
#[derive(Debug, Clone, uniffi::Record)]
pub struct ProgressClientConfig {
    /// Base URL of the remote profile service.
    pub remote_url: String,
    /// Bearer token for the remote service.
    pub api_key: Option<String>,
    /// Directory for the guest profile. `None` keeps guest data in memory.
    pub data_dir: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Transport-level retries for failed requests.
    pub max_retries: Option<u32>,
}

/// Flattened [`SessionSnapshot`] for hosts.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ProfileSnapshot {
    /// Readiness of the profile fields.
    pub status: SessionStatus,
    /// Kind of the active identity.
    pub identity_kind: IdentityKind,
    /// Guest id or account id.
    pub identity_id: Option<String>,
    /// Guest display name.
    pub display_name: Option<String>,
    /// XP of the active profile, when loaded.
    pub xp: Option<u64>,
    /// Completed puzzle ids, sorted.
    pub completed_puzzles: Vec<String>,
}

impl From<SessionSnapshot> for ProfileSnapshot {
    fn from(snapshot: SessionSnapshot) -> Self {
        let identity_kind = snapshot.identity_kind();
        let (identity_id, display_name) = match snapshot.identity {
            Identity::None => (None, None),
            Identity::Guest {
                guest_id,
                display_name,
            } => (Some(guest_id.to_string()), Some(display_name)),
            Identity::Account { account_id } => (Some(account_id.to_string()), None),
        };
        let (xp, completed_puzzles) = snapshot.profile.map_or((None, Vec::new()), |profile| {
            (
                Some(profile.xp()),
                profile
                    .completed_puzzles()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            )
        });
        Self {
            status: snapshot.status,
            identity_kind,
            identity_id,
            display_name,
            xp,
            completed_puzzles,
        }
    }
}

/// How a submission was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum SubmissionKind {
    /// Wrong answer.
    Rejected,
    /// First completion; XP was added.
    Granted,
    /// Already completed before; nothing changed.
    AlreadyCompleted,
    /// Correct, but no identity is active to record it.
    Unpersisted,
}

/// Flattened [`SubmissionOutcome`] for hosts.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SubmissionReceipt {
    /// How the submission was handled.
    pub kind: SubmissionKind,
    /// XP added by this submission.
    pub xp_awarded: u64,
    /// Total XP afterwards, if an identity is active.
    pub total_xp: Option<u64>,
}

impl From<SubmissionOutcome> for SubmissionReceipt {
    fn from(outcome: SubmissionOutcome) -> Self {
        let total_xp = outcome.profile().map(crate::profile::Profile::xp);
        let (kind, xp_awarded) = match outcome {
            SubmissionOutcome::Rejected => (SubmissionKind::Rejected, 0),
            SubmissionOutcome::Granted { reward, .. } => (SubmissionKind::Granted, reward),
            SubmissionOutcome::AlreadyCompleted { .. } => (SubmissionKind::AlreadyCompleted, 0),
            SubmissionOutcome::Unpersisted { .. } => (SubmissionKind::Unpersisted, 0),
        };
        Self {
            kind,
            xp_awarded,
            total_xp,
        }
    }
}

/// Progress tracking for one app session.
///
/// The host relays its authentication events through [`ProgressClient::sign_in`]
/// and [`ProgressClient::sign_out`]. The first of them resolves the initial
/// identity; until then the snapshot is `Loading` and submissions are refused.
#[derive(uniffi::Object)]
pub struct ProgressClient {
    coordinator: Arc<IdentityCoordinator>,
    guard: SubmissionGuard,
}

#[uniffi::export(async_runtime = "tokio")]
impl ProgressClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote configuration is invalid.
    #[uniffi::constructor]
    pub fn new(config: ProgressClientConfig) -> Result<Self, ProgressError> {
        let mut remote_config = RemoteConfig::new(config.remote_url);
        if let Some(api_key) = config.api_key {
            remote_config = remote_config.with_api_key(api_key);
        }
        if let Some(timeout_secs) = config.timeout_secs {
            remote_config = remote_config.with_timeout(Duration::from_secs(timeout_secs));
        }
        if let Some(max_retries) = config.max_retries {
            remote_config = remote_config.with_max_retries(max_retries);
        }
        let remote = HttpProfileStore::new(&remote_config)?;

        let slots: Arc<dyn SlotStore> = match config.data_dir {
            Some(dir) => Arc::new(FileSlotStore::new(dir)),
            None => Arc::new(MemorySlotStore::new()),
        };
        let local = LocalProfileStore::new(slots, DEFAULT_GUEST_SLOT);

        let coordinator = Arc::new(IdentityCoordinator::new(local, Arc::new(remote)));
        let guard = SubmissionGuard::new(Arc::clone(&coordinator));
        Ok(Self { coordinator, guard })
    }

    /// Relays a sign-in of `account_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the account profile cannot be loaded; the snapshot
    /// then carries the error and [`ProgressClient::retry`] can be used.
    pub async fn sign_in(&self, account_id: String) -> Result<(), ProgressError> {
        self.coordinator
            .apply_session(SessionEvent::SignedIn(AccountId::from(account_id)))
            .await
    }

    /// Relays a sign-out.
    ///
    /// # Errors
    ///
    /// Does not fail in practice; the signature matches the other transitions.
    pub async fn sign_out(&self) -> Result<(), ProgressError> {
        self.coordinator.apply_session(SessionEvent::SignedOut).await
    }

    /// Creates and activates a guest.
    ///
    /// # Errors
    ///
    /// See [`IdentityCoordinator::create_guest`].
    pub async fn create_guest(
        &self,
        display_name: String,
    ) -> Result<ProfileSnapshot, ProgressError> {
        self.coordinator.create_guest(&display_name).await?;
        Ok(self.snapshot())
    }

    /// Deletes the active guest.
    ///
    /// # Errors
    ///
    /// See [`IdentityCoordinator::clear_guest`].
    pub async fn clear_guest(&self) -> Result<(), ProgressError> {
        self.coordinator.clear_guest().await
    }

    /// Submits an answer verdict for `puzzle_id`.
    ///
    /// # Errors
    ///
    /// See [`SubmissionGuard::submit`].
    pub async fn submit(
        &self,
        puzzle_id: String,
        is_correct: bool,
        reward: u64,
    ) -> Result<SubmissionReceipt, ProgressError> {
        let outcome = self
            .guard
            .submit(&PuzzleId::from(puzzle_id), is_correct, reward)
            .await?;
        Ok(outcome.into())
    }

    /// Retries a failed account profile load.
    ///
    /// # Errors
    ///
    /// Returns an error if the load fails again.
    pub async fn retry(&self) -> Result<(), ProgressError> {
        self.coordinator.retry().await
    }

    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.coordinator.snapshot().into()
    }
}
