//! Identity reconciliation.
//!
//! [`IdentityCoordinator`] owns the single "active identity" decision. It
//! consumes session events and guest actions, loads the matching profile from
//! the store that backs that identity, and publishes a [`SessionSnapshot`]
//! after every transition.
//!
//! All transitions and submissions run under one FIFO async mutex: a queued
//! event is applied only after the previous one, including its network round
//! trip, has finished.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};

use crate::error::ProgressError;
use crate::profile::{AccountId, GuestId, GuestRecord, Identity, IdentityKind, Profile};
use crate::remote::RemoteProfileStore;
use crate::session::{SessionEvent, SessionEvents};
use crate::storage::{Durability, LocalProfileStore};

/// UI-facing readiness of the published profile.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SessionStatus {
    /// The profile is not known yet; it must not be shown as empty.
    Loading,
    /// The snapshot reflects the active identity.
    Ready,
    /// Loading the account profile failed.
    Error {
        /// Description of the failure.
        message: String,
        /// Whether [`IdentityCoordinator::retry`] may succeed.
        retryable: bool,
    },
}

/// What subscribers see: the active identity and its profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Readiness of `profile`.
    pub status: SessionStatus,
    /// The active identity.
    pub identity: Identity,
    /// The active profile; `None` when there is no identity or it is not loaded.
    pub profile: Option<Profile>,
}

impl SessionSnapshot {
    const fn loading(identity: Identity) -> Self {
        Self {
            status: SessionStatus::Loading,
            identity,
            profile: None,
        }
    }

    /// Kind of the active identity.
    #[must_use]
    pub const fn identity_kind(&self) -> IdentityKind {
        self.identity.kind()
    }

    /// Whether the snapshot can be shown as-is.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.status, SessionStatus::Ready)
    }
}

/// The device's guest while an account is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LocalGuest {
    /// Whatever the guest slot holds.
    Stored,
    /// The guest that was active at sign-in. Newer than the slot when one of
    /// its saves failed.
    Dormant(GuestRecord),
    /// Cleared by the user, but the slot delete has not gone through yet.
    Cleared(GuestId),
}

/// Reconciliation state. Exactly one identity is active in each variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CoordinatorState {
    Unresolved,
    Empty {
        /// Set while a cleared guest is still in the slot.
        cleared: Option<GuestId>,
    },
    ActiveGuest(GuestRecord),
    ActiveAccount {
        account_id: AccountId,
        profile: Profile,
        guest: LocalGuest,
    },
    AccountUnavailable {
        account_id: AccountId,
        message: String,
        retryable: bool,
        guest: LocalGuest,
    },
}

impl CoordinatorState {
    /// What sign-out falls back to when leaving this state.
    fn local_guest(&self) -> LocalGuest {
        match self {
            Self::Unresolved | Self::Empty { cleared: None } => LocalGuest::Stored,
            Self::Empty {
                cleared: Some(guest_id),
            } => LocalGuest::Cleared(guest_id.clone()),
            Self::ActiveGuest(record) => LocalGuest::Dormant(record.clone()),
            Self::ActiveAccount { guest, .. } | Self::AccountUnavailable { guest, .. } => {
                guest.clone()
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        match self {
            Self::Unresolved => SessionSnapshot::loading(Identity::None),
            Self::Empty { .. } => SessionSnapshot {
                status: SessionStatus::Ready,
                identity: Identity::None,
                profile: None,
            },
            Self::ActiveGuest(record) => SessionSnapshot {
                status: SessionStatus::Ready,
                identity: record.identity(),
                profile: Some(record.profile.clone()),
            },
            Self::ActiveAccount {
                account_id,
                profile,
                ..
            } => SessionSnapshot {
                status: SessionStatus::Ready,
                identity: Identity::Account {
                    account_id: account_id.clone(),
                },
                profile: Some(profile.clone()),
            },
            Self::AccountUnavailable {
                account_id,
                message,
                retryable,
                ..
            } => SessionSnapshot {
                status: SessionStatus::Error {
                    message: message.clone(),
                    retryable: *retryable,
                },
                identity: Identity::Account {
                    account_id: account_id.clone(),
                },
                profile: None,
            },
        }
    }

    const fn describe(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Empty { .. } => "no identity is active",
            Self::ActiveGuest(_) => "a guest is active",
            Self::ActiveAccount { .. } | Self::AccountUnavailable { .. } => {
                "an account is signed in"
            }
        }
    }
}

/// The reconciliation state machine.
pub struct IdentityCoordinator {
    local: LocalProfileStore,
    remote: Arc<dyn RemoteProfileStore>,
    state: Mutex<CoordinatorState>,
    published: watch::Sender<SessionSnapshot>,
}

impl std::fmt::Debug for IdentityCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCoordinator")
            .field("local", &self.local)
            .field("snapshot", &*self.published.borrow())
            .finish_non_exhaustive()
    }
}

impl IdentityCoordinator {
    /// Creates an unresolved coordinator over the given stores.
    pub fn new(local: LocalProfileStore, remote: Arc<dyn RemoteProfileStore>) -> Self {
        let state = CoordinatorState::Unresolved;
        let (published, _) = watch::channel(state.snapshot());
        Self {
            local,
            remote,
            state: Mutex::new(state),
            published,
        }
    }

    /// Subscribes to snapshots. The receiver starts at the latest one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.published.subscribe()
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.published.borrow().clone()
    }

    /// Applies one session event.
    ///
    /// The first event resolves the initial identity. A sign-in loads the
    /// account profile (an account without a row gets an empty one) and sets
    /// the active guest aside, unmerged; a sign-out brings that guest back, or
    /// the stored one if no guest was active at sign-in.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Remote`] if the account profile cannot be
    /// fetched. The coordinator then publishes an error status and waits for
    /// [`IdentityCoordinator::retry`] or the next event.
    pub async fn apply_session(&self, event: SessionEvent) -> Result<(), ProgressError> {
        let mut state = self.state.lock().await;
        match event {
            SessionEvent::SignedIn(account_id) => {
                if let CoordinatorState::ActiveAccount {
                    account_id: active, ..
                } = &*state
                {
                    if *active == account_id {
                        return Ok(());
                    }
                }
                if let CoordinatorState::ActiveGuest(record) = &*state {
                    tracing::info!(
                        guest_id = %record.guest_id,
                        xp = record.profile.xp(),
                        "signing in; guest progress stays on this device and is not merged"
                    );
                }
                let guest = self.settle_clear(state.local_guest());
                self.enter_account(&mut state, account_id, guest).await
            }
            SessionEvent::SignedOut => {
                match &*state {
                    CoordinatorState::Empty { .. } | CoordinatorState::ActiveGuest(_) => {}
                    CoordinatorState::Unresolved
                    | CoordinatorState::ActiveAccount { .. }
                    | CoordinatorState::AccountUnavailable { .. } => {
                        let guest = state.local_guest();
                        self.enter_local(&mut state, guest);
                    }
                }
                Ok(())
            }
        }
    }

    /// Creates a guest named `display_name`, persists it and makes it active.
    ///
    /// # Errors
    ///
    /// - [`ProgressError::Unresolved`] before the first session event.
    /// - [`ProgressError::InvalidState`] while a guest or an account is active.
    /// - [`ProgressError::InvalidInput`] for an unusable display name.
    pub async fn create_guest(&self, display_name: &str) -> Result<GuestRecord, ProgressError> {
        let mut state = self.state.lock().await;
        match &*state {
            CoordinatorState::Empty { .. } => {}
            CoordinatorState::Unresolved => return Err(ProgressError::Unresolved),
            other => {
                return Err(ProgressError::InvalidState {
                    action: "create a guest",
                    state: other.describe(),
                })
            }
        }

        let record = GuestRecord::create(display_name)?;
        let durability = self.local.save(&record);
        tracing::info!(guest_id = %record.guest_id, ?durability, "guest created");

        *state = CoordinatorState::ActiveGuest(record.clone());
        self.publish_state(&state);
        Ok(record)
    }

    /// Deletes the active guest and its progress.
    ///
    /// Clearing when no identity is active is a no-op. If the slot cannot be
    /// deleted, the cleared guest stays hidden and the delete is tried again
    /// on later transitions.
    ///
    /// # Errors
    ///
    /// - [`ProgressError::Unresolved`] before the first session event.
    /// - [`ProgressError::InvalidState`] while an account is signed in.
    pub async fn clear_guest(&self) -> Result<(), ProgressError> {
        let mut state = self.state.lock().await;
        let cleared = match &*state {
            CoordinatorState::ActiveGuest(record) => Some(record.guest_id.clone()),
            CoordinatorState::Empty { cleared } => cleared.clone(),
            CoordinatorState::Unresolved => return Err(ProgressError::Unresolved),
            other => {
                return Err(ProgressError::InvalidState {
                    action: "clear the guest",
                    state: other.describe(),
                })
            }
        };

        let durability = self.local.clear();
        let cleared = match (durability, cleared) {
            (Durability::MemoryOnly, Some(guest_id)) => {
                tracing::warn!(
                    guest_id = %guest_id,
                    "guest cleared but still in storage; hiding it"
                );
                Some(guest_id)
            }
            (_, cleared) => {
                if let Some(guest_id) = cleared {
                    tracing::info!(guest_id = %guest_id, "guest cleared");
                }
                None
            }
        };
        *state = CoordinatorState::Empty { cleared };
        self.publish_state(&state);
        Ok(())
    }

    /// Re-runs a failed account profile fetch. A no-op in any other state.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Remote`] if the fetch fails again.
    pub async fn retry(&self) -> Result<(), ProgressError> {
        let mut state = self.state.lock().await;
        if let CoordinatorState::AccountUnavailable {
            account_id, guest, ..
        } = &*state
        {
            let account_id = account_id.clone();
            let guest = guest.clone();
            return self.enter_account(&mut state, account_id, guest).await;
        }
        Ok(())
    }

    /// Applies `events` in order until the stream ends.
    ///
    /// Fetch failures are published as an error status and do not stop the loop.
    pub async fn run(&self, mut events: SessionEvents) {
        while let Some(event) = events.next().await {
            if let Err(err) = self.apply_session(event).await {
                tracing::warn!(error = %err, "session transition failed");
            }
        }
        tracing::debug!("session event stream closed");
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().await
    }

    pub(crate) const fn local(&self) -> &LocalProfileStore {
        &self.local
    }

    pub(crate) fn remote(&self) -> &dyn RemoteProfileStore {
        self.remote.as_ref()
    }

    pub(crate) fn publish_state(&self, state: &CoordinatorState) {
        self.published.send_replace(state.snapshot());
    }

    async fn enter_account(
        &self,
        state: &mut CoordinatorState,
        account_id: AccountId,
        guest: LocalGuest,
    ) -> Result<(), ProgressError> {
        self.published.send_replace(SessionSnapshot::loading(Identity::Account {
            account_id: account_id.clone(),
        }));

        match self.remote.fetch(&account_id).await {
            Ok(profile) => {
                let profile = profile.unwrap_or_else(|| {
                    tracing::debug!(account_id = %account_id, "new account; starting from an empty profile");
                    Profile::new()
                });
                tracing::info!(account_id = %account_id, xp = profile.xp(), "account profile loaded");
                *state = CoordinatorState::ActiveAccount {
                    account_id,
                    profile,
                    guest,
                };
                self.publish_state(state);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(account_id = %account_id, error = %err, "failed to load account profile");
                *state = CoordinatorState::AccountUnavailable {
                    account_id,
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                    guest,
                };
                self.publish_state(state);
                Err(err.into())
            }
        }
    }

    fn enter_local(&self, state: &mut CoordinatorState, guest: LocalGuest) {
        *state = match self.settle_clear(guest) {
            LocalGuest::Cleared(guest_id) => CoordinatorState::Empty {
                cleared: Some(guest_id),
            },
            LocalGuest::Dormant(record) => CoordinatorState::ActiveGuest(self.wake(record)),
            LocalGuest::Stored => match self.local.load() {
                Some(record) => {
                    tracing::info!(
                        guest_id = %record.guest_id,
                        xp = record.profile.xp(),
                        "guest profile restored"
                    );
                    CoordinatorState::ActiveGuest(record)
                }
                None => CoordinatorState::Empty { cleared: None },
            },
        };
        self.publish_state(state);
    }

    /// Returns the dormant guest to play, writing it back if the slot copy
    /// is behind.
    fn wake(&self, dormant: GuestRecord) -> GuestRecord {
        let progress = |record: &GuestRecord| {
            (record.profile.xp(), record.profile.completed_puzzles().len())
        };
        if let Some(stored) = self.local.load() {
            if stored.guest_id == dormant.guest_id && progress(&stored) >= progress(&dormant) {
                tracing::info!(
                    guest_id = %stored.guest_id,
                    xp = stored.profile.xp(),
                    "guest profile restored"
                );
                return stored;
            }
        }

        let durability = self.local.save(&dormant);
        tracing::info!(
            guest_id = %dormant.guest_id,
            xp = dormant.profile.xp(),
            ?durability,
            "guest profile restored from memory"
        );
        dormant
    }

    /// Retries the slot delete of a cleared guest. Leaves the marker in place
    /// while the delete keeps failing.
    fn settle_clear(&self, guest: LocalGuest) -> LocalGuest {
        let LocalGuest::Cleared(guest_id) = guest else {
            return guest;
        };
        if let Some(stored) = self.local.load() {
            if stored.guest_id != guest_id {
                // Another client has created a new guest since.
                return LocalGuest::Stored;
            }
        }

        match self.local.clear() {
            Durability::Durable => {
                tracing::info!(guest_id = %guest_id, "cleared guest deleted from storage");
                LocalGuest::Stored
            }
            Durability::MemoryOnly => LocalGuest::Cleared(guest_id),
        }
    }
}
