//! Exactly-once reward granting for correct puzzle answers.

use std::sync::Arc;

use crate::coordinator::{CoordinatorState, IdentityCoordinator};
use crate::error::ProgressError;
use crate::profile::{GuestRecord, Profile, PuzzleId};
use crate::storage::Durability;

/// Result of a [`SubmissionGuard::submit`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The answer was wrong. Nothing changed.
    Rejected,
    /// First completion of the puzzle for the active identity.
    Granted {
        /// XP added.
        reward: u64,
        /// Profile after the grant.
        profile: Profile,
    },
    /// The puzzle was already completed. Nothing changed.
    AlreadyCompleted {
        /// The current profile.
        profile: Profile,
    },
    /// Correct answer with no active identity: acknowledged, not recorded.
    Unpersisted {
        /// XP that would have been awarded.
        reward: u64,
    },
}

impl SubmissionOutcome {
    /// Whether this submission added XP to a profile.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// The profile after the submission, if an identity was active.
    #[must_use]
    pub const fn profile(&self) -> Option<&Profile> {
        match self {
            Self::Granted { profile, .. } | Self::AlreadyCompleted { profile } => Some(profile),
            Self::Rejected | Self::Unpersisted { .. } => None,
        }
    }
}

/// Decides whether a submitted answer solves a puzzle.
///
/// Puzzle content lives with the host; the core only needs the verdict.
pub trait AnswerChecker: Send + Sync {
    /// Returns `true` if `answer` solves `puzzle_id`.
    fn check_answer(&self, puzzle_id: &PuzzleId, answer: &str) -> bool;
}

impl<F> AnswerChecker for F
where
    F: Fn(&PuzzleId, &str) -> bool + Send + Sync,
{
    fn check_answer(&self, puzzle_id: &PuzzleId, answer: &str) -> bool {
        self(puzzle_id, answer)
    }
}

/// Applies puzzle completions to whichever identity is active.
///
/// Submissions share the coordinator's lock with session transitions, so a
/// grant always lands on the identity that was active when it started and is
/// never interleaved with another submission from this client.
#[derive(Debug, Clone)]
pub struct SubmissionGuard {
    coordinator: Arc<IdentityCoordinator>,
}

impl SubmissionGuard {
    /// Creates a guard over `coordinator`.
    #[must_use]
    pub const fn new(coordinator: Arc<IdentityCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Records a completion of `puzzle_id`, awarding `reward` XP the first
    /// time only.
    ///
    /// # Errors
    ///
    /// - [`ProgressError::InvalidInput`] for an empty puzzle id.
    /// - [`ProgressError::Unresolved`] before the first session event.
    /// - [`ProgressError::Remote`] if the account store could not be reached.
    ///   No XP was granted by this call in that case; resubmitting is safe.
    pub async fn submit(
        &self,
        puzzle_id: &PuzzleId,
        is_correct: bool,
        reward: u64,
    ) -> Result<SubmissionOutcome, ProgressError> {
        puzzle_id.validate()?;
        if !is_correct {
            tracing::debug!(puzzle_id = %puzzle_id, "incorrect answer");
            return Ok(SubmissionOutcome::Rejected);
        }

        let mut state = self.coordinator.lock_state().await;
        let outcome = match &mut *state {
            CoordinatorState::Unresolved => return Err(ProgressError::Unresolved),
            CoordinatorState::Empty { .. } => {
                tracing::debug!(puzzle_id = %puzzle_id, "no active identity; completion not recorded");
                return Ok(SubmissionOutcome::Unpersisted { reward });
            }
            CoordinatorState::ActiveGuest(record) => {
                self.complete_as_guest(record, puzzle_id, reward)
            }
            CoordinatorState::ActiveAccount {
                account_id, guest, ..
            }
            | CoordinatorState::AccountUnavailable {
                account_id, guest, ..
            } => {
                let account_id = account_id.clone();
                let guest = guest.clone();
                let grant = self
                    .coordinator
                    .remote()
                    .grant_once(&account_id, puzzle_id, reward)
                    .await?;
                tracing::info!(
                    account_id = %account_id,
                    puzzle_id = %puzzle_id,
                    granted = grant.granted,
                    xp = grant.profile.xp(),
                    "account submission"
                );
                *state = CoordinatorState::ActiveAccount {
                    account_id,
                    profile: grant.profile.clone(),
                    guest,
                };
                if grant.granted {
                    SubmissionOutcome::Granted {
                        reward,
                        profile: grant.profile,
                    }
                } else {
                    SubmissionOutcome::AlreadyCompleted {
                        profile: grant.profile,
                    }
                }
            }
        };

        self.coordinator.publish_state(&state);
        Ok(outcome)
    }

    /// Checks `answer` with `checker`, then submits the verdict.
    ///
    /// # Errors
    ///
    /// Same as [`SubmissionGuard::submit`].
    pub async fn submit_answer(
        &self,
        checker: &dyn AnswerChecker,
        puzzle_id: &PuzzleId,
        answer: &str,
        reward: u64,
    ) -> Result<SubmissionOutcome, ProgressError> {
        let is_correct = checker.check_answer(puzzle_id, answer);
        self.submit(puzzle_id, is_correct, reward).await
    }

    fn complete_as_guest(
        &self,
        record: &mut GuestRecord,
        puzzle_id: &PuzzleId,
        reward: u64,
    ) -> SubmissionOutcome {
        if !record.profile.record_completion(puzzle_id, reward) {
            return SubmissionOutcome::AlreadyCompleted {
                profile: record.profile.clone(),
            };
        }

        if self.coordinator.local().save(record) == Durability::MemoryOnly {
            tracing::warn!(
                guest_id = %record.guest_id,
                puzzle_id = %puzzle_id,
                "guest progress kept in memory only"
            );
        }
        tracing::info!(guest_id = %record.guest_id, puzzle_id = %puzzle_id, reward, "guest reward granted");
        SubmissionOutcome::Granted {
            reward,
            profile: record.profile.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryProfileStore;
    use crate::session::SessionEvent;
    use crate::storage::{LocalProfileStore, MemorySlotStore, DEFAULT_GUEST_SLOT};

    struct Fixture {
        slots: Arc<MemorySlotStore>,
        remote: Arc<MemoryProfileStore>,
        coordinator: Arc<IdentityCoordinator>,
        guard: SubmissionGuard,
    }

    fn fixture() -> Fixture {
        let slots = Arc::new(MemorySlotStore::new());
        let remote = Arc::new(MemoryProfileStore::new());
        let coordinator = Arc::new(IdentityCoordinator::new(
            LocalProfileStore::new(slots.clone(), DEFAULT_GUEST_SLOT),
            remote.clone(),
        ));
        let guard = SubmissionGuard::new(Arc::clone(&coordinator));
        Fixture {
            slots,
            remote,
            coordinator,
            guard,
        }
    }

    #[tokio::test]
    async fn test_guest_double_submit_grants_once() {
        let f = fixture();
        f.coordinator.apply_session(SessionEvent::SignedOut).await.unwrap();
        f.coordinator.create_guest("Ada").await.unwrap();

        let puzzle = PuzzleId::from("case-1");
        let first = f.guard.submit(&puzzle, true, 100).await.unwrap();
        assert!(first.is_granted());
        assert_eq!(first.profile().unwrap().xp(), 100);

        let second = f.guard.submit(&puzzle, true, 100).await.unwrap();
        assert_eq!(
            second,
            SubmissionOutcome::AlreadyCompleted {
                profile: first.profile().unwrap().clone()
            }
        );

        // Persisted: a fresh store reading the same slot sees the completion.
        let reloaded = LocalProfileStore::new(f.slots.clone(), DEFAULT_GUEST_SLOT)
            .load()
            .unwrap();
        assert_eq!(reloaded.profile.xp(), 100);
        assert!(reloaded.profile.is_completed(&puzzle));
        assert_eq!(f.coordinator.snapshot().profile.unwrap().xp(), 100);
    }

    #[tokio::test]
    async fn test_incorrect_answer_changes_nothing() {
        let f = fixture();
        f.coordinator.apply_session(SessionEvent::SignedOut).await.unwrap();
        f.coordinator.create_guest("Ada").await.unwrap();

        let outcome = f.guard.submit(&"case-1".into(), false, 100).await.unwrap();
        assert_eq!(outcome, SubmissionOutcome::Rejected);
        assert_eq!(f.coordinator.snapshot().profile.unwrap().xp(), 0);
    }

    #[tokio::test]
    async fn test_no_identity_is_unpersisted() {
        let f = fixture();
        f.coordinator.apply_session(SessionEvent::SignedOut).await.unwrap();

        let outcome = f.guard.submit(&"case-1".into(), true, 100).await.unwrap();
        assert_eq!(outcome, SubmissionOutcome::Unpersisted { reward: 100 });
        assert!(f.slots.is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_is_refused() {
        let f = fixture();
        assert!(matches!(
            f.guard.submit(&"case-1".into(), true, 100).await,
            Err(ProgressError::Unresolved)
        ));
    }

    #[tokio::test]
    async fn test_empty_puzzle_id_is_invalid() {
        let f = fixture();
        assert!(matches!(
            f.guard.submit(&"  ".into(), true, 100).await,
            Err(ProgressError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_account_submission_uses_remote() {
        let f = fixture();
        f.coordinator
            .apply_session(SessionEvent::SignedIn("acct-1".into()))
            .await
            .unwrap();

        let outcome = f.guard.submit(&"case-1".into(), true, 100).await.unwrap();
        assert!(outcome.is_granted());
        assert_eq!(f.remote.profile(&"acct-1".into()).unwrap().xp(), 100);
        assert!(f.slots.is_empty());
        assert_eq!(f.coordinator.snapshot().profile.unwrap().xp(), 100);
    }

    #[tokio::test]
    async fn test_remote_failure_grants_nothing_and_resubmit_is_safe() {
        let f = fixture();
        f.coordinator
            .apply_session(SessionEvent::SignedIn("acct-1".into()))
            .await
            .unwrap();

        f.remote.fail_next(1);
        let err = f.guard.submit(&"case-1".into(), true, 100).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(f.remote.profile(&"acct-1".into()).is_none());

        let outcome = f.guard.submit(&"case-1".into(), true, 100).await.unwrap();
        assert!(outcome.is_granted());
        assert_eq!(f.remote.profile(&"acct-1".into()).unwrap().xp(), 100);
    }

    #[tokio::test]
    async fn test_submit_answer_uses_checker() {
        let f = fixture();
        f.coordinator.apply_session(SessionEvent::SignedOut).await.unwrap();
        f.coordinator.create_guest("Ada").await.unwrap();

        let checker = |_: &PuzzleId, answer: &str| answer.eq_ignore_ascii_case("the butler");
        let puzzle = PuzzleId::from("case-1");

        let wrong = f
            .guard
            .submit_answer(&checker, &puzzle, "the gardener", 100)
            .await
            .unwrap();
        assert_eq!(wrong, SubmissionOutcome::Rejected);

        let right = f
            .guard
            .submit_answer(&checker, &puzzle, "The Butler", 100)
            .await
            .unwrap();
        assert!(right.is_granted());
    }
}
