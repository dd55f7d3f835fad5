//! Progress data model: identifiers, identities and the `Profile` record.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ProgressError;

/// Longest display name accepted for a guest, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 40;

/// Opaque puzzle identifier (e.g. `case-1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PuzzleId(String);

impl PuzzleId {
    /// Wraps a raw puzzle identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn validate(&self) -> Result<(), ProgressError> {
        if self.0.trim().is_empty() {
            return Err(ProgressError::InvalidInput {
                attribute: "puzzle_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl From<&str> for PuzzleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PuzzleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PuzzleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account identifier handed out by the authentication provider. Never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wraps a raw account identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locally generated guest identifier, stable for the lifetime of the guest profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(String);

impl GuestId {
    /// Generates a fresh random (UUID v4) guest id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulated progress for one identity.
///
/// Both fields only ever grow: `xp` is raised exclusively through
/// [`Profile::record_completion`], which adds a reward only for puzzles that
/// were not yet in the completed set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    xp: u64,
    completed_puzzles: BTreeSet<PuzzleId>,
}

impl Profile {
    /// An empty profile: zero XP and no completions.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            xp: 0,
            completed_puzzles: BTreeSet::new(),
        }
    }

    /// Rebuilds a profile from stored parts. Duplicate puzzle ids collapse.
    pub fn from_parts(xp: u64, completed: impl IntoIterator<Item = PuzzleId>) -> Self {
        Self {
            xp,
            completed_puzzles: completed.into_iter().collect(),
        }
    }

    /// Total reward points.
    #[must_use]
    pub const fn xp(&self) -> u64 {
        self.xp
    }

    /// Puzzles that have already earned their reward.
    #[must_use]
    pub const fn completed_puzzles(&self) -> &BTreeSet<PuzzleId> {
        &self.completed_puzzles
    }

    /// Whether `puzzle_id` has already been completed.
    #[must_use]
    pub fn is_completed(&self, puzzle_id: &PuzzleId) -> bool {
        self.completed_puzzles.contains(puzzle_id)
    }

    /// Marks `puzzle_id` complete and adds `reward` to `xp`, unless it is already complete.
    ///
    /// Returns `true` when the reward was applied.
    pub fn record_completion(&mut self, puzzle_id: &PuzzleId, reward: u64) -> bool {
        if !self.completed_puzzles.insert(puzzle_id.clone()) {
            return false;
        }
        self.xp = self.xp.saturating_add(reward);
        true
    }
}

/// Kind of the active identity, as shown to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum IdentityKind {
    /// Nobody is playing under a persisted identity.
    None,
    /// An anonymous, locally persisted player.
    Guest,
    /// A signed-in account holder.
    Account,
}

/// The player context progress is currently attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    /// No active identity.
    #[default]
    None,
    /// Anonymous player persisted on this device.
    Guest {
        /// Generated id of the guest profile.
        guest_id: GuestId,
        /// Name the player chose.
        display_name: String,
    },
    /// Authenticated player backed by the remote store.
    Account {
        /// Provider-issued account id.
        account_id: AccountId,
    },
}

impl Identity {
    /// Returns the kind of this identity.
    #[must_use]
    pub const fn kind(&self) -> IdentityKind {
        match self {
            Self::None => IdentityKind::None,
            Self::Guest { .. } => IdentityKind::Guest,
            Self::Account { .. } => IdentityKind::Account,
        }
    }
}

/// A guest identity together with its progress; the unit the local store persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRecord {
    /// Generated id, fixed for the lifetime of the guest.
    pub guest_id: GuestId,
    /// Name the player chose when creating the guest.
    pub display_name: String,
    /// Progress earned as this guest.
    pub profile: Profile,
}

impl GuestRecord {
    /// Creates a brand-new guest with a fresh id and an empty profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::InvalidInput`] if the trimmed display name is empty
    /// or longer than [`MAX_DISPLAY_NAME_CHARS`].
    pub fn create(display_name: &str) -> Result<Self, ProgressError> {
        let display_name = validate_display_name(display_name)?;
        Ok(Self {
            guest_id: GuestId::generate(),
            display_name,
            profile: Profile::new(),
        })
    }

    /// The identity this record represents.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::Guest {
            guest_id: self.guest_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

fn validate_display_name(raw: &str) -> Result<String, ProgressError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ProgressError::InvalidInput {
            attribute: "display_name".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(ProgressError::InvalidInput {
            attribute: "display_name".to_string(),
            reason: format!("must be at most {MAX_DISPLAY_NAME_CHARS} characters"),
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_record_completion_applies_reward_once() {
        let mut profile = Profile::new();
        let puzzle = PuzzleId::from("case-1");

        assert!(profile.record_completion(&puzzle, 100));
        assert!(!profile.record_completion(&puzzle, 100));
        assert!(!profile.record_completion(&puzzle, 250));

        assert_eq!(profile.xp(), 100);
        assert_eq!(profile.completed_puzzles().len(), 1);
        assert!(profile.is_completed(&puzzle));
    }

    #[test]
    fn test_record_completion_saturates() {
        let mut profile = Profile::from_parts(u64::MAX - 1, Vec::<PuzzleId>::new());
        assert!(profile.record_completion(&"big".into(), 10));
        assert_eq!(profile.xp(), u64::MAX);
    }

    #[test]
    fn test_from_parts_collapses_duplicates() {
        let profile = Profile::from_parts(
            30,
            ["a", "b", "a"].into_iter().map(PuzzleId::from),
        );
        assert_eq!(profile.completed_puzzles().len(), 2);
    }

    #[test_case("Ada", "Ada" ; "plain")]
    #[test_case("  Grace  ", "Grace" ; "trimmed")]
    fn test_guest_create_accepts(input: &str, expected: &str) {
        let guest = GuestRecord::create(input).unwrap();
        assert_eq!(guest.display_name, expected);
        assert_eq!(guest.profile, Profile::new());
        assert!(!guest.guest_id.as_str().is_empty());
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "whitespace")]
    #[test_case("a-name-that-is-definitely-longer-than-forty-chars" ; "too long")]
    fn test_guest_create_rejects(input: &str) {
        assert!(matches!(
            GuestRecord::create(input),
            Err(ProgressError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_guest_ids_are_unique() {
        assert_ne!(GuestId::generate(), GuestId::generate());
    }

    #[test]
    fn test_identity_kind_display() {
        assert_eq!(IdentityKind::Guest.to_string(), "guest");
        assert_eq!("account".parse::<IdentityKind>().unwrap(), IdentityKind::Account);
        assert_eq!(Identity::None.kind(), IdentityKind::None);
    }
}
