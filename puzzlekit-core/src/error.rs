use thiserror::Error;

use crate::remote::RemoteError;

/// Error outputs from `PuzzleKit`
///
/// Expected outcomes (wrong answer, puzzle already completed, no profile yet)
/// are never errors; they are reported through return values.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum ProgressError {
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that was rejected.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The active identity has not been decided yet; the profile is unknown
    #[error("identity_unresolved")]
    Unresolved,
    /// The action is not available for the active identity
    #[error("invalid_state: cannot {action} while {state}")]
    InvalidState {
        /// The action that was attempted.
        action: &'static str,
        /// Description of the current state.
        state: &'static str,
    },
    /// Failure talking to the remote profile store
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ProgressError {
    /// Whether the caller can retry the same operation as-is.
    ///
    /// Every operation of this crate is idempotent per puzzle id, so a retry of a
    /// retryable error never double-applies a reward.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Unresolved => true,
            Self::Remote(err) => err.is_retryable(),
            Self::InvalidInput { .. } | Self::InvalidState { .. } => false,
        }
    }
}
