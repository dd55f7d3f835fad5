//! Error types for the remote profile store.

use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised while talking to the remote data service.
///
/// A missing profile row is not an error; see [`super::RemoteProfileStore::fetch`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure or an unexpected HTTP status.
    #[error("network_error: {url} (status {status:?}): {error}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Description of the failure.
        error: String,
    },
    /// The store is temporarily unable to serve requests.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// The remote configuration cannot be used.
    #[error("invalid_config: {0}")]
    InvalidConfig(String),
    /// The service answered with something this client cannot interpret.
    #[error("unexpected_response: {0}")]
    UnexpectedResponse(String),
}

impl RemoteError {
    /// Whether the failure is transient and the request may be repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { status, .. } => match status {
                None => true,
                Some(status) => *status == 429 || *status >= 500,
            },
            Self::Unavailable(_) => true,
            Self::InvalidConfig(_) | Self::UnexpectedResponse(_) => false,
        }
    }
}
