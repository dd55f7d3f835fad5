//! Configuration for the remote profile service.

use std::time::Duration;

use secrecy::SecretString;

use crate::remote::{RemoteError, RemoteResult};

/// Per-request timeout used unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport retries used unless configured otherwise.
///
/// Zero: the core surfaces transient failures and leaves retrying to the caller.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Environment variable holding the remote service base URL.
pub const ENV_REMOTE_URL: &str = "PUZZLEKIT_REMOTE_URL";
/// Environment variable holding the remote service API key.
pub const ENV_API_KEY: &str = "PUZZLEKIT_API_KEY";
/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "PUZZLEKIT_REMOTE_TIMEOUT_SECS";
/// Environment variable holding the transport retry budget.
pub const ENV_MAX_RETRIES: &str = "PUZZLEKIT_REMOTE_MAX_RETRIES";
/// Environment variable allowing plain `http://` base URLs when set to `1` or `true`.
pub const ENV_ALLOW_INSECURE: &str = "PUZZLEKIT_ALLOW_INSECURE";

/// Connection settings for [`crate::remote::HttpProfileStore`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the profile service, without a trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request, if any.
    pub api_key: Option<SecretString>,
    /// Timeout applied to each HTTP request.
    pub timeout: Duration,
    /// Extra attempts on transient failures (429, 5xx, timeouts, connect errors).
    pub max_retries: u32,
    /// Accept `http://` base URLs (local development and tests only).
    pub allow_insecure: bool,
}

impl RemoteConfig {
    /// Creates a configuration with default timeout and no transport retries.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            allow_insecure: false,
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transport retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Allows `http://` base URLs.
    #[must_use]
    pub fn allow_insecure(mut self) -> Self {
        self.allow_insecure = true;
        self
    }

    /// Reads the configuration from the `PUZZLEKIT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] if the base URL is missing or a
    /// numeric variable does not parse.
    pub fn from_env() -> RemoteResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RemoteResult<Self> {
        let base_url = lookup(ENV_REMOTE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| RemoteError::InvalidConfig(format!("{ENV_REMOTE_URL} is not set")))?;
        let mut config = Self::new(base_url);

        if let Some(api_key) = lookup(ENV_API_KEY).filter(|key| !key.is_empty()) {
            config = config.with_api_key(api_key);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = secs.trim().parse::<u64>().map_err(|err| {
                RemoteError::InvalidConfig(format!("{ENV_TIMEOUT_SECS}: {err}"))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = lookup(ENV_MAX_RETRIES) {
            let retries = retries.trim().parse::<u32>().map_err(|err| {
                RemoteError::InvalidConfig(format!("{ENV_MAX_RETRIES}: {err}"))
            })?;
            config = config.with_max_retries(retries);
        }
        if lookup(ENV_ALLOW_INSECURE).is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
            config = config.allow_insecure();
        }
        Ok(config)
    }

    /// Checks that the base URL is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] for an empty URL, or a non-HTTPS URL
    /// when `allow_insecure` is off.
    pub fn validate(&self) -> RemoteResult<()> {
        if self.base_url.is_empty() {
            return Err(RemoteError::InvalidConfig("base url is empty".to_string()));
        }
        let secure = self.base_url.starts_with("https://");
        let insecure = self.base_url.starts_with("http://");
        if !secure && !(insecure && self.allow_insecure) {
            return Err(RemoteError::InvalidConfig(format!(
                "base url must use https: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}
