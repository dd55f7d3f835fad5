//! HTTP implementation of the remote profile store.
//!
//! Wire contract:
//!
//! - `GET {base}/profiles/{account_id}` returns the row
//!   `{"xp": int, "completed_puzzles": [string]}` (a one-element array of rows
//!   is accepted too), or `404` when the account has no row yet.
//! - `POST {base}/rpc/grant_once` with
//!   `{"account_id", "puzzle_id", "reward_amount", "completed_puzzles"}`
//!   applies the write only if `puzzle_id` is not yet in the row, and answers
//!   `{"applied": bool}`. `409` is read as "not applied".

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::row::profile_from_row;
use super::{Grant, RemoteError, RemoteProfileStore, RemoteResult};
use crate::config::RemoteConfig;
use crate::http_request::Request;
use crate::profile::{AccountId, Profile, PuzzleId};

#[derive(Serialize)]
struct GrantOnceRequest<'a> {
    account_id: &'a AccountId,
    puzzle_id: &'a PuzzleId,
    reward_amount: u64,
    completed_puzzles: Vec<&'a PuzzleId>,
}

#[derive(Deserialize)]
struct GrantOnceResponse {
    applied: bool,
}

/// Remote profile store speaking JSON over HTTP(S).
pub struct HttpProfileStore {
    base_url: Url,
    request: Request,
}

impl std::fmt::Debug for HttpProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProfileStore")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpProfileStore {
    /// Creates a store for the service described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] if the base URL is not usable.
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        config.validate()?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| RemoteError::InvalidConfig(format!("{}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidConfig(format!(
                "{} cannot be used as a base url",
                config.base_url
            )));
        }
        Ok(Self {
            base_url,
            request: Request::new(config),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn unexpected_status(url: &Url, response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        RemoteError::Network {
            url: url.to_string(),
            status: Some(status),
            error: format!("unexpected status {status}: {body}"),
        }
    }
}

#[async_trait]
impl RemoteProfileStore for HttpProfileStore {
    async fn fetch(&self, account_id: &AccountId) -> RemoteResult<Option<Profile>> {
        let url = self.endpoint(&["profiles", account_id.as_str()]);
        let response = self
            .request
            .handle(self.request.get(url.as_str()))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(account_id = %account_id, "no remote profile yet");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::unexpected_status(&url, response).await);
        }

        let body: Value = response.json().await.map_err(|err| {
            RemoteError::UnexpectedResponse(format!("profile body from {url}: {err}"))
        })?;
        let row = match body {
            Value::Array(mut rows) => {
                if rows.is_empty() {
                    return Ok(None);
                }
                rows.swap_remove(0)
            }
            row => row,
        };
        Ok(Some(profile_from_row(&row)))
    }

    async fn grant_once(
        &self,
        account_id: &AccountId,
        puzzle_id: &PuzzleId,
        reward: u64,
    ) -> RemoteResult<Grant> {
        let current = self.fetch(account_id).await?.unwrap_or_default();
        if current.is_completed(puzzle_id) {
            return Ok(Grant {
                granted: false,
                profile: current,
            });
        }

        let mut next = current.clone();
        next.record_completion(puzzle_id, reward);

        let url = self.endpoint(&["rpc", "grant_once"]);
        let body = GrantOnceRequest {
            account_id,
            puzzle_id,
            reward_amount: reward,
            completed_puzzles: next.completed_puzzles().iter().collect(),
        };
        let response = self
            .request
            .handle(self.request.post(url.as_str()).json(&body))
            .await?;

        let applied = match response.status() {
            StatusCode::CONFLICT => false,
            status if status.is_success() => {
                response
                    .json::<GrantOnceResponse>()
                    .await
                    .map_err(|err| {
                        RemoteError::UnexpectedResponse(format!("grant body from {url}: {err}"))
                    })?
                    .applied
            }
            _ => return Err(Self::unexpected_status(&url, response).await),
        };

        if applied {
            tracing::info!(account_id = %account_id, puzzle_id = %puzzle_id, reward, "reward granted");
            return Ok(Grant {
                granted: true,
                profile: next,
            });
        }

        // Someone else completed it between our read and the conditional write.
        let latest = self.fetch(account_id).await?.unwrap_or_default();
        if !latest.is_completed(puzzle_id) {
            return Err(RemoteError::UnexpectedResponse(format!(
                "grant of {puzzle_id} was refused but the puzzle is not completed"
            )));
        }
        Ok(Grant {
            granted: false,
            profile: latest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_store(base: &str) -> HttpProfileStore {
        HttpProfileStore::new(&RemoteConfig::new(base).allow_insecure()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let store = http_store("https://progress.example.test/v1");
        assert_eq!(
            store.endpoint(&["profiles", "acct/1"]).as_str(),
            "https://progress.example.test/v1/profiles/acct%2F1"
        );

        let store = http_store("https://progress.example.test");
        assert_eq!(
            store.endpoint(&["rpc", "grant_once"]).as_str(),
            "https://progress.example.test/rpc/grant_once"
        );
    }

    #[test]
    fn test_rejects_insecure_base_by_default() {
        assert!(matches!(
            HttpProfileStore::new(&RemoteConfig::new("http://progress.example.test")),
            Err(RemoteError::InvalidConfig(_))
        ));
    }
}
