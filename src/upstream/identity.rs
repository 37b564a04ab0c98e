//! Player identity lookup over the public profile API.

use super::{GameProfile, IdentityLookup, UpstreamError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct NameRecord {
    name: String,
}

/// Profile API client.
///
/// `GET /users/profiles/minecraft/{name}` resolves a name,
/// `GET /user/profiles/{id}/names` lists past names oldest first.
#[derive(Clone)]
pub struct ProfileApi {
    base: String,
    http: reqwest::Client,
}

impl ProfileApi {
    /// Create a client for `base`.
    pub fn new(base: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whitelistd/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, UpstreamError> {
        debug!(url = %url, "Profile lookup");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_transport(&e))?;

        match response.status() {
            // The profile API answers unknown names with 204 or 404.
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Err(UpstreamError::NotFound),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                Err(UpstreamError::Unavailable)
            }
            s if s.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| UpstreamError::from_transport(&e)),
            s => Err(UpstreamError::Other(format!("unexpected status {s}"))),
        }
    }
}

/// Names are 3-16 characters of `[A-Za-z0-9_]`; anything else cannot exist.
pub fn is_plausible_name(name: &str) -> bool {
    (3..=16).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[async_trait]
impl IdentityLookup for ProfileApi {
    async fn resolve_by_name(&self, name: &str) -> Result<GameProfile, UpstreamError> {
        if !is_plausible_name(name) {
            return Err(UpstreamError::NotFound);
        }
        self.fetch(format!("{}/users/profiles/minecraft/{}", self.base, name))
            .await
    }

    async fn resolve_name_history(&self, canonical_id: &str) -> Result<Vec<String>, UpstreamError> {
        let records: Vec<NameRecord> = self
            .fetch(format!("{}/user/profiles/{}/names", self.base, canonical_id))
            .await?;
        Ok(records.into_iter().map(|r| r.name).collect())
    }
}
