//! External collaborators: player identity lookup, account links, allow-list
//! and violation registry.
//!
//! Every adapter classifies its failures into [`UpstreamError`] so callers
//! never inspect transport-level error shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod api;
pub mod identity;

/// Classified adapter failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The backing service could not be reached.
    #[error("upstream service unavailable")]
    Unavailable,
    /// The requested record does not exist.
    #[error("not found")]
    NotFound,
    /// Anything else (bad status, undecodable body, ...).
    #[error("upstream error: {0}")]
    Other(String),
}

impl UpstreamError {
    /// Classify a reqwest transport error.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            UpstreamError::Unavailable
        } else if err.is_decode() {
            UpstreamError::Other(format!("undecodable response: {err}"))
        } else {
            UpstreamError::Other(err.to_string())
        }
    }
}

/// Result extension for lookups where absence is an ordinary answer.
pub trait UpstreamResultExt<T> {
    /// Map [`UpstreamError::NotFound`] to `Ok(None)`.
    fn found(self) -> Result<Option<T>, UpstreamError>;
}

impl<T> UpstreamResultExt<T> for Result<T, UpstreamError> {
    fn found(self) -> Result<Option<T>, UpstreamError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(UpstreamError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A resolved game identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    /// Canonical id, stable across renames.
    pub id: String,
    /// Current display name with canonical capitalisation.
    pub name: String,
}

/// Chat identity ⇄ game identity link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    /// Canonical game identity id.
    #[serde(rename = "minecraft_uuid")]
    pub game_id: String,
    /// Chat-platform user id.
    #[serde(rename = "discord_user_id")]
    pub chat_user_id: String,
}

/// One allow-list grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListEntry {
    /// Granted game identity id.
    #[serde(rename = "minecraft_uuid")]
    pub game_id: String,
    /// Server the grant applies to.
    pub server_id: String,
}

/// A sanction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Sanctioned identity (chat or game id).
    #[serde(default, alias = "minecraft_uuid", alias = "discord_user_id")]
    pub identity_id: String,
    /// Free-form reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Resolves names to canonical game identities.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Resolve a (case-insensitive) name; `NotFound` when no such player.
    async fn resolve_by_name(&self, name: &str) -> Result<GameProfile, UpstreamError>;

    /// Past names of an identity, most recent last.
    async fn resolve_name_history(&self, canonical_id: &str) -> Result<Vec<String>, UpstreamError>;
}

/// Chat ⇄ game account links.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Link for a chat user; `NotFound` when unlinked.
    async fn get_link(&self, chat_user_id: &str) -> Result<AccountLink, UpstreamError>;

    /// Create a link.
    async fn create_link(&self, game_id: &str, chat_user_id: &str) -> Result<(), UpstreamError>;
}

/// Per-server allow-lists.
#[async_trait]
pub trait AllowList: Send + Sync {
    /// Entries for one server.
    async fn get_entries(&self, server_id: &str) -> Result<Vec<AllowListEntry>, UpstreamError>;

    /// Entries across every server.
    async fn get_all_entries(&self) -> Result<Vec<AllowListEntry>, UpstreamError>;

    /// Grant `entry`.
    async fn create_entry(&self, entry: &AllowListEntry) -> Result<(), UpstreamError>;

    /// Whether `game_id` already holds an entry on `server_id`.
    async fn contains(&self, server_id: &str, game_id: &str) -> Result<bool, UpstreamError> {
        let entries = self.get_entries(server_id).await.found()?.unwrap_or_default();
        Ok(entries.iter().any(|e| e.game_id == game_id))
    }
}

/// Sanction lookups.
#[async_trait]
pub trait ViolationRegistry: Send + Sync {
    /// Violation for an identity; `NotFound` when clean.
    async fn get_violation(&self, identity_id: &str) -> Result<Violation, UpstreamError>;
}

/// The upstream collaborators, shared by every handler.
#[derive(Clone)]
pub struct Upstreams {
    pub identity: Arc<dyn IdentityLookup>,
    pub links: Arc<dyn LinkStore>,
    pub allow_list: Arc<dyn AllowList>,
    pub violations: Arc<dyn ViolationRegistry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_maps_not_found_to_none() {
        let missing: Result<u8, UpstreamError> = Err(UpstreamError::NotFound);
        assert_eq!(missing.found(), Ok(None));

        let present: Result<u8, UpstreamError> = Ok(7);
        assert_eq!(present.found(), Ok(Some(7)));

        let down: Result<u8, UpstreamError> = Err(UpstreamError::Unavailable);
        assert_eq!(down.found(), Err(UpstreamError::Unavailable));
    }

    #[test]
    fn entries_use_upstream_field_names() {
        let entry: AllowListEntry = serde_json::from_str(
            r#"{ "minecraft_uuid": "069a79f4", "server_id": "main", "extra": 1 }"#,
        )
        .unwrap();
        assert_eq!(entry.game_id, "069a79f4");
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({ "minecraft_uuid": "069a79f4", "server_id": "main" })
        );
    }
}
