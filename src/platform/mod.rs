//! Chat-platform surface: interaction replies, messages and role mutation.

use async_trait::async_trait;
use thiserror::Error;
use whitelist_proto::{InteractionHandle, InteractionResponse, MessagePayload};

pub mod rest;

/// Platform call failures.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable response: {0}")]
    Decode(String),
}

/// A guild member as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// User id.
    pub user_id: String,
    /// Account name.
    pub username: String,
    /// Role ids held.
    pub roles: Vec<String>,
}

impl Member {
    /// Whether the member holds `role_id`.
    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }
}

/// Outbound operations against the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Answer an interaction (must happen once, shortly after it arrives).
    async fn respond(
        &self,
        handle: &InteractionHandle,
        response: InteractionResponse,
    ) -> Result<(), PlatformError>;

    /// Replace the original reply to an interaction.
    async fn edit_original(
        &self,
        handle: &InteractionHandle,
        payload: MessagePayload,
    ) -> Result<(), PlatformError>;

    /// Look up a guild member; `None` when the user is not in the guild.
    async fn fetch_member(&self, guild_id: &str, user_id: &str)
    -> Result<Option<Member>, PlatformError>;

    /// Grant a role.
    async fn add_role(&self, guild_id: &str, user_id: &str, role_id: &str)
    -> Result<(), PlatformError>;

    /// Revoke a role.
    async fn remove_role(&self, guild_id: &str, user_id: &str, role_id: &str)
    -> Result<(), PlatformError>;

    /// Post to a channel, returning the new message id.
    async fn send_message(
        &self,
        channel_id: &str,
        payload: MessagePayload,
    ) -> Result<String, PlatformError>;

    /// Edit an existing channel message in place.
    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: MessagePayload,
    ) -> Result<(), PlatformError>;

    /// Send a direct message (may be refused by the user's privacy settings).
    async fn send_direct(&self, user_id: &str, payload: MessagePayload)
    -> Result<(), PlatformError>;
}
