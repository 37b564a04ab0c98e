//! Verification: reconcile a claimed game name with the requesting chat user
//! and, when both check out, grant access.
//!
//! Steps run strictly in order and short-circuit:
//!
//! 1. resolve the claimed name to a canonical game identity
//! 2. look the requester up in the guild
//! 3. report whichever of the two is unknown
//! 4. check both identities against the violation registry
//! 5. link accounts, add the allow-list entry, grant the access role, drop
//!    the wait-notice role
//!
//! A failure part way through step 5 is not rolled back.

use crate::config::GuildConfig;
use crate::error::HandlerError;
use crate::platform::ChatPlatform;
use crate::upstream::{AllowListEntry, UpstreamError, UpstreamResultExt, Upstreams};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of one verification. Exactly one per call; grant side effects
/// happen only for `Success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    GameIdentityUnknown,
    ChatIdentityUnknown { game_id: String },
    BothUnknown,
    Sanctioned { game_id: String },
    Success { game_id: String },
    InternalError,
    UpstreamUnavailable,
}

impl VerificationOutcome {
    /// Resolved canonical game id, when the outcome carries one.
    pub fn game_id(&self) -> Option<&str> {
        match self {
            Self::ChatIdentityUnknown { game_id }
            | Self::Sanctioned { game_id }
            | Self::Success { game_id } => Some(game_id),
            _ => None,
        }
    }

    /// Static label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GameIdentityUnknown => "game-identity-unknown",
            Self::ChatIdentityUnknown { .. } => "chat-identity-unknown",
            Self::BothUnknown => "both-unknown",
            Self::Sanctioned { .. } => "sanctioned",
            Self::Success { .. } => "success",
            Self::InternalError => "internal-error",
            Self::UpstreamUnavailable => "upstream-unavailable",
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct Verifier {
    upstreams: Upstreams,
    platform: Arc<dyn ChatPlatform>,
    guild: GuildConfig,
}

impl Verifier {
    pub fn new(upstreams: Upstreams, platform: Arc<dyn ChatPlatform>, guild: GuildConfig) -> Self {
        Self {
            upstreams,
            platform,
            guild,
        }
    }

    /// Verify `claimed_name` for `chat_user_id` against `server_id`. Never
    /// fails: errors become `UpstreamUnavailable` or `InternalError`.
    pub async fn verify(
        &self,
        claimed_name: &str,
        chat_user_id: &str,
        server_id: &str,
    ) -> VerificationOutcome {
        match self.run(claimed_name, chat_user_id, server_id).await {
            Ok(outcome) => outcome,
            Err(HandlerError::Upstream(UpstreamError::Unavailable)) => {
                warn!(
                    user_id = %chat_user_id,
                    game_name = %claimed_name,
                    "Upstream unavailable during verification"
                );
                VerificationOutcome::UpstreamUnavailable
            }
            Err(e) => {
                error!(
                    user_id = %chat_user_id,
                    game_name = %claimed_name,
                    error = %e,
                    "Verification failed"
                );
                VerificationOutcome::InternalError
            }
        }
    }

    async fn run(
        &self,
        claimed_name: &str,
        chat_user_id: &str,
        server_id: &str,
    ) -> Result<VerificationOutcome, HandlerError> {
        let profile = self
            .upstreams
            .identity
            .resolve_by_name(claimed_name)
            .await
            .found()?;
        let member = self.platform.fetch_member(&self.guild.id, chat_user_id).await?;

        let (profile, member) = match (profile, member) {
            (None, None) => return Ok(VerificationOutcome::BothUnknown),
            (None, Some(_)) => return Ok(VerificationOutcome::GameIdentityUnknown),
            (Some(profile), None) => {
                return Ok(VerificationOutcome::ChatIdentityUnknown { game_id: profile.id });
            }
            (Some(profile), Some(member)) => (profile, member),
        };
        debug!(
            game_name = %profile.name,
            game_id = %profile.id,
            member = %member.username,
            "Identities resolved"
        );

        let violations = &self.upstreams.violations;
        let chat_violation = violations.get_violation(chat_user_id).await.found()?;
        let game_violation = violations.get_violation(&profile.id).await.found()?;
        if chat_violation.is_some() || game_violation.is_some() {
            return Ok(VerificationOutcome::Sanctioned { game_id: profile.id });
        }

        self.upstreams
            .links
            .create_link(&profile.id, chat_user_id)
            .await?;
        self.upstreams
            .allow_list
            .create_entry(&AllowListEntry {
                game_id: profile.id.clone(),
                server_id: server_id.to_string(),
            })
            .await?;
        self.platform
            .add_role(&self.guild.id, chat_user_id, &self.guild.access_role_id)
            .await?;
        if member.has_role(&self.guild.wait_notice_role_id) {
            self.platform
                .remove_role(&self.guild.id, chat_user_id, &self.guild.wait_notice_role_id)
                .await?;
        }

        Ok(VerificationOutcome::Success { game_id: profile.id })
    }
}
