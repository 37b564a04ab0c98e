//! REST implementation of [`ChatPlatform`].

use super::{ChatPlatform, Member, PlatformError};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use whitelist_proto::{InteractionHandle, InteractionResponse, MessagePayload};

/// Timeout for platform REST calls.
const PLATFORM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct MemberUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct MemberBody {
    user: MemberUser,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IdBody {
    id: String,
}

/// Bot-authenticated REST client.
pub struct RestPlatform {
    base: String,
    token: String,
    http: reqwest::Client,
}

impl RestPlatform {
    /// Create a client for `base` authenticating as bot `token`.
    pub fn new(base: &str, token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PLATFORM_TIMEOUT)
            .user_agent(concat!("DiscordBot (whitelistd, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Send `request`, mapping 404 to `NotFound(what)` and other failures to `Status`.
    async fn call(&self, request: RequestBuilder, what: &str) -> Result<Response, PlatformError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound(what.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, PlatformError> {
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ChatPlatform for RestPlatform {
    async fn respond(
        &self,
        handle: &InteractionHandle,
        response: InteractionResponse,
    ) -> Result<(), PlatformError> {
        let path = format!("/interactions/{}/{}/callback", handle.id, handle.token);
        self.call(self.request(Method::POST, &path).json(&response), "interaction")
            .await?;
        Ok(())
    }

    async fn edit_original(
        &self,
        handle: &InteractionHandle,
        payload: MessagePayload,
    ) -> Result<(), PlatformError> {
        let path = format!(
            "/webhooks/{}/{}/messages/@original",
            handle.application_id, handle.token
        );
        self.call(self.request(Method::PATCH, &path).json(&payload), "original response")
            .await?;
        Ok(())
    }

    async fn fetch_member(
        &self,
        guild_id: &str,
        user_id: &str,
    ) -> Result<Option<Member>, PlatformError> {
        let path = format!("/guilds/{guild_id}/members/{user_id}");
        let response = match self.call(self.request(Method::GET, &path), "member").await {
            Ok(response) => response,
            Err(PlatformError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body: MemberBody = Self::decode(response).await?;
        Ok(Some(Member {
            user_id: body.user.id,
            username: body.user.username,
            roles: body.roles,
        }))
    }

    async fn add_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        debug!(user_id = %user_id, role_id = %role_id, "Adding role");
        let path = format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}");
        self.call(self.request(Method::PUT, &path), &format!("role {role_id}"))
            .await?;
        Ok(())
    }

    async fn remove_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        debug!(user_id = %user_id, role_id = %role_id, "Removing role");
        let path = format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}");
        self.call(self.request(Method::DELETE, &path), &format!("role {role_id}"))
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        payload: MessagePayload,
    ) -> Result<String, PlatformError> {
        let path = format!("/channels/{channel_id}/messages");
        let response = self
            .call(
                self.request(Method::POST, &path).json(&payload),
                &format!("channel {channel_id}"),
            )
            .await?;
        let body: IdBody = Self::decode(response).await?;
        Ok(body.id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: MessagePayload,
    ) -> Result<(), PlatformError> {
        let path = format!("/channels/{channel_id}/messages/{message_id}");
        self.call(
            self.request(Method::PATCH, &path).json(&payload),
            &format!("message {message_id}"),
        )
        .await?;
        Ok(())
    }

    async fn send_direct(
        &self,
        user_id: &str,
        payload: MessagePayload,
    ) -> Result<(), PlatformError> {
        let response = self
            .call(
                self.request(Method::POST, "/users/@me/channels")
                    .json(&serde_json::json!({ "recipient_id": user_id })),
                &format!("user {user_id}"),
            )
            .await?;
        let dm: IdBody = Self::decode(response).await?;
        self.send_message(&dm.id, payload).await?;
        Ok(())
    }
}
