//! HTTP client for the community API (account links, allow-lists, violations).
//!
//! # Endpoints
//!
//! ```text
//! GET  /users/link/{chat_user_id}        -> AccountLink | 404
//! POST /users/link                       <- AccountLink
//! GET  /whitelist                        -> [AllowListEntry]
//! GET  /whitelist/servers/{server_id}    -> [AllowListEntry] | 404
//! POST /whitelist                        <- AllowListEntry
//! GET  /violations/{identity_id}         -> Violation | 404
//! ```

use super::{
    AccountLink, AllowList, AllowListEntry, LinkStore, UpstreamError, Violation, ViolationRegistry,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Community API client.
#[derive(Clone)]
pub struct ApiClient {
    base: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `base` (no trailing slash needed).
    pub fn new(base: &str, token: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whitelistd/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base: base.trim_end_matches('/').to_string(),
            token,
            http,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        debug!(path = %path, "API GET");
        let response = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|e| UpstreamError::from_transport(&e))?;

        if let Some(err) = classify_status(response.status()) {
            return Err(err);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::from_transport(&e))
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), UpstreamError> {
        debug!(path = %path, "API POST");
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| UpstreamError::from_transport(&e))?;

        match write_status(response.status()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Map a read response status to an error, or `None` for success. An empty
/// read means the record does not exist.
fn classify_status(status: StatusCode) -> Option<UpstreamError> {
    if status == StatusCode::NO_CONTENT {
        return Some(UpstreamError::NotFound);
    }
    write_status(status)
}

/// Map a write response status to an error. Any 2xx, bodiless or not, is
/// success.
fn write_status(status: StatusCode) -> Option<UpstreamError> {
    if status.is_success() {
        return None;
    }
    match status {
        StatusCode::NOT_FOUND => Some(UpstreamError::NotFound),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Some(UpstreamError::Unavailable)
        }
        other => Some(UpstreamError::Other(format!("unexpected status {other}"))),
    }
}

#[async_trait]
impl LinkStore for ApiClient {
    async fn get_link(&self, chat_user_id: &str) -> Result<AccountLink, UpstreamError> {
        self.get_json(&format!("/users/link/{chat_user_id}")).await
    }

    async fn create_link(&self, game_id: &str, chat_user_id: &str) -> Result<(), UpstreamError> {
        let link = AccountLink {
            game_id: game_id.to_string(),
            chat_user_id: chat_user_id.to_string(),
        };
        self.post_json("/users/link", &link).await
    }
}

#[async_trait]
impl AllowList for ApiClient {
    async fn get_entries(&self, server_id: &str) -> Result<Vec<AllowListEntry>, UpstreamError> {
        self.get_json(&format!("/whitelist/servers/{server_id}")).await
    }

    async fn get_all_entries(&self) -> Result<Vec<AllowListEntry>, UpstreamError> {
        self.get_json("/whitelist").await
    }

    async fn create_entry(&self, entry: &AllowListEntry) -> Result<(), UpstreamError> {
        self.post_json("/whitelist", entry).await
    }
}

#[async_trait]
impl ViolationRegistry for ApiClient {
    async fn get_violation(&self, identity_id: &str) -> Result<Violation, UpstreamError> {
        self.get_json(&format!("/violations/{identity_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamResultExt;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Some("secret".to_string()), Duration::from_secs(2))
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(classify_status(StatusCode::CREATED), None);
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            Some(UpstreamError::NotFound)
        );
        assert_eq!(
            classify_status(StatusCode::NO_CONTENT),
            Some(UpstreamError::NotFound)
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Some(UpstreamError::Unavailable)
        );
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(UpstreamError::Other(_))
        ));
    }

    #[tokio::test]
    async fn reads_link_and_entries() {
        let app = Router::new()
            .route(
                "/users/link/:id",
                get(|Path(id): Path<String>| async move {
                    if id == "42" {
                        Ok(Json(serde_json::json!({
                            "minecraft_uuid": "uuid-1", "discord_user_id": "42"
                        })))
                    } else {
                        Err(AxumStatus::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/whitelist/servers/:server",
                get(|Path(server): Path<String>| async move {
                    Json(serde_json::json!([{ "minecraft_uuid": "uuid-1", "server_id": server }]))
                }),
            );
        let api = client(&serve(app).await);

        let link = api.get_link("42").await.unwrap();
        assert_eq!(link.game_id, "uuid-1");
        assert_eq!(api.get_link("7").await.found().unwrap(), None);
        assert!(api.contains("main", "uuid-1").await.unwrap());
        assert!(!api.contains("main", "uuid-2").await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(&format!("http://{addr}"));
        assert_eq!(api.get_all_entries().await, Err(UpstreamError::Unavailable));
        assert_eq!(api.get_link("42").await, Err(UpstreamError::Unavailable));
    }

    #[tokio::test]
    async fn bodiless_create_is_success() {
        let app = Router::new()
            .route("/users/link", post(|| async { AxumStatus::NO_CONTENT }))
            .route(
                "/whitelist",
                post(|| async { AxumStatus::NO_CONTENT }).get(|| async { AxumStatus::NO_CONTENT }),
            );
        let api = client(&serve(app).await);

        assert_eq!(api.create_link("uuid-1", "42").await, Ok(()));
        let entry = AllowListEntry {
            game_id: "uuid-1".to_string(),
            server_id: "main".to_string(),
        };
        assert_eq!(api.create_entry(&entry).await, Ok(()));
        // Reads keep treating an empty reply as a missing record.
        assert_eq!(api.get_all_entries().await, Err(UpstreamError::NotFound));
    }

    #[test]
    fn write_status_accepts_any_success() {
        assert_eq!(write_status(StatusCode::NO_CONTENT), None);
        assert_eq!(write_status(StatusCode::CREATED), None);
        assert_eq!(
            write_status(StatusCode::BAD_GATEWAY),
            Some(UpstreamError::Unavailable)
        );
    }
}
