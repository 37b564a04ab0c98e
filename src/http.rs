//! HTTP surfaces: the signed interaction webhook and the Prometheus
//! metrics endpoint.
//!
//! Both run on axum. The webhook acknowledges every non-ping interaction with
//! `202 Accepted` and handles it on its own task; replies go out through the
//! platform's callback endpoint.

use crate::router::InteractionRouter;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use ring::signature::{ED25519, UnparsedPublicKey};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use whitelist_proto::{Interaction, InteractionKind, InteractionResponse};

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

#[derive(Debug, Error)]
pub enum SignatureKeyError {
    #[error("public key is not hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("public key must be 32 bytes, got {0}")]
    Length(usize),
}

/// Ed25519 public key the platform signs webhooks with.
#[derive(Debug, Clone)]
pub struct SignatureKey([u8; 32]);

impl SignatureKey {
    pub fn from_hex(key: &str) -> Result<Self, SignatureKeyError> {
        let bytes = hex::decode(key.trim())?;
        let len = bytes.len();
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignatureKeyError::Length(len))?;
        Ok(Self(key))
    }

    /// Check `signature_hex` over `timestamp || body`.
    pub fn verify(&self, signature_hex: &str, timestamp: &str, body: &[u8]) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        UnparsedPublicKey::new(&ED25519, &self.0)
            .verify(&message, &signature)
            .is_ok()
    }
}

/// Shared webhook state.
#[derive(Clone)]
pub struct WebhookState {
    pub key: SignatureKey,
    pub router: Arc<InteractionRouter>,
}

/// Handler for POST /interactions.
async fn interactions_handler(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let (Some(signature), Some(timestamp)) =
        (header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER))
    else {
        debug!("Interaction without signature headers");
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !state.key.verify(signature, timestamp, &body) {
        warn!("Interaction signature rejected");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let interaction = match Interaction::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            warn!(error = %e, "Undecodable interaction");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if matches!(interaction.kind(), Ok(InteractionKind::Ping)) {
        crate::metrics::record_interaction("ping");
        return Json(InteractionResponse::pong()).into_response();
    }

    let router = Arc::clone(&state.router);
    tokio::spawn(async move {
        router.handle(interaction).await;
    });
    StatusCode::ACCEPTED.into_response()
}

/// Routes served on the webhook listener.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/interactions", post(interactions_handler))
        .with_state(state)
}

/// Serve the interaction webhook on `addr` until ctrl-c.
pub async fn run_webhook_server(addr: SocketAddr, state: WebhookState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Interaction webhook listening");

    axum::serve(listener, webhook_routes(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Interaction webhook stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Run the HTTP server for Prometheus metrics.
///
/// Binds to `0.0.0.0:port` and serves the `/metrics` endpoint.
/// This is a long-running task that should be spawned in the background.
pub async fn run_http_server(port: u16) {
    let app = Router::new().route("/metrics", get(metrics_handler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Prometheus HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("HTTP server error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};
    use std::time::Duration;

    struct Signer(Ed25519KeyPair);

    impl Signer {
        fn new() -> Self {
            let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
            Self(Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap())
        }

        fn key(&self) -> SignatureKey {
            SignatureKey::from_hex(&hex::encode(self.0.public_key().as_ref())).unwrap()
        }

        fn sign(&self, timestamp: &str, body: &[u8]) -> String {
            let mut message = timestamp.as_bytes().to_vec();
            message.extend_from_slice(body);
            hex::encode(self.0.sign(&message).as_ref())
        }
    }

    async fn serve(state: WebhookState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, webhook_routes(state)).await.unwrap();
        });
        format!("http://{addr}/interactions")
    }

    async fn post(url: &str, body: &'static [u8], signature: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(url)
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, "1700000000")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    #[test]
    fn key_must_be_32_hex_bytes() {
        assert!(SignatureKey::from_hex(&"ab".repeat(32)).is_ok());
        assert!(matches!(
            SignatureKey::from_hex("abcd"),
            Err(SignatureKeyError::Length(2))
        ));
        assert!(matches!(
            SignatureKey::from_hex("not hex"),
            Err(SignatureKeyError::Hex(_))
        ));
    }

    #[test]
    fn signature_covers_timestamp_and_body() {
        let signer = Signer::new();
        let key = signer.key();
        let signature = signer.sign("1", b"{}");
        assert!(key.verify(&signature, "1", b"{}"));
        assert!(!key.verify(&signature, "2", b"{}"));
        assert!(!key.verify(&signature, "1", b"{ }"));
        assert!(!key.verify("zz", "1", b"{}"));
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let signer = Signer::new();
        let h = Harness::new().await;
        let url = serve(WebhookState {
            key: signer.key(),
            router: h.router.clone(),
        })
        .await;

        let body: &[u8] = br#"{ "id": "1", "application_id": "9", "type": 1, "token": "t" }"#;
        let response = post(&url, body, &signer.sign("1700000000", body)).await;
        assert_eq!(response.status(), 200);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json, serde_json::json!({ "type": 1 }));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let signer = Signer::new();
        let other = Signer::new();
        let h = Harness::new().await;
        let url = serve(WebhookState {
            key: signer.key(),
            router: h.router.clone(),
        })
        .await;

        let body: &[u8] = br#"{ "id": "1", "application_id": "9", "type": 1, "token": "t" }"#;
        let response = post(&url, body, &other.sign("1700000000", body)).await;
        assert_eq!(response.status(), 401);

        let unsigned = reqwest::Client::new()
            .post(&url)
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(unsigned.status(), 401);
    }

    #[tokio::test]
    async fn component_is_accepted_and_handled_in_background() {
        let signer = Signer::new();
        let h = Harness::new().await;
        let url = serve(WebhookState {
            key: signer.key(),
            router: h.router.clone(),
        })
        .await;

        let body: &[u8] = br#"{
            "id": "7", "application_id": "9", "type": 3, "token": "t",
            "guild_id": "guild",
            "member": { "user": { "id": "42", "username": "alice" }, "roles": [] },
            "data": {
                "custom_id": "WHITELIST_APPLY_SELECT_SERVER",
                "values": ["mckismetlab-main-server"]
            }
        }"#;
        let response = post(&url, body, &signer.sign("1700000000", body)).await;
        assert_eq!(response.status(), 202);

        for _ in 0..50 {
            if !h.platform.responses_to("7").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            h.platform.responses_to("7"),
            vec![InteractionResponse::defer_update()]
        );
    }

    #[tokio::test]
    async fn signed_garbage_is_a_bad_request() {
        let signer = Signer::new();
        let h = Harness::new().await;
        let url = serve(WebhookState {
            key: signer.key(),
            router: h.router.clone(),
        })
        .await;

        let body: &[u8] = b"not json";
        let response = post(&url, body, &signer.sign("1700000000", body)).await;
        assert_eq!(response.status(), 400);
    }
}
