//! whitelistd - whitelist application gate for a game-server community.
//!
//! Receives chat-platform interactions over a signed webhook, walks members
//! through an application form and grants allow-list access once their game
//! identity checks out.

mod apply;
mod bus;
mod capacity;
mod config;
mod db;
mod error;
mod http;
mod metrics;
mod platform;
mod router;
mod upstream;

#[cfg(test)]
mod testing;

use crate::apply::ApplicationManager;
use crate::capacity::CapacityGate;
use crate::config::Config;
use crate::db::Database;
use crate::http::{SignatureKey, WebhookState};
use crate::platform::ChatPlatform;
use crate::platform::rest::RestPlatform;
use crate::router::InteractionRouter;
use crate::upstream::Upstreams;
use crate::upstream::api::ApiClient;
use crate::upstream::identity::ProfileApi;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "Refusing to start with {} configuration error(s)",
            errors.len()
        ));
    }

    info!(
        application_id = %config.bot.application_id,
        guild = %config.guild.id,
        server_id = %config.whitelist.server_id,
        cap = config.whitelist.cap,
        "Starting whitelistd"
    );

    let db = Database::new(&config.database.path).await?;

    // Collaborators
    let api = Arc::new(ApiClient::new(
        &config.upstream.api_base,
        config.upstream.api_token.clone(),
        config.upstream.timeout(),
    ));
    let upstreams = Upstreams {
        identity: Arc::new(ProfileApi::new(
            &config.upstream.identity_base,
            config.upstream.timeout(),
        )),
        links: api.clone(),
        allow_list: api.clone(),
        violations: api,
    };
    let platform: Arc<dyn ChatPlatform> =
        Arc::new(RestPlatform::new(&config.bot.api_base, &config.bot.token));

    let capacity = Arc::new(
        CapacityGate::load(
            db,
            Arc::clone(&upstreams.allow_list),
            Arc::clone(&platform),
            &config.whitelist,
            &config.guild.status_channel_id,
        )
        .await?,
    );
    let manager = ApplicationManager::new(
        upstreams,
        Arc::clone(&platform),
        Arc::clone(&capacity),
        config.guild.clone(),
        config.whitelist.clone(),
    );
    let router = Arc::new(InteractionRouter::new(manager, platform));

    metrics::init();

    if let Err(e) = capacity.refresh_public_status().await {
        warn!(error = %e, "Initial status refresh failed");
    }

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.listen.metrics_port;
    if metrics_port == 0 {
        info!("Metrics endpoint disabled");
    } else {
        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let state = WebhookState {
        key: SignatureKey::from_hex(&config.bot.public_key)?,
        router,
    };
    http::run_webhook_server(config.listen.address, state).await?;

    Ok(())
}
