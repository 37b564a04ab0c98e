//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.token is required")]
    MissingToken,
    #[error("bot.application_id is required")]
    MissingApplicationId,
    #[error("bot.public_key must be 64 hex characters")]
    InvalidPublicKey,
    #[error("{0} is required")]
    MissingId(&'static str),
    #[error("whitelist.cap must be greater than zero")]
    ZeroCap,
    #[error("{field} must be an http(s) URL, got '{value}'")]
    InvalidUrl { field: &'static str, value: String },
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Bot identity
    if config.bot.token.is_empty() {
        errors.push(ValidationError::MissingToken);
    }
    if config.bot.application_id.is_empty() {
        errors.push(ValidationError::MissingApplicationId);
    }
    let key = &config.bot.public_key;
    if key.len() != 64 || hex::decode(key).is_err() {
        errors.push(ValidationError::InvalidPublicKey);
    }

    // Guild ids
    let guild = &config.guild;
    for (field, value) in [
        ("guild.id", &guild.id),
        ("guild.access_role_id", &guild.access_role_id),
        ("guild.wait_notice_role_id", &guild.wait_notice_role_id),
        ("guild.admin_role_id", &guild.admin_role_id),
        ("guild.status_channel_id", &guild.status_channel_id),
        ("guild.moderation_log_channel_id", &guild.moderation_log_channel_id),
        ("whitelist.server_id", &config.whitelist.server_id),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::MissingId(field));
        }
    }

    if config.whitelist.cap == 0 {
        errors.push(ValidationError::ZeroCap);
    }

    // Endpoints
    for (field, value) in [
        ("bot.api_base", &config.bot.api_base),
        ("upstream.api_base", &config.upstream.api_base),
        ("upstream.identity_base", &config.upstream.identity_base),
    ] {
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            errors.push(ValidationError::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }

    // Database path validation
    let db_path = Path::new(&config.database.path);
    if config.database.path != ":memory:"
        && let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(
            config.database.path.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
