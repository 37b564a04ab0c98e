//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and TOML loading
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup checks that collect every problem at once

mod defaults;
mod types;
pub mod validation;

pub use types::{
    BotConfig, Config, ConfigError, DatabaseConfig, GuildConfig, ListenConfig, UpstreamConfig,
    WhitelistConfig,
};
