//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Platform Defaults
// =============================================================================

pub fn default_platform_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}

// =============================================================================
// Whitelist Defaults
// =============================================================================

pub fn default_server_id() -> String {
    "mckismetlab-main-server".to_string()
}

pub fn default_server_label() -> String {
    "Main server".to_string()
}

/// Number of allow-list entries after which applications close.
pub fn default_cap() -> usize {
    60
}

// =============================================================================
// Upstream Defaults
// =============================================================================

pub fn default_identity_base() -> String {
    "https://api.mojang.com".to_string()
}

pub fn default_upstream_timeout() -> u64 {
    10
}

// =============================================================================
// Database Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "whitelistd.db".to_string()
}
