//! Unified error handling for whitelistd.
//!
//! Handler invocations return [`HandlerResult`]; the router logs failures and
//! labels them for metrics. Verification never produces a `HandlerError`, its
//! failures are folded into the outcome instead.

use crate::db::DbError;
use crate::metrics;
use crate::platform::PlatformError;
use crate::upstream::UpstreamError;
use thiserror::Error;
use tracing::{error, warn};
use whitelist_proto::ProtoError;

// ============================================================================
// Handler Errors (interaction processing)
// ============================================================================

/// Errors that terminate one interaction handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Expected guild, role, channel, message or session is missing.
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("malformed interaction: {0}")]
    Proto(#[from] ProtoError),

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition",
            Self::Platform(_) => "platform",
            Self::Upstream(UpstreamError::Unavailable) => "upstream_unavailable",
            Self::Upstream(_) => "upstream",
            Self::Proto(_) => "proto",
            Self::Db(_) => "db",
        }
    }
}

/// Result type for interaction handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Log a failed handler invocation and count it.
pub fn report(operation: &str, user_id: &str, err: &HandlerError) {
    metrics::record_handler_error(err.error_code());
    match err {
        HandlerError::Upstream(UpstreamError::Unavailable) => {
            warn!(operation, user_id = %user_id, error = %err, "Handler hit unavailable upstream");
        }
        _ => {
            error!(
                operation,
                user_id = %user_id,
                code = err.error_code(),
                error = %err,
                "Handler failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            HandlerError::Precondition("guild".into()).error_code(),
            "precondition"
        );
        assert_eq!(
            HandlerError::from(UpstreamError::Unavailable).error_code(),
            "upstream_unavailable"
        );
        assert_eq!(
            HandlerError::from(UpstreamError::Other("x".into())).error_code(),
            "upstream"
        );
        assert_eq!(
            HandlerError::from(ProtoError::UnsupportedKind(9)).error_code(),
            "proto"
        );
        assert_eq!(
            HandlerError::from(PlatformError::NotFound("member".into())).error_code(),
            "platform"
        );
    }
}
