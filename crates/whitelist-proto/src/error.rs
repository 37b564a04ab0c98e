//! Error types for the interaction wire model.

use thiserror::Error;

/// Errors raised while interpreting an interaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// The payload could not be decoded as an interaction.
    #[error("malformed interaction payload: {0}")]
    Malformed(String),

    /// The interaction type code is not one the gate understands.
    #[error("unsupported interaction type: {0}")]
    UnsupportedKind(u8),

    /// A custom id did not name any component the gate emits.
    #[error("unknown component id: {0}")]
    UnknownComponent(String),

    /// A field the handler needs was absent from the payload.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl From<serde_json::Error> for ProtoError {
    fn from(err: serde_json::Error) -> Self {
        ProtoError::Malformed(err.to_string())
    }
}
