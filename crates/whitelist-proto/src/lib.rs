//! # whitelist-proto
//!
//! Wire model for the chat platform's interaction webhooks, as used by the
//! whitelistd membership gate.
//!
//! - [`interaction`]: inbound interaction payloads (component clicks, modal
//!   submissions, slash commands, pings)
//! - [`component`]: the closed set of component custom ids the gate emits and
//!   routes on
//! - [`message`]: outbound message bodies, embeds, components and
//!   interaction callback responses
//!
//! The crate performs no I/O.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod component;
pub mod error;
pub mod interaction;
pub mod message;

pub use component::{ComponentId, NAME_INPUT_ID};
pub use error::ProtoError;
pub use interaction::{GuildMember, Interaction, InteractionHandle, InteractionKind, User};
pub use message::{
    ActionRow, Button, ButtonStyle, Component, Embed, EmbedField, InteractionResponse,
    MessagePayload, Modal, SelectMenu, SelectOption, TextInput,
};
