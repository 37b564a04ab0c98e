//! The whitelist application workflow.
//!
//! - `session` - per-user state machine and the session registry
//! - `verify` - identity reconciliation and access grant
//! - `manager` - the interactive flow tying both to the chat platform
//! - `notices` - message bodies shown along the way

pub mod manager;
pub mod notices;
pub mod session;
pub mod verify;


pub use manager::ApplicationManager;
