//! Component custom ids.
//!
//! Every button, select menu and modal the gate renders carries one of these
//! ids. Inbound interactions are routed by parsing the id back.

use crate::error::ProtoError;
use std::fmt;
use std::str::FromStr;

/// Custom id of the single text field in the name-entry modal.
pub const NAME_INPUT_ID: &str = "MINECRAFT_NAME";

/// Identifies a component rendered by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    /// "Apply" button on the public status message.
    Apply,
    /// "Check my status" button on the public status message.
    SearchWhitelist,
    /// Toggle for the waiting-for-capacity notice role.
    WaitNotice,
    /// Target server selector on the application form.
    SelectServer,
    /// "Edit name" button on the application form.
    EditName,
    /// "Cancel" button on the application form.
    Cancel,
    /// "Confirm" button on the application form.
    Confirm,
    /// The name-entry modal.
    NameModal,
}

impl ComponentId {
    /// All ids, in declaration order.
    pub const ALL: [ComponentId; 8] = [
        ComponentId::Apply,
        ComponentId::SearchWhitelist,
        ComponentId::WaitNotice,
        ComponentId::SelectServer,
        ComponentId::EditName,
        ComponentId::Cancel,
        ComponentId::Confirm,
        ComponentId::NameModal,
    ];

    /// The wire representation of this id.
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentId::Apply => "WHITELIST_APPLY",
            ComponentId::SearchWhitelist => "SEARCH_WHITELIST",
            ComponentId::WaitNotice => "WAIT_WHITELIST_NOTICE",
            ComponentId::SelectServer => "WHITELIST_APPLY_SELECT_SERVER",
            ComponentId::EditName => "WHITELIST_APPLY_EDIT_MINECRAFT_NAME",
            ComponentId::Cancel => "WHITELIST_APPLY_CANCEL",
            ComponentId::Confirm => "WHITELIST_APPLY_CONFIRM",
            ComponentId::NameModal => "WHITELIST_APPLY_MODAL_EDIT_MINECRAFT_NAME",
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentId {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ProtoError::UnknownComponent(s.to_string()))
    }
}
