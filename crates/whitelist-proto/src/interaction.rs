//! Inbound interaction payloads.
//!
//! The platform delivers one JSON object per user action. Only the fields the
//! gate routes on are modelled; everything else is ignored by serde.

use crate::component::ComponentId;
use crate::error::ProtoError;
use serde::{Deserialize, Serialize};

const KIND_PING: u8 = 1;
const KIND_COMMAND: u8 = 2;
const KIND_COMPONENT: u8 = 3;
const KIND_MODAL_SUBMIT: u8 = 5;

/// A chat-platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user id.
    pub id: String,
    /// Account name.
    pub username: String,
    /// Legacy four-digit discriminator; `"0"` for migrated accounts.
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl User {
    /// Construct a user with a migrated (discriminator-less) name.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            discriminator: None,
        }
    }

    /// Human-readable tag, `name#1234` for legacy accounts.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" && !d.is_empty() => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

/// The guild-scoped view of the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    /// The user behind the membership.
    pub user: User,
    /// Role ids held by the member.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A submitted text field inside a modal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedInput {
    /// Custom id of the text input.
    pub custom_id: String,
    /// Entered text.
    #[serde(default)]
    pub value: Option<String>,
}

/// A row of submitted modal inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedRow {
    /// Inputs in the row.
    #[serde(default)]
    pub components: Vec<SubmittedInput>,
}

/// A slash-command option (possibly nested under a subcommand).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    /// Option name.
    pub name: String,
    /// Option value for leaf options.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Nested options for subcommands.
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// Interaction data; which fields are present depends on the interaction type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionData {
    /// Component or modal custom id.
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Selected values for select menus.
    #[serde(default)]
    pub values: Vec<String>,
    /// Submitted modal rows.
    #[serde(default)]
    pub components: Vec<SubmittedRow>,
    /// Slash-command name.
    #[serde(default)]
    pub name: Option<String>,
    /// Slash-command options.
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// Everything needed to answer or later edit the reply to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InteractionHandle {
    /// Interaction id.
    pub id: String,
    /// Application the interaction was addressed to.
    pub application_id: String,
    /// Continuation token (valid for a limited time).
    pub token: String,
}

/// The routed shape of an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionKind {
    /// Endpoint liveness probe.
    Ping,
    /// Slash command by name.
    Command(String),
    /// Click or selection on a gate component.
    Component(ComponentId),
    /// Submission of a gate modal.
    ModalSubmit(ComponentId),
}

/// An inbound interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction id.
    pub id: String,
    /// Target application id.
    pub application_id: String,
    /// Raw interaction type code.
    #[serde(rename = "type")]
    pub kind_code: u8,
    /// Continuation token.
    pub token: String,
    /// Guild the interaction happened in, if any.
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Acting member for guild interactions.
    #[serde(default)]
    pub member: Option<GuildMember>,
    /// Acting user for direct-message interactions.
    #[serde(default)]
    pub user: Option<User>,
    /// Type-specific data.
    #[serde(default)]
    pub data: Option<InteractionData>,
}

impl Interaction {
    /// Decode an interaction from a webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtoError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Build a component interaction, as the platform would deliver it.
    pub fn component(id: impl Into<String>, component: ComponentId, member: GuildMember) -> Self {
        let id = id.into();
        Self {
            token: format!("token-{id}"),
            id,
            application_id: "app".to_string(),
            kind_code: KIND_COMPONENT,
            guild_id: Some("guild".to_string()),
            member: Some(member),
            user: None,
            data: Some(InteractionData {
                custom_id: Some(component.as_str().to_string()),
                ..InteractionData::default()
            }),
        }
    }

    /// Build a name-modal submission carrying `value`.
    pub fn name_submission(id: impl Into<String>, member: GuildMember, value: &str) -> Self {
        let mut interaction = Self::component(id, ComponentId::NameModal, member);
        interaction.kind_code = KIND_MODAL_SUBMIT;
        if let Some(data) = interaction.data.as_mut() {
            data.components = vec![SubmittedRow {
                components: vec![SubmittedInput {
                    custom_id: crate::NAME_INPUT_ID.to_string(),
                    value: Some(value.to_string()),
                }],
            }];
        }
        interaction
    }

    /// Classify the interaction for routing.
    pub fn kind(&self) -> Result<InteractionKind, ProtoError> {
        match self.kind_code {
            KIND_PING => Ok(InteractionKind::Ping),
            KIND_COMMAND => self
                .data
                .as_ref()
                .and_then(|d| d.name.clone())
                .map(InteractionKind::Command)
                .ok_or(ProtoError::MissingField("data.name")),
            KIND_COMPONENT => Ok(InteractionKind::Component(self.custom_id()?.parse()?)),
            KIND_MODAL_SUBMIT => Ok(InteractionKind::ModalSubmit(self.custom_id()?.parse()?)),
            other => Err(ProtoError::UnsupportedKind(other)),
        }
    }

    /// The acting user, whether the interaction came from a guild or a DM.
    pub fn actor(&self) -> Option<&User> {
        self.member.as_ref().map(|m| &m.user).or(self.user.as_ref())
    }

    /// Id of the acting user.
    pub fn actor_id(&self) -> Result<&str, ProtoError> {
        self.actor()
            .map(|u| u.id.as_str())
            .ok_or(ProtoError::MissingField("member.user"))
    }

    /// Handle for answering this interaction.
    pub fn handle(&self) -> InteractionHandle {
        InteractionHandle {
            id: self.id.clone(),
            application_id: self.application_id.clone(),
            token: self.token.clone(),
        }
    }

    /// Component or modal custom id.
    pub fn custom_id(&self) -> Result<&str, ProtoError> {
        self.data
            .as_ref()
            .and_then(|d| d.custom_id.as_deref())
            .ok_or(ProtoError::MissingField("data.custom_id"))
    }

    /// Value of a submitted modal text input.
    pub fn text_input(&self, custom_id: &str) -> Option<&str> {
        self.data
            .as_ref()?
            .components
            .iter()
            .flat_map(|row| row.components.iter())
            .find(|input| input.custom_id == custom_id)
            .and_then(|input| input.value.as_deref())
    }

    /// Boolean slash-command option, searched through subcommands as well.
    pub fn bool_option(&self, name: &str) -> Option<bool> {
        fn find(options: &[CommandOption], name: &str) -> Option<bool> {
            options.iter().find_map(|opt| {
                if opt.name == name {
                    opt.value.as_ref().and_then(serde_json::Value::as_bool)
                } else {
                    find(&opt.options, name)
                }
            })
        }
        find(&self.data.as_ref()?.options, name)
    }

    /// Whether the acting member holds `role_id`.
    pub fn actor_has_role(&self, role_id: &str) -> bool {
        self.member
            .as_ref()
            .is_some_and(|m| m.roles.iter().any(|r| r == role_id))
    }
}
