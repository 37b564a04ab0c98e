//! Outbound message bodies and interaction responses.
//!
//! Components carry their numeric platform type in a `type` field; the
//! constructors set it so callers never deal with the codes.

use crate::component::ComponentId;
use serde::Serialize;

const COMPONENT_ACTION_ROW: u8 = 1;
const COMPONENT_BUTTON: u8 = 2;
const COMPONENT_SELECT: u8 = 3;
const COMPONENT_TEXT_INPUT: u8 = 4;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
const RESPONSE_DEFERRED_UPDATE: u8 = 6;
const RESPONSE_UPDATE_MESSAGE: u8 = 7;
const RESPONSE_MODAL: u8 = 9;

/// Message flag: only the invoking user can see the message.
pub const FLAG_EPHEMERAL: u64 = 1 << 6;

/// One name/value row of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    /// Field heading.
    pub name: String,
    /// Field body.
    pub value: String,
    /// Render side by side with neighbouring inline fields.
    pub inline: bool,
}

/// Embed footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
}

/// Structured message content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    /// Heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// RGB colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// Fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    /// Footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// ISO-8601 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Embed {
    /// Empty embed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the colour.
    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Append a field.
    pub fn field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    /// Set the footer text.
    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Visual style of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    /// Blurple.
    Primary,
    /// Grey.
    Secondary,
    /// Green.
    Success,
    /// Red.
    Danger,
}

impl Serialize for ButtonStyle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let code: u8 = match self {
            ButtonStyle::Primary => 1,
            ButtonStyle::Secondary => 2,
            ButtonStyle::Success => 3,
            ButtonStyle::Danger => 4,
        };
        serializer.serialize_u8(code)
    }
}

/// Clickable button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    /// Style.
    pub style: ButtonStyle,
    /// Label.
    pub label: String,
    /// Routing id.
    pub custom_id: String,
    /// Greyed out and unclickable.
    pub disabled: bool,
}

impl Button {
    /// Enabled button routed to `id`.
    pub fn new(id: ComponentId, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            kind: COMPONENT_BUTTON,
            style,
            label: label.into(),
            custom_id: id.as_str().to_string(),
            disabled: false,
        }
    }

    /// Set the disabled flag.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// One entry of a select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    /// Label.
    pub label: String,
    /// Value reported back on selection.
    pub value: String,
    /// Secondary text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pre-selected.
    pub default: bool,
}

/// Drop-down menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectMenu {
    #[serde(rename = "type")]
    kind: u8,
    /// Routing id.
    pub custom_id: String,
    /// Text shown with nothing selected.
    pub placeholder: String,
    /// Options.
    pub options: Vec<SelectOption>,
}

impl SelectMenu {
    /// Menu routed to `id`.
    pub fn new(
        id: ComponentId,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self {
            kind: COMPONENT_SELECT,
            custom_id: id.as_str().to_string(),
            placeholder: placeholder.into(),
            options,
        }
    }
}

/// Single-line text field inside a modal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextInput {
    #[serde(rename = "type")]
    kind: u8,
    /// Field id reported back on submission.
    pub custom_id: String,
    /// Label.
    pub label: String,
    style: u8,
    /// Hint text.
    pub placeholder: String,
    /// Submission requires a value.
    pub required: bool,
}

impl TextInput {
    /// Required short text field.
    pub fn short(
        custom_id: impl Into<String>,
        label: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            kind: COMPONENT_TEXT_INPUT,
            custom_id: custom_id.into(),
            label: label.into(),
            style: 1,
            placeholder: placeholder.into(),
            required: true,
        }
    }
}

/// Any component that may sit inside an action row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Component {
    /// Button.
    Button(Button),
    /// Select menu.
    SelectMenu(SelectMenu),
    /// Text input (modals only).
    TextInput(TextInput),
}

/// Horizontal row of components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    /// Components in the row.
    pub components: Vec<Component>,
}

impl ActionRow {
    /// Row holding `components`.
    pub fn new(components: Vec<Component>) -> Self {
        Self {
            kind: COMPONENT_ACTION_ROW,
            components,
        }
    }

    /// Row of buttons.
    pub fn buttons(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self::new(buttons.into_iter().map(Component::Button).collect())
    }
}

/// Message body for sends, edits and interaction replies.
///
/// `content`, `embeds` and `components` are always serialised so an edit
/// replaces all three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    /// Plain text.
    pub content: Option<String>,
    /// Embeds.
    pub embeds: Vec<Embed>,
    /// Component rows.
    pub components: Vec<ActionRow>,
    /// Message flags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessagePayload {
    /// Text-only message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Single-embed message.
    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Self::default()
        }
    }

    /// Set the text content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Replace the component rows.
    pub fn with_components(mut self, components: Vec<ActionRow>) -> Self {
        self.components = components;
        self
    }

    /// Mark the message ephemeral.
    pub fn ephemeral(mut self) -> Self {
        self.flags = Some(FLAG_EPHEMERAL);
        self
    }

    /// Whether any embed, the content, or any component label contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        let in_content = self.content.as_deref().is_some_and(|c| c.contains(needle));
        let in_embeds = self.embeds.iter().any(|e| {
            e.title.as_deref().is_some_and(|t| t.contains(needle))
                || e.description.as_deref().is_some_and(|d| d.contains(needle))
                || e
                    .fields
                    .iter()
                    .any(|f| f.name.contains(needle) || f.value.contains(needle))
        });
        in_content || in_embeds
    }
}

/// Modal dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modal {
    /// Routing id.
    pub custom_id: String,
    /// Title bar.
    pub title: String,
    /// Rows of text inputs.
    pub components: Vec<ActionRow>,
}

impl Modal {
    /// Modal routed to `id` with a single text input.
    pub fn single_input(id: ComponentId, title: impl Into<String>, input: TextInput) -> Self {
        Self {
            custom_id: id.as_str().to_string(),
            title: title.into(),
            components: vec![ActionRow::new(vec![Component::TextInput(input)])],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
enum ResponseData {
    Message(MessagePayload),
    Modal(Modal),
    Flags { flags: u64 },
}

/// Body of an interaction callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ResponseData>,
}

impl InteractionResponse {
    /// Answer to a ping.
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    /// New reply message.
    pub fn reply(payload: MessagePayload) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(ResponseData::Message(payload)),
        }
    }

    /// "Thinking…" placeholder visible only to the invoking user; the reply is
    /// filled in later by editing the original response.
    pub fn defer_ephemeral() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_CHANNEL_MESSAGE,
            data: Some(ResponseData::Flags {
                flags: FLAG_EPHEMERAL,
            }),
        }
    }

    /// Acknowledge a component interaction without changing anything.
    pub fn defer_update() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_UPDATE,
            data: None,
        }
    }

    /// Replace the message the component is attached to.
    pub fn update(payload: MessagePayload) -> Self {
        Self {
            kind: RESPONSE_UPDATE_MESSAGE,
            data: Some(ResponseData::Message(payload)),
        }
    }

    /// Open a modal.
    pub fn modal(modal: Modal) -> Self {
        Self {
            kind: RESPONSE_MODAL,
            data: Some(ResponseData::Modal(modal)),
        }
    }

    /// Whether this response opens a modal.
    pub fn is_modal(&self) -> bool {
        self.kind == RESPONSE_MODAL
    }

    /// Message payload carried by reply/update responses.
    pub fn payload(&self) -> Option<&MessagePayload> {
        match &self.data {
            Some(ResponseData::Message(payload)) => Some(payload),
            _ => None,
        }
    }
}
