//! Message bodies for the application flow.

use super::verify::VerificationOutcome;
use whitelist_proto::{
    ActionRow, Button, ButtonStyle, Component, ComponentId, Embed, MessagePayload, Modal,
    NAME_INPUT_ID, SelectMenu, SelectOption, TextInput,
};

const INFO: u32 = 0x2894FF;
const SUCCESS: u32 = 0x7289DA;
const FAILURE: u32 = 0xFF0000;

/// Everything the form shows.
pub struct FormView<'a> {
    pub claimed_name: Option<&'a str>,
    pub requester_name: &'a str,
    pub server_id: &'a str,
    pub server_label: &'a str,
}

fn info(description: impl Into<String>) -> MessagePayload {
    MessagePayload::embed(Embed::new().color(INFO).description(description))
}

fn contact_line(contact: Option<&str>) -> String {
    match contact {
        Some(contact) => format!("If this keeps happening, contact {contact}."),
        None => "If this keeps happening, contact an administrator.".to_string(),
    }
}

pub fn applications_closed() -> MessagePayload {
    MessagePayload::text(
        "Applications are closed at the moment. Use the notify button to hear when they reopen.",
    )
}

pub fn already_applied() -> MessagePayload {
    MessagePayload::text("You are already on the whitelist for this server.")
}

pub fn service_offline() -> MessagePayload {
    MessagePayload::embed(
        Embed::new()
            .color(FAILURE)
            .title("Service offline")
            .description(
                "The whitelist service cannot be reached right now. Please try again later.",
            ),
    )
}

pub fn generic_error(contact: Option<&str>) -> MessagePayload {
    info(format!(
        "Something went wrong while handling your application. {}",
        contact_line(contact)
    ))
}

/// Replaces the surface of a session that a newer application superseded.
pub fn superseded() -> MessagePayload {
    MessagePayload::text("This application was replaced by a newer one and is no longer active.")
}

pub fn application_form(view: &FormView<'_>) -> MessagePayload {
    let embed = Embed::new()
        .color(INFO)
        .title("Whitelist application")
        .field(
            "Game name",
            view.claimed_name.unwrap_or("Not set, use \"Edit name\""),
            true,
        )
        .field("Requested by", view.requester_name, true)
        .field("Server", view.server_label, true);

    let selector = SelectMenu::new(
        ComponentId::SelectServer,
        "Choose a server",
        vec![SelectOption {
            label: view.server_label.to_string(),
            value: view.server_id.to_string(),
            description: None,
            default: true,
        }],
    );

    MessagePayload::embed(embed).with_components(vec![
        ActionRow::new(vec![Component::SelectMenu(selector)]),
        ActionRow::buttons([
            Button::new(ComponentId::EditName, "Edit name", ButtonStyle::Primary),
            Button::new(ComponentId::Cancel, "Cancel", ButtonStyle::Danger),
            Button::new(ComponentId::Confirm, "Confirm", ButtonStyle::Success),
        ]),
    ])
}

/// The form again, with a note that a name is required before confirming.
pub fn form_missing_name(view: &FormView<'_>) -> MessagePayload {
    application_form(view).with_content("Enter your game name before confirming.")
}

pub fn name_modal() -> Modal {
    Modal::single_input(
        ComponentId::NameModal,
        "Game name",
        TextInput::short(NAME_INPUT_ID, "Your game name", "e.g. Notch"),
    )
}

pub fn cancelled() -> MessagePayload {
    info("Application cancelled.")
}

pub fn in_progress() -> MessagePayload {
    info("Checking your application. The result will arrive by direct message.")
}

pub fn success_direct(username: &str, server_label: &str) -> MessagePayload {
    MessagePayload::embed(
        Embed::new()
            .color(SUCCESS)
            .title(format!("Welcome, {username}!"))
            .field("Result", format!("You are now whitelisted on {server_label}."), false),
    )
}

pub fn unknown_name_direct(contact: Option<&str>) -> MessagePayload {
    MessagePayload::embed(
        Embed::new()
            .color(FAILURE)
            .title("Application not approved")
            .field("Reason", "That game name does not exist.", false)
            .field("Next steps", contact_line(contact), false),
    )
}

/// Audit entry posted for every confirmed application.
pub fn moderation_log(
    outcome: &VerificationOutcome,
    claimed_name: &str,
    requester_tag: &str,
    requester_id: &str,
) -> MessagePayload {
    let (color, reason) = match outcome {
        VerificationOutcome::Success { .. } => (0x0779E8, "-"),
        VerificationOutcome::GameIdentityUnknown => (0xFF4F42, "game name does not exist"),
        VerificationOutcome::ChatIdentityUnknown { .. } => (0xFF4F42, "requester not in guild"),
        VerificationOutcome::BothUnknown => (0xFF4F42, "game name and requester unknown"),
        VerificationOutcome::Sanctioned { .. } => (0xFEB63F, "identity under sanction"),
        VerificationOutcome::UpstreamUnavailable => (0xFEB63F, "service unavailable"),
        VerificationOutcome::InternalError => (0xFEB63F, "internal error"),
    };

    MessagePayload::embed(
        Embed::new()
            .color(color)
            .title(format!("Application result: {}", outcome.label()))
            .field("Game name", claimed_name, false)
            .field("Game id", outcome.game_id().unwrap_or("-"), false)
            .field("Requester", requester_tag, false)
            .field("Requester id", requester_id, false)
            .field("Reason", reason, false)
            .timestamp(chrono::Utc::now().to_rfc3339()),
    )
}

pub fn not_linked(contact: Option<&str>) -> MessagePayload {
    info(format!(
        "Your account is not linked to a game identity yet, so there is nothing to look up. {}",
        contact_line(contact)
    ))
    .ephemeral()
}

pub fn lookup_result(game_name: Option<&str>, server_label: &str, listed: bool) -> MessagePayload {
    let status = if listed { "whitelisted" } else { "not whitelisted" };
    MessagePayload::embed(
        Embed::new()
            .color(INFO)
            .title("Whitelist status")
            .field("Game name", game_name.unwrap_or("unknown"), true)
            .field(server_label, status, true),
    )
}

pub fn wait_notice_toggled(added: bool) -> MessagePayload {
    let text = if added {
        "You will be notified when applications reopen."
    } else {
        "You will no longer be notified when applications reopen."
    };
    MessagePayload::text(text).ephemeral()
}

pub fn admin_only() -> MessagePayload {
    MessagePayload::text("Only administrators can open or close applications.").ephemeral()
}

pub fn applications_set(open: bool) -> MessagePayload {
    MessagePayload::text(if open {
        "Applications are now open."
    } else {
        "Applications are now closed."
    })
}
