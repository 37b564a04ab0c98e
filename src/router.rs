//! Interaction dispatch.
//!
//! Maps each inbound interaction to an application-manager operation or to
//! an Event Bus topic. Session-scoped clicks (edit, cancel, confirm, modal
//! submit) go through the bus so only the clicking user's session reacts.

use crate::apply::ApplicationManager;
use crate::bus::Topic;
use crate::error::{self, HandlerResult};
use crate::metrics;
use crate::platform::ChatPlatform;
use std::sync::Arc;
use tracing::{Instrument, Level, debug, span};
use whitelist_proto::{ComponentId, Interaction, InteractionKind, InteractionResponse, ProtoError};

/// Slash command carrying the administrative open/close toggle.
pub const ADMIN_COMMAND: &str = "whitelist";

pub struct InteractionRouter {
    manager: Arc<ApplicationManager>,
    platform: Arc<dyn ChatPlatform>,
}

impl InteractionRouter {
    pub fn new(manager: Arc<ApplicationManager>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { manager, platform }
    }

    /// Dispatch and report any failure. Used from the webhook's spawned task.
    pub async fn handle(&self, interaction: Interaction) {
        let user_id = interaction
            .actor()
            .map_or_else(|| "-".to_string(), |u| u.id.clone());
        let operation = interaction
            .data
            .as_ref()
            .and_then(|d| d.custom_id.clone().or_else(|| d.name.clone()))
            .unwrap_or_else(|| "interaction".to_string());

        if let Err(e) = self.dispatch(interaction).await {
            error::report(&operation, &user_id, &e);
        }
    }

    pub async fn dispatch(&self, interaction: Interaction) -> HandlerResult {
        let kind = match interaction.kind() {
            Ok(kind) => kind,
            Err(ProtoError::UnknownComponent(custom_id)) => {
                debug!(custom_id = %custom_id, "Ignoring unknown component");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        metrics::record_interaction(kind_label(&kind));

        let interaction_span = span!(
            Level::DEBUG,
            "interaction",
            id = %interaction.id,
            kind = kind_label(&kind),
            user_id = interaction.actor().map(|u| u.id.as_str()),
        );

        self.route(kind, interaction)
            .instrument(interaction_span)
            .await
    }

    async fn route(&self, kind: InteractionKind, interaction: Interaction) -> HandlerResult {
        match kind {
            // The webhook answers pings inline; nothing to do here.
            InteractionKind::Ping => Ok(()),
            InteractionKind::Command(name) if name == ADMIN_COMMAND => {
                self.manager.set_applications_open(&interaction).await
            }
            InteractionKind::Command(name) => {
                debug!(command = %name, "Ignoring unknown command");
                Ok(())
            }
            InteractionKind::Component(id) | InteractionKind::ModalSubmit(id) => {
                self.route_component(id, interaction).await
            }
        }
    }

    async fn route_component(&self, id: ComponentId, interaction: Interaction) -> HandlerResult {
        match id {
            ComponentId::Apply => self.manager.start_application(&interaction).await,
            ComponentId::SearchWhitelist => self.manager.lookup_status(&interaction).await,
            ComponentId::WaitNotice => self.manager.toggle_wait_notice(&interaction).await,
            ComponentId::SelectServer => {
                // Single target server: the selection changes nothing.
                self.platform
                    .respond(&interaction.handle(), InteractionResponse::defer_update())
                    .await?;
                Ok(())
            }
            ComponentId::EditName => {
                self.manager
                    .publish(Topic::EditNameRequested, interaction)
                    .await
            }
            ComponentId::NameModal => {
                self.manager
                    .publish(Topic::NameSubmitted, interaction)
                    .await
            }
            ComponentId::Cancel => self.manager.publish(Topic::Cancelled, interaction).await,
            ComponentId::Confirm => self.manager.publish(Topic::Confirmed, interaction).await,
        }
    }
}

fn kind_label(kind: &InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Ping => "ping",
        InteractionKind::Command(_) => "command",
        InteractionKind::Component(_) => "component",
        InteractionKind::ModalSubmit(_) => "modal",
    }
}
