//! Application session manager: drives the interactive flow from the apply
//! click to the verification outcome, plus the neighbouring status lookup,
//! notice-role toggle and administrative gate toggle.

use super::notices::{self, FormView};
use super::session::{ApplicationSession, InvalidTransition, SessionRegistry, Transition};
use super::verify::{VerificationOutcome, Verifier};
use crate::bus::{Delivery, EventBus, SubscriptionHandle, Topic};
use crate::capacity::CapacityGate;
use crate::config::{GuildConfig, WhitelistConfig};
use crate::error::{HandlerError, HandlerResult};
use crate::metrics;
use crate::platform::ChatPlatform;
use crate::upstream::{UpstreamError, UpstreamResultExt, Upstreams};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use whitelist_proto::{
    GuildMember, Interaction, InteractionHandle, InteractionResponse, MessagePayload, NAME_INPUT_ID,
    ProtoError,
};

const SESSION_TOPICS: [Topic; 4] = [
    Topic::EditNameRequested,
    Topic::NameSubmitted,
    Topic::Cancelled,
    Topic::Confirmed,
];

/// Subscriptions dropped once the user confirms; cancel stays until the end.
const CONFIRM_TEARDOWN: [Topic; 3] = [
    Topic::EditNameRequested,
    Topic::NameSubmitted,
    Topic::Confirmed,
];

/// Result of the pre-apply check.
enum Eligibility {
    AlreadyApplied,
    /// Eligible; carries the current name of the linked identity, if known.
    Eligible(Option<String>),
}

/// Result of a status lookup.
enum Lookup {
    NotLinked,
    Linked { game_name: Option<String>, listed: bool },
}

pub struct ApplicationManager {
    me: Weak<ApplicationManager>,
    registry: SessionRegistry,
    bus: EventBus<Interaction>,
    verifier: Verifier,
    upstreams: Upstreams,
    platform: Arc<dyn ChatPlatform>,
    capacity: Arc<CapacityGate>,
    guild: GuildConfig,
    whitelist: WhitelistConfig,
}

impl ApplicationManager {
    pub fn new(
        upstreams: Upstreams,
        platform: Arc<dyn ChatPlatform>,
        capacity: Arc<CapacityGate>,
        guild: GuildConfig,
        whitelist: WhitelistConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry: SessionRegistry::new(),
            bus: EventBus::new(),
            verifier: Verifier::new(upstreams.clone(), Arc::clone(&platform), guild.clone()),
            upstreams,
            platform,
            capacity,
            guild,
            whitelist,
        })
    }

    #[cfg(test)]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn bus(&self) -> &EventBus<Interaction> {
        &self.bus
    }

    /// Hand a session-scoped UI event to whichever session is waiting for it.
    pub async fn publish(&self, topic: Topic, interaction: Interaction) -> HandlerResult {
        let actor_id = interaction.actor_id()?.to_string();
        let delivered = self.bus.publish(topic, &actor_id, interaction).await;
        if delivered == 0 {
            debug!(topic = %topic, user_id = %actor_id, "No session waiting for event");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Starting an application
    // ------------------------------------------------------------------------

    /// Open the application form for the acting member.
    pub async fn start_application(&self, interaction: &Interaction) -> HandlerResult {
        let member = acting_member(interaction)?;
        let user_id = member.user.id.as_str();
        let handle = interaction.handle();

        self.platform
            .respond(&handle, InteractionResponse::defer_ephemeral())
            .await?;

        if !self.capacity.is_open() {
            return self.edit(&handle, notices::applications_closed()).await;
        }

        let claimed_name = match self.check_eligibility(user_id).await {
            Ok(Eligibility::Eligible(name)) => name,
            Ok(Eligibility::AlreadyApplied) => {
                return self.edit(&handle, notices::already_applied()).await;
            }
            Err(UpstreamError::Unavailable) => {
                warn!(user_id = %user_id, "Upstream unavailable during pre-apply check");
                return self.edit(&handle, notices::service_offline()).await;
            }
            Err(e) => {
                self.edit(&handle, notices::generic_error(self.contact())).await?;
                return Err(e.into());
            }
        };

        let session_id = self.registry.next_session_id();
        let mut session = ApplicationSession::new(
            session_id,
            user_id,
            member.user.username.clone(),
            self.whitelist.server_id.clone(),
            claimed_name,
            handle.clone(),
        );
        session.subscriptions = self.subscribe_session(user_id, session_id);
        let form = self.form(&session);

        if let Some(previous) = self.registry.insert(session) {
            self.supersede(previous).await;
        }
        self.edit(&handle, form).await?;

        metrics::record_application_started();
        info!(user_id = %user_id, session_id, "Application started");
        Ok(())
    }

    /// Already-applied and offline checks. Name lookup for the linked
    /// identity is best effort.
    async fn check_eligibility(&self, user_id: &str) -> Result<Eligibility, UpstreamError> {
        let Some(link) = self.upstreams.links.get_link(user_id).await.found()? else {
            return Ok(Eligibility::Eligible(None));
        };

        if self
            .upstreams
            .allow_list
            .contains(&self.whitelist.server_id, &link.game_id)
            .await?
        {
            return Ok(Eligibility::AlreadyApplied);
        }

        let name = match self.upstreams.identity.resolve_name_history(&link.game_id).await {
            Ok(mut names) => names.pop(),
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    game_id = %link.game_id,
                    error = %e,
                    "Name lookup failed"
                );
                None
            }
        };
        Ok(Eligibility::Eligible(name))
    }

    /// Retire a replaced session: drop its subscriptions and disable its form.
    async fn supersede(&self, mut previous: ApplicationSession) {
        for handle in &previous.subscriptions {
            self.bus.unsubscribe(handle);
        }
        if let Err(e) = previous.advance(Transition::Supersede) {
            debug!(error = %e, "Superseded session was already finishing");
        }
        info!(
            user_id = %previous.requesting_user_id,
            session_id = previous.session_id,
            "Application superseded"
        );
        if let Err(e) = self
            .platform
            .edit_original(&previous.origin, notices::superseded())
            .await
        {
            warn!(
                user_id = %previous.requesting_user_id,
                error = %e,
                "Failed to disable superseded form"
            );
        }
    }

    fn subscribe_session(&self, user_id: &str, session_id: u64) -> Vec<SubscriptionHandle> {
        SESSION_TOPICS
            .into_iter()
            .map(|topic| {
                let me = self.me.clone();
                let owner = user_id.to_string();
                self.bus.subscribe(topic, user_id, move |delivery: Delivery<Interaction>| {
                    let me = me.clone();
                    let owner = owner.clone();
                    async move {
                        // Every subscription sees every publish on its topic.
                        if delivery.actor_id != owner {
                            return;
                        }
                        let Some(manager) = me.upgrade() else {
                            return;
                        };
                        if let Err(e) = manager
                            .on_session_event(delivery.topic, &owner, session_id, &delivery.payload)
                            .await
                        {
                            crate::error::report(delivery.topic.as_str(), &owner, &e);
                        }
                    }
                })
            })
            .collect()
    }

    async fn on_session_event(
        &self,
        topic: Topic,
        user_id: &str,
        session_id: u64,
        interaction: &Interaction,
    ) -> HandlerResult {
        match topic {
            Topic::EditNameRequested => {
                self.on_edit_requested(user_id, session_id, interaction)
                    .await
            }
            Topic::NameSubmitted => {
                self.on_name_submitted(user_id, session_id, interaction)
                    .await
            }
            Topic::Cancelled => self.on_cancelled(user_id, session_id, interaction).await,
            Topic::Confirmed => self.on_confirmed(user_id, session_id, interaction).await,
        }
    }

    // ------------------------------------------------------------------------
    // Session steps
    // ------------------------------------------------------------------------

    async fn on_edit_requested(
        &self,
        user_id: &str,
        session_id: u64,
        interaction: &Interaction,
    ) -> HandlerResult {
        match self
            .registry
            .update(user_id, session_id, |s| s.advance(Transition::EditRequested))
        {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(user_id = %user_id, error = %e, "Edit request dropped");
                return Ok(());
            }
            None => return stale(user_id, Topic::EditNameRequested),
        }

        self.platform
            .respond(&interaction.handle(), InteractionResponse::modal(notices::name_modal()))
            .await?;
        Ok(())
    }

    async fn on_name_submitted(
        &self,
        user_id: &str,
        session_id: u64,
        interaction: &Interaction,
    ) -> HandlerResult {
        let name = interaction
            .text_input(NAME_INPUT_ID)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let updated = self
            .registry
            .update(user_id, session_id, |s| -> Result<_, InvalidTransition> {
                s.advance(Transition::NameSubmitted)?;
                if let Some(name) = &name {
                    s.claimed_name = Some(name.clone());
                }
                Ok(s.clone())
            });
        let session = match updated {
            Some(Ok(session)) => session,
            Some(Err(e)) => {
                debug!(user_id = %user_id, error = %e, "Name submission dropped");
                return Ok(());
            }
            None => return stale(user_id, Topic::NameSubmitted),
        };
        let payload = match name {
            Some(name) => {
                debug!(user_id = %user_id, game_name = %name, "Claimed name updated");
                self.form(&session)
            }
            None => {
                debug!(user_id = %user_id, "Blank name submitted");
                notices::form_missing_name(&self.form_view(&session))
            }
        };

        self.platform
            .respond(&interaction.handle(), InteractionResponse::update(payload))
            .await?;
        Ok(())
    }

    async fn on_cancelled(
        &self,
        user_id: &str,
        session_id: u64,
        interaction: &Interaction,
    ) -> HandlerResult {
        let session = match self.registry.finish(user_id, session_id, Transition::Cancel) {
            Ok(Some(session)) => session,
            Ok(None) => return stale(user_id, Topic::Cancelled),
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "Cancel ignored");
                return Ok(());
            }
        };
        for handle in &session.subscriptions {
            self.bus.unsubscribe(handle);
        }
        info!(user_id = %user_id, session_id, "Application cancelled");

        self.platform
            .respond(&interaction.handle(), InteractionResponse::update(notices::cancelled()))
            .await?;
        Ok(())
    }

    async fn on_confirmed(
        &self,
        user_id: &str,
        session_id: u64,
        interaction: &Interaction,
    ) -> HandlerResult {
        let Some(session) = self.registry.current(user_id, session_id) else {
            return stale(user_id, Topic::Confirmed);
        };

        let Some(claimed_name) = session.claimed_name.clone() else {
            let view = self.form_view(&session);
            self.platform
                .respond(
                    &interaction.handle(),
                    InteractionResponse::update(notices::form_missing_name(&view)),
                )
                .await?;
            return Ok(());
        };

        let torn_down = self
            .registry
            .update(user_id, session_id, |s| -> Result<_, InvalidTransition> {
                s.advance(Transition::Confirm)?;
                Ok(s.take_subscriptions(&CONFIRM_TEARDOWN))
            });
        match torn_down {
            Some(Ok(handles)) => {
                for handle in &handles {
                    self.bus.unsubscribe(handle);
                }
            }
            Some(Err(e)) => {
                debug!(user_id = %user_id, error = %e, "Confirm dropped");
                return Ok(());
            }
            None => return stale(user_id, Topic::Confirmed),
        }

        self.platform
            .respond(&interaction.handle(), InteractionResponse::update(notices::in_progress()))
            .await?;

        // A cancel or a newer application may have landed while replying.
        match self
            .registry
            .update(user_id, session_id, |s| s.advance(Transition::BeginVerify))
        {
            Some(Ok(_)) => {}
            _ => {
                debug!(user_id = %user_id, session_id, "Session ended before verification");
                return Ok(());
            }
        }

        let outcome = self
            .verifier
            .verify(&claimed_name, user_id, &session.target_server_id)
            .await;

        match self.registry.finish(user_id, session_id, Transition::Finish) {
            Ok(Some(done)) => {
                for handle in &done.subscriptions {
                    self.bus.unsubscribe(handle);
                }
            }
            Ok(None) => debug!(user_id = %user_id, "Session superseded during verification"),
            Err(e) => warn!(
                user_id = %user_id,
                error = %e,
                "Unexpected session state after verification"
            ),
        }

        metrics::record_outcome(outcome.label());
        info!(
            user_id = %user_id,
            game_name = %claimed_name,
            game_id = outcome.game_id().unwrap_or("-"),
            outcome = %outcome,
            "Verification finished"
        );

        self.dispatch_outcome(&session, interaction, &claimed_name, &outcome)
            .await
    }

    /// Outcome notices, then the moderation-log entry.
    async fn dispatch_outcome(
        &self,
        session: &ApplicationSession,
        interaction: &Interaction,
        claimed_name: &str,
        outcome: &VerificationOutcome,
    ) -> HandlerResult {
        let user_id = session.requesting_user_id.as_str();

        match outcome {
            VerificationOutcome::UpstreamUnavailable => {
                self.notify_origin(session, notices::service_offline()).await;
            }
            VerificationOutcome::InternalError => {
                self.notify_origin(session, notices::generic_error(self.contact()))
                    .await;
            }
            VerificationOutcome::Success { .. } => {
                self.direct(
                    user_id,
                    notices::success_direct(&session.requester_name, &self.whitelist.server_label),
                )
                .await;
                if let Err(e) = self.capacity.enforce_cap().await {
                    warn!(error = %e, "Could not check allow-list size");
                }
                if let Err(e) = self.capacity.refresh_public_status().await {
                    warn!(error = %e, "Status refresh failed");
                }
            }
            VerificationOutcome::GameIdentityUnknown => {
                self.direct(user_id, notices::unknown_name_direct(self.contact()))
                    .await;
            }
            VerificationOutcome::Sanctioned { game_id } => {
                self.on_sanctioned(user_id, game_id);
            }
            VerificationOutcome::ChatIdentityUnknown { .. } | VerificationOutcome::BothUnknown => {}
        }

        let requester_tag = interaction
            .actor()
            .map_or_else(|| session.requester_name.clone(), |u| u.tag());
        self.platform
            .send_message(
                &self.guild.moderation_log_channel_id,
                notices::moderation_log(outcome, claimed_name, &requester_tag, user_id),
            )
            .await?;
        Ok(())
    }

    /// Hook for sanctioned applicants. No user-facing action is taken.
    fn on_sanctioned(&self, user_id: &str, game_id: &str) {
        warn!(user_id = %user_id, game_id = %game_id, "Sanctioned identity applied");
    }

    // ------------------------------------------------------------------------
    // Status lookup, notice role, gate toggle
    // ------------------------------------------------------------------------

    /// Tell the acting user whether their linked identity is whitelisted.
    pub async fn lookup_status(&self, interaction: &Interaction) -> HandlerResult {
        let user_id = interaction.actor_id()?;
        let handle = interaction.handle();
        self.platform
            .respond(&handle, InteractionResponse::defer_ephemeral())
            .await?;

        match self.lookup(user_id).await {
            Ok(Lookup::NotLinked) => self.edit(&handle, notices::not_linked(self.contact())).await,
            Ok(Lookup::Linked { game_name, listed }) => {
                let payload = notices::lookup_result(
                    game_name.as_deref(),
                    &self.whitelist.server_label,
                    listed,
                );
                self.edit(&handle, payload).await
            }
            Err(UpstreamError::Unavailable) => self.edit(&handle, notices::service_offline()).await,
            Err(e) => {
                self.edit(&handle, notices::generic_error(self.contact())).await?;
                Err(e.into())
            }
        }
    }

    async fn lookup(&self, user_id: &str) -> Result<Lookup, UpstreamError> {
        let Some(link) = self.upstreams.links.get_link(user_id).await.found()? else {
            return Ok(Lookup::NotLinked);
        };
        let listed = self
            .upstreams
            .allow_list
            .contains(&self.whitelist.server_id, &link.game_id)
            .await?;
        let game_name = self
            .upstreams
            .identity
            .resolve_name_history(&link.game_id)
            .await
            .ok()
            .and_then(|mut names| names.pop());
        Ok(Lookup::Linked { game_name, listed })
    }

    /// Add the wait-notice role if the member lacks it, remove it otherwise.
    pub async fn toggle_wait_notice(&self, interaction: &Interaction) -> HandlerResult {
        let member = acting_member(interaction)?;
        let role_id = self.guild.wait_notice_role_id.as_str();
        let held = member.roles.iter().any(|r| r == role_id);

        if held {
            self.platform
                .remove_role(&self.guild.id, &member.user.id, role_id)
                .await?;
        } else {
            self.platform
                .add_role(&self.guild.id, &member.user.id, role_id)
                .await?;
        }
        debug!(user_id = %member.user.id, added = !held, "Wait notice toggled");

        self.platform
            .respond(
                &interaction.handle(),
                InteractionResponse::reply(notices::wait_notice_toggled(!held)),
            )
            .await?;
        Ok(())
    }

    /// Administrative open/close of the capacity gate.
    pub async fn set_applications_open(&self, interaction: &Interaction) -> HandlerResult {
        let handle = interaction.handle();
        if !interaction.actor_has_role(&self.guild.admin_role_id) {
            self.platform
                .respond(&handle, InteractionResponse::reply(notices::admin_only()))
                .await?;
            return Ok(());
        }
        let open = interaction
            .bool_option("open")
            .ok_or(ProtoError::MissingField("open"))?;

        self.platform
            .respond(&handle, InteractionResponse::defer_ephemeral())
            .await?;
        if open {
            self.capacity.open().await?;
        } else {
            self.capacity.close().await?;
        }
        info!(user_id = %interaction.actor_id()?, open, "Applications toggled by administrator");
        if let Err(e) = self.capacity.refresh_public_status().await {
            warn!(error = %e, "Status refresh failed");
        }
        self.edit(&handle, notices::applications_set(self.capacity.is_open()))
            .await
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn contact(&self) -> Option<&str> {
        self.whitelist.contact.as_deref()
    }

    fn form_view<'a>(&'a self, session: &'a ApplicationSession) -> FormView<'a> {
        FormView {
            claimed_name: session.claimed_name.as_deref(),
            requester_name: &session.requester_name,
            server_id: &session.target_server_id,
            server_label: &self.whitelist.server_label,
        }
    }

    fn form(&self, session: &ApplicationSession) -> MessagePayload {
        notices::application_form(&self.form_view(session))
    }

    async fn edit(&self, handle: &InteractionHandle, payload: MessagePayload) -> HandlerResult {
        self.platform.edit_original(handle, payload).await?;
        Ok(())
    }

    /// Replace the in-progress notice; the moderation-log entry follows
    /// regardless.
    async fn notify_origin(&self, session: &ApplicationSession, payload: MessagePayload) {
        if let Err(e) = self.platform.edit_original(&session.origin, payload).await {
            warn!(
                user_id = %session.requesting_user_id,
                error = %e,
                "Failed to update application reply"
            );
        }
    }

    /// Direct messages may be refused by the user's privacy settings.
    async fn direct(&self, user_id: &str, payload: MessagePayload) {
        if let Err(e) = self.platform.send_direct(user_id, payload).await {
            warn!(user_id = %user_id, error = %e, "Direct message refused");
        }
    }
}

fn acting_member(interaction: &Interaction) -> Result<&GuildMember, HandlerError> {
    interaction
        .member
        .as_ref()
        .ok_or_else(|| HandlerError::Precondition("interaction outside the guild".to_string()))
}

/// Events for a session that no longer exists are dropped.
fn stale(user_id: &str, topic: Topic) -> HandlerResult {
    debug!(user_id = %user_id, topic = %topic, "Stale session event dropped");
    Ok(())
}
