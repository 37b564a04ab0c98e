//! In-memory collaborators for tests.

use crate::apply::ApplicationManager;
use crate::capacity::CapacityGate;
use crate::config::{GuildConfig, WhitelistConfig};
use crate::db::Database;
use crate::platform::{ChatPlatform, Member, PlatformError};
use crate::router::InteractionRouter;
use crate::upstream::{
    AccountLink, AllowList, AllowListEntry, GameProfile, IdentityLookup, LinkStore, UpstreamError,
    Upstreams, Violation, ViolationRegistry,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use whitelist_proto::{InteractionHandle, InteractionResponse, MessagePayload};

pub const SERVER_ID: &str = "mckismetlab-main-server";

pub fn guild_config() -> GuildConfig {
    GuildConfig {
        id: "guild".to_string(),
        access_role_id: "access-role".to_string(),
        wait_notice_role_id: "wait-role".to_string(),
        admin_role_id: "admin-role".to_string(),
        status_channel_id: "status".to_string(),
        moderation_log_channel_id: "mod-log".to_string(),
    }
}

pub fn whitelist_config(cap: usize) -> WhitelistConfig {
    WhitelistConfig {
        cap,
        contact: Some("@admins".to_string()),
        ..WhitelistConfig::default()
    }
}

/// Holds a fake call until the test releases it.
#[derive(Clone, Default)]
pub struct Pause {
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl Pause {
    /// Wait until the held call is in progress.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn hold(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

// ============================================================================
// Identity lookup
// ============================================================================

#[derive(Default)]
pub struct FakeIdentity {
    players: Mutex<HashMap<String, GameProfile>>,
    history_unavailable: AtomicBool,
    lookup_pause: Mutex<Option<Pause>>,
}

impl FakeIdentity {
    pub fn add_player(&self, name: &str, id: &str) {
        self.players.lock().insert(
            name.to_ascii_lowercase(),
            GameProfile {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub fn set_history_unavailable(&self, unavailable: bool) {
        self.history_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Hold the next name lookup until released.
    pub fn pause_next_lookup(&self) -> Pause {
        let pause = Pause::default();
        *self.lookup_pause.lock() = Some(pause.clone());
        pause
    }
}

#[async_trait]
impl IdentityLookup for FakeIdentity {
    async fn resolve_by_name(&self, name: &str) -> Result<GameProfile, UpstreamError> {
        let pause = self.lookup_pause.lock().take();
        if let Some(pause) = pause {
            pause.hold().await;
        }
        self.players
            .lock()
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or(UpstreamError::NotFound)
    }

    async fn resolve_name_history(
        &self,
        canonical_id: &str,
    ) -> Result<Vec<String>, UpstreamError> {
        if self.history_unavailable.load(Ordering::SeqCst) {
            return Err(UpstreamError::Unavailable);
        }
        self.players
            .lock()
            .values()
            .find(|p| p.id == canonical_id)
            .map(|p| vec![p.name.clone()])
            .ok_or(UpstreamError::NotFound)
    }
}

// ============================================================================
// Community API
// ============================================================================

#[derive(Default)]
pub struct FakeApi {
    links: Mutex<Vec<AccountLink>>,
    entries: Mutex<Vec<AllowListEntry>>,
    violations: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    seeded: AtomicU64,
}

impl FakeApi {
    /// Make every call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn add_link(&self, chat_user_id: &str, game_id: &str) {
        self.links.lock().push(AccountLink {
            game_id: game_id.to_string(),
            chat_user_id: chat_user_id.to_string(),
        });
    }

    /// Links as `(game_id, chat_user_id)` pairs.
    pub fn links(&self) -> Vec<(String, String)> {
        self.links
            .lock()
            .iter()
            .map(|l| (l.game_id.clone(), l.chat_user_id.clone()))
            .collect()
    }

    pub fn add_entry(&self, server_id: &str, game_id: &str) {
        self.entries.lock().push(AllowListEntry {
            game_id: game_id.to_string(),
            server_id: server_id.to_string(),
        });
    }

    /// Add `count` anonymous entries for `server_id`.
    pub fn seed_entries(&self, count: usize, server_id: &str) {
        for _ in 0..count {
            let n = self.seeded.fetch_add(1, Ordering::SeqCst);
            self.add_entry(server_id, &format!("seed-{n}"));
        }
    }

    pub fn has_entry(&self, server_id: &str, game_id: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.server_id == server_id && e.game_id == game_id)
    }

    pub fn add_violation(&self, identity_id: &str) {
        self.violations.lock().insert(identity_id.to_string());
    }

    fn reachable(&self) -> Result<(), UpstreamError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(UpstreamError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LinkStore for FakeApi {
    async fn get_link(&self, chat_user_id: &str) -> Result<AccountLink, UpstreamError> {
        self.reachable()?;
        self.links
            .lock()
            .iter()
            .find(|l| l.chat_user_id == chat_user_id)
            .cloned()
            .ok_or(UpstreamError::NotFound)
    }

    async fn create_link(&self, game_id: &str, chat_user_id: &str) -> Result<(), UpstreamError> {
        self.reachable()?;
        self.add_link(chat_user_id, game_id);
        Ok(())
    }
}

#[async_trait]
impl AllowList for FakeApi {
    async fn get_entries(&self, server_id: &str) -> Result<Vec<AllowListEntry>, UpstreamError> {
        self.reachable()?;
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.server_id == server_id)
            .cloned()
            .collect())
    }

    async fn get_all_entries(&self) -> Result<Vec<AllowListEntry>, UpstreamError> {
        self.reachable()?;
        Ok(self.entries.lock().clone())
    }

    async fn create_entry(&self, entry: &AllowListEntry) -> Result<(), UpstreamError> {
        self.reachable()?;
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl ViolationRegistry for FakeApi {
    async fn get_violation(&self, identity_id: &str) -> Result<Violation, UpstreamError> {
        self.reachable()?;
        if self.violations.lock().contains(identity_id) {
            Ok(Violation {
                identity_id: identity_id.to_string(),
                reason: None,
            })
        } else {
            Err(UpstreamError::NotFound)
        }
    }
}

// ============================================================================
// Chat platform
// ============================================================================

/// A successful outbound platform call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Respond {
        handle: InteractionHandle,
        response: InteractionResponse,
    },
    EditOriginal {
        handle: InteractionHandle,
        payload: MessagePayload,
    },
    AddRole {
        user_id: String,
        role_id: String,
    },
    RemoveRole {
        user_id: String,
        role_id: String,
    },
    Send {
        channel_id: String,
        message_id: String,
        payload: MessagePayload,
    },
    Edit {
        channel_id: String,
        message_id: String,
        payload: MessagePayload,
    },
    Direct {
        user_id: String,
        payload: MessagePayload,
    },
}

#[derive(Default)]
pub struct FakePlatform {
    calls: Mutex<Vec<PlatformCall>>,
    members: Mutex<HashMap<String, Member>>,
    messages: Mutex<HashSet<String>>,
    next_message: AtomicU64,
    fail_roles: AtomicBool,
    refuse_direct: AtomicBool,
    response_pauses: Mutex<HashMap<String, Pause>>,
}

impl FakePlatform {
    pub fn add_member(&self, user_id: &str, username: &str, roles: &[&str]) {
        self.members.lock().insert(
            user_id.to_string(),
            Member {
                user_id: user_id.to_string(),
                username: username.to_string(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
        );
    }

    pub fn fail_role_changes(&self, fail: bool) {
        self.fail_roles.store(fail, Ordering::SeqCst);
    }

    pub fn refuse_direct(&self, refuse: bool) {
        self.refuse_direct.store(refuse, Ordering::SeqCst);
    }

    /// Hold the callback response to interaction `id` until released.
    pub fn pause_response_to(&self, id: &str) -> Pause {
        let pause = Pause::default();
        self.response_pauses.lock().insert(id.to_string(), pause.clone());
        pause
    }

    /// Pretend every posted message was deleted.
    pub fn forget_messages(&self) {
        self.messages.lock().clear();
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    /// Callback responses to interaction `id`.
    pub fn responses_to(&self, id: &str) -> Vec<InteractionResponse> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Respond { handle, response } if handle.id == id => Some(response),
                _ => None,
            })
            .collect()
    }

    /// Latest edit of the original reply to interaction `id`.
    pub fn last_edit_of(&self, id: &str) -> Option<MessagePayload> {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                PlatformCall::EditOriginal { handle, payload } if handle.id == id => Some(payload),
                _ => None,
            })
    }

    pub fn directs_to(&self, user_id: &str) -> Vec<MessagePayload> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Direct { user_id: to, payload } if to == user_id => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Messages posted to `channel_id` (edits excluded).
    pub fn sent_to(&self, channel_id: &str) -> Vec<MessagePayload> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Send {
                    channel_id: to,
                    payload,
                    ..
                } if to == channel_id => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Payload of the latest channel send or edit.
    pub fn last_channel_payload(&self) -> Option<MessagePayload> {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                PlatformCall::Send { payload, .. } | PlatformCall::Edit { payload, .. } => {
                    Some(payload)
                }
                _ => None,
            })
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().push(call);
    }

    fn change_role(&self, user_id: &str, role_id: &str, add: bool) -> Result<(), PlatformError> {
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(PlatformError::Status {
                status: 403,
                body: "Missing Permissions".to_string(),
            });
        }
        let mut members = self.members.lock();
        let member = members
            .get_mut(user_id)
            .ok_or_else(|| PlatformError::NotFound(format!("member {user_id}")))?;
        member.roles.retain(|r| r != role_id);
        if add {
            member.roles.push(role_id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn respond(
        &self,
        handle: &InteractionHandle,
        response: InteractionResponse,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Respond {
            handle: handle.clone(),
            response,
        });
        let pause = self.response_pauses.lock().remove(&handle.id);
        if let Some(pause) = pause {
            pause.hold().await;
        }
        Ok(())
    }

    async fn edit_original(
        &self,
        handle: &InteractionHandle,
        payload: MessagePayload,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::EditOriginal {
            handle: handle.clone(),
            payload,
        });
        Ok(())
    }

    async fn fetch_member(
        &self,
        _guild_id: &str,
        user_id: &str,
    ) -> Result<Option<Member>, PlatformError> {
        Ok(self.members.lock().get(user_id).cloned())
    }

    async fn add_role(
        &self,
        _guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        self.change_role(user_id, role_id, true)?;
        self.record(PlatformCall::AddRole {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn remove_role(
        &self,
        _guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), PlatformError> {
        self.change_role(user_id, role_id, false)?;
        self.record(PlatformCall::RemoveRole {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        });
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        payload: MessagePayload,
    ) -> Result<String, PlatformError> {
        let message_id = format!("msg-{}", self.next_message.fetch_add(1, Ordering::SeqCst));
        self.messages.lock().insert(message_id.clone());
        self.record(PlatformCall::Send {
            channel_id: channel_id.to_string(),
            message_id: message_id.clone(),
            payload,
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: MessagePayload,
    ) -> Result<(), PlatformError> {
        if !self.messages.lock().contains(message_id) {
            return Err(PlatformError::NotFound(format!("message {message_id}")));
        }
        self.record(PlatformCall::Edit {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            payload,
        });
        Ok(())
    }

    async fn send_direct(
        &self,
        user_id: &str,
        payload: MessagePayload,
    ) -> Result<(), PlatformError> {
        if self.refuse_direct.load(Ordering::SeqCst) {
            return Err(PlatformError::Status {
                status: 403,
                body: "Cannot send messages to this user".to_string(),
            });
        }
        self.record(PlatformCall::Direct {
            user_id: user_id.to_string(),
            payload,
        });
        Ok(())
    }
}

// ============================================================================
// Wired-up daemon
// ============================================================================

/// Every component wired to in-memory fakes.
pub struct Harness {
    pub identity: Arc<FakeIdentity>,
    pub api: Arc<FakeApi>,
    pub platform: Arc<FakePlatform>,
    pub capacity: Arc<CapacityGate>,
    pub manager: Arc<ApplicationManager>,
    pub router: Arc<InteractionRouter>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_cap(60).await
    }

    pub async fn with_cap(cap: usize) -> Self {
        let identity = Arc::new(FakeIdentity::default());
        let api = Arc::new(FakeApi::default());
        let platform = Arc::new(FakePlatform::default());
        let upstreams = Upstreams {
            identity: identity.clone(),
            links: api.clone(),
            allow_list: api.clone(),
            violations: api.clone(),
        };
        let guild = guild_config();
        let whitelist = whitelist_config(cap);

        let db = Database::new(":memory:").await.expect("memory database");
        let capacity = Arc::new(
            CapacityGate::load(
                db,
                api.clone(),
                platform.clone(),
                &whitelist,
                &guild.status_channel_id,
            )
            .await
            .expect("capacity gate"),
        );
        let manager = ApplicationManager::new(
            upstreams,
            platform.clone(),
            capacity.clone(),
            guild,
            whitelist,
        );
        let router = Arc::new(InteractionRouter::new(manager.clone(), platform.clone()));

        Self {
            identity,
            api,
            platform,
            capacity,
            manager,
            router,
        }
    }
}
