//! Capacity gate: the persisted "applications open" flag, the allow-list cap
//! and the single public status message.

use crate::config::WhitelistConfig;
use crate::db::{Database, DbError, SettingKey};
use crate::error::HandlerError;
use crate::metrics;
use crate::platform::{ChatPlatform, PlatformError};
use crate::upstream::{AllowList, UpstreamError, UpstreamResultExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use whitelist_proto::{ActionRow, Button, ButtonStyle, ComponentId, Embed, MessagePayload};

const STATUS_COLOR: u32 = 0x2894FF;

/// Process-wide capacity state. Every mutation is written through to the
/// settings table before it is observable.
pub struct CapacityGate {
    db: Database,
    allow_list: Arc<dyn AllowList>,
    platform: Arc<dyn ChatPlatform>,
    server_id: String,
    server_label: String,
    cap: usize,
    status_channel_id: String,
    open: AtomicBool,
    status_message_id: Mutex<Option<String>>,
    /// Serialises refreshes so two concurrent ones never both post.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl CapacityGate {
    /// Build the gate from persisted settings. A missing open flag reads as open.
    pub async fn load(
        db: Database,
        allow_list: Arc<dyn AllowList>,
        platform: Arc<dyn ChatPlatform>,
        whitelist: &WhitelistConfig,
        status_channel_id: &str,
    ) -> Result<Self, DbError> {
        let open = db
            .settings()
            .get_bool(SettingKey::ApplicationsOpen)
            .await?
            .unwrap_or(true);
        let status_message_id = db.settings().get_string(SettingKey::StatusMessageId).await?;
        metrics::set_applications_open(open);

        info!(
            open,
            status_message_id = ?status_message_id,
            cap = whitelist.cap,
            "Capacity gate loaded"
        );

        Ok(Self {
            db,
            allow_list,
            platform,
            server_id: whitelist.server_id.clone(),
            server_label: whitelist.server_label.clone(),
            cap: whitelist.cap,
            status_channel_id: status_channel_id.to_string(),
            open: AtomicBool::new(open),
            status_message_id: Mutex::new(status_message_id),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Id of the recorded public status message.
    pub fn status_message_id(&self) -> Option<String> {
        self.status_message_id.lock().clone()
    }

    /// Persist and apply the open flag.
    async fn set_open(&self, open: bool) -> Result<(), DbError> {
        self.db
            .settings()
            .set_bool(SettingKey::ApplicationsOpen, open)
            .await?;
        let was = self.open.swap(open, Ordering::AcqRel);
        metrics::set_applications_open(open);
        if was != open {
            info!(open, "Applications state changed");
        }
        Ok(())
    }

    pub async fn open(&self) -> Result<(), DbError> {
        self.set_open(true).await
    }

    pub async fn close(&self) -> Result<(), DbError> {
        self.set_open(false).await
    }

    /// Allow-list size across every server; the figure the cap applies to.
    pub async fn get_count(&self) -> Result<usize, UpstreamError> {
        Ok(self
            .allow_list
            .get_all_entries()
            .await
            .found()?
            .map_or(0, |entries| entries.len()))
    }

    /// Close applications when the allow-list has reached the cap. Returns
    /// whether the cap is reached.
    pub async fn enforce_cap(&self) -> Result<bool, HandlerError> {
        let count = self.get_count().await?;
        self.close_if_full(count).await?;
        Ok(count >= self.cap)
    }

    async fn close_if_full(&self, count: usize) -> Result<(), DbError> {
        if count >= self.cap && self.is_open() {
            info!(count, cap = self.cap, "Allow-list cap reached, closing applications");
            self.close().await?;
        }
        Ok(())
    }

    /// Render the status message and edit it in place, or post it and record
    /// its id when none is recorded (or the recorded one was deleted).
    pub async fn refresh_public_status(&self) -> Result<(), HandlerError> {
        let _guard = self.refresh_lock.lock().await;

        let entries = match self.allow_list.get_all_entries().await.found() {
            Ok(entries) => Some(entries.unwrap_or_default()),
            Err(e) => {
                warn!(error = %e, "Allow-list unavailable, status shows no count");
                None
            }
        };
        if let Some(all) = &entries {
            self.close_if_full(all.len()).await?;
        }
        let listed = entries.map(|all| {
            all.iter()
                .filter(|e| e.server_id == self.server_id)
                .count()
        });
        let payload = status_message(listed, self.cap, self.is_open(), &self.server_label);

        if let Some(message_id) = self.status_message_id() {
            match self
                .platform
                .edit_message(&self.status_channel_id, &message_id, payload.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(PlatformError::NotFound(_)) => {
                    warn!(message_id = %message_id, "Status message gone, posting a new one");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let message_id = self
            .platform
            .send_message(&self.status_channel_id, payload)
            .await?;
        self.db
            .settings()
            .set_string(SettingKey::StatusMessageId, &message_id)
            .await?;
        info!(message_id = %message_id, "Status message posted");
        *self.status_message_id.lock() = Some(message_id);
        Ok(())
    }
}

/// Public status: entry count, remaining slots, state and the three entry
/// buttons. `listed` is `None` when the allow-list could not be read.
pub fn status_message(
    listed: Option<usize>,
    cap: usize,
    open: bool,
    server_label: &str,
) -> MessagePayload {
    let unavailable = || "unavailable".to_string();
    let embed = Embed::new()
        .title("Whitelist applications")
        .description(format!("Apply here for access to {server_label}."))
        .color(STATUS_COLOR)
        .field("Whitelisted", listed.map_or_else(unavailable, |n| n.to_string()), true)
        .field(
            "Slots left",
            listed.map_or_else(unavailable, |n| cap.saturating_sub(n).to_string()),
            true,
        )
        .field("Applications", if open { "open" } else { "closed" }, true);

    MessagePayload::embed(embed).with_components(vec![ActionRow::buttons([
        Button::new(ComponentId::Apply, "Apply", ButtonStyle::Primary).disabled(!open),
        Button::new(ComponentId::SearchWhitelist, "Check my status", ButtonStyle::Secondary),
        Button::new(ComponentId::WaitNotice, "Notify me when open", ButtonStyle::Secondary),
    ])])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, FakePlatform, PlatformCall};
    use whitelist_proto::Component;

    fn whitelist(cap: usize) -> WhitelistConfig {
        WhitelistConfig {
            cap,
            ..WhitelistConfig::default()
        }
    }

    async fn gate(
        api: &Arc<FakeApi>,
        platform: &Arc<FakePlatform>,
        cap: usize,
    ) -> (CapacityGate, Database) {
        let db = Database::new(":memory:").await.unwrap();
        let gate = CapacityGate::load(
            db.clone(),
            api.clone(),
            platform.clone(),
            &whitelist(cap),
            "status",
        )
        .await
        .unwrap();
        (gate, db)
    }

    fn apply_disabled(payload: &MessagePayload) -> bool {
        payload.components[0].components.iter().any(|c| {
            matches!(c, Component::Button(b) if b.custom_id == "WHITELIST_APPLY" && b.disabled)
        })
    }

    #[tokio::test]
    async fn defaults_to_open_and_persists_toggles() {
        let api = Arc::new(FakeApi::default());
        let platform = Arc::new(FakePlatform::default());
        let (gate, db) = gate(&api, &platform, 60).await;
        assert!(gate.is_open());

        gate.close().await.unwrap();
        assert!(!gate.is_open());
        assert_eq!(
            db.settings()
                .get_bool(SettingKey::ApplicationsOpen)
                .await
                .unwrap(),
            Some(false)
        );

        let reloaded = CapacityGate::load(db, api, platform, &whitelist(60), "status")
            .await
            .unwrap();
        assert!(!reloaded.is_open());
    }

    #[tokio::test]
    async fn first_refresh_posts_then_edits_in_place() {
        let api = Arc::new(FakeApi::default());
        let platform = Arc::new(FakePlatform::default());
        let (gate, db) = gate(&api, &platform, 60).await;

        gate.refresh_public_status().await.unwrap();
        let id = gate.status_message_id().unwrap();
        assert_eq!(
            db.settings()
                .get_string(SettingKey::StatusMessageId)
                .await
                .unwrap(),
            Some(id.clone())
        );

        gate.refresh_public_status().await.unwrap();
        let calls = platform.calls();
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, PlatformCall::Send { .. }))
                .count(),
            1
        );
        assert!(calls.iter().any(
            |c| matches!(c, PlatformCall::Edit { message_id, .. } if *message_id == id)
        ));
    }

    #[tokio::test]
    async fn reaching_cap_closes_before_rendering() {
        let api = Arc::new(FakeApi::default());
        api.seed_entries(2, "mckismetlab-main-server");
        let platform = Arc::new(FakePlatform::default());
        let (gate, db) = gate(&api, &platform, 3).await;

        gate.refresh_public_status().await.unwrap();
        assert!(gate.is_open());

        // The third entry pushes the count to exactly the cap.
        api.seed_entries(1, "mckismetlab-main-server");
        gate.refresh_public_status().await.unwrap();
        assert!(!gate.is_open());
        assert_eq!(
            db.settings()
                .get_bool(SettingKey::ApplicationsOpen)
                .await
                .unwrap(),
            Some(false)
        );

        let last = platform.last_channel_payload().unwrap();
        assert!(last.mentions("closed"));
        assert!(apply_disabled(&last));
    }

    #[tokio::test]
    async fn enforce_cap_counts_every_server() {
        let api = Arc::new(FakeApi::default());
        api.seed_entries(1, "mckismetlab-main-server");
        api.seed_entries(1, "other-server");
        let platform = Arc::new(FakePlatform::default());
        let (gate, _db) = gate(&api, &platform, 2).await;

        assert_eq!(gate.get_count().await.unwrap(), 2);
        assert!(gate.enforce_cap().await.unwrap());
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn unavailable_allow_list_still_renders() {
        let api = Arc::new(FakeApi::default());
        api.set_unavailable(true);
        let platform = Arc::new(FakePlatform::default());
        let (gate, _db) = gate(&api, &platform, 60).await;

        gate.refresh_public_status().await.unwrap();
        assert!(gate.is_open());
        assert!(platform.last_channel_payload().unwrap().mentions("unavailable"));
        assert!(matches!(
            gate.enforce_cap().await,
            Err(HandlerError::Upstream(UpstreamError::Unavailable))
        ));
    }

    #[tokio::test]
    async fn deleted_status_message_is_reposted() {
        let api = Arc::new(FakeApi::default());
        let platform = Arc::new(FakePlatform::default());
        let (gate, _db) = gate(&api, &platform, 60).await;

        gate.refresh_public_status().await.unwrap();
        let first = gate.status_message_id().unwrap();
        platform.forget_messages();

        gate.refresh_public_status().await.unwrap();
        assert_ne!(gate.status_message_id().unwrap(), first);
    }

    #[test]
    fn remaining_slots_floor_at_zero() {
        let payload = status_message(Some(75), 60, false, "Main server");
        let fields = &payload.embeds[0].fields;
        assert_eq!(fields[0].value, "75");
        assert_eq!(fields[1].value, "0");
        assert_eq!(fields[2].value, "closed");
    }
}
