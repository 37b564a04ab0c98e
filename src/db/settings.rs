//! Key/value settings repository.

use super::DbError;
use sqlx::SqlitePool;

/// Known settings keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// Whether new applications are accepted.
    ApplicationsOpen,
    /// Id of the public status message, once posted.
    StatusMessageId,
}

impl SettingKey {
    fn as_str(self) -> &'static str {
        match self {
            SettingKey::ApplicationsOpen => "applications_open",
            SettingKey::StatusMessageId => "status_message_id",
        }
    }
}

/// Repository for settings operations.
pub struct SettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Read a raw setting value.
    pub async fn get_string(&self, key: SettingKey) -> Result<Option<String>, DbError> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
            SELECT value FROM settings WHERE key = ?
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(value)
    }

    /// Insert or replace a raw setting value.
    pub async fn set_string(&self, key: SettingKey, value: &str) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Read a boolean setting.
    pub async fn get_bool(&self, key: SettingKey) -> Result<Option<bool>, DbError> {
        match self.get_string(key).await? {
            None => Ok(None),
            Some(raw) => raw
                .parse::<bool>()
                .map(Some)
                .map_err(|_| {
                    DbError::Internal(format!("{} is not a boolean: {raw}", key.as_str()))
                }),
        }
    }

    /// Write a boolean setting.
    pub async fn set_bool(&self, key: SettingKey, value: bool) -> Result<(), DbError> {
        self.set_string(key, if value { "true" } else { "false" })
            .await
    }
}
