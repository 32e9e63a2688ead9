use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, Order, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entities::monitoring_config::{self, Column, Entity};
use crate::store::Store;

/// Monitoring configuration row (singleton per deployment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfigRow {
    pub id: String,
    pub api_url: Option<String>,
    pub api_token_encrypted: Option<String>,
    pub api_token_iv: Option<String>,
    pub username: Option<String>,
    pub password_encrypted: Option<String>,
    pub password_iv: Option<String>,
    pub enabled: bool,
    pub poll_interval_minutes: i32,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub total_polls: i64,
    pub successful_polls: i64,
    pub failed_polls: i64,
    pub alerts_processed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoringConfigRow {
    pub fn has_api_token(&self) -> bool {
        self.api_token_encrypted.is_some()
    }

    pub fn has_password(&self) -> bool {
        self.password_encrypted.is_some()
    }
}

/// Seed values used when the config row does not exist yet, sourced
/// from the server config file and environment overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigDefaults {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub enabled: bool,
    pub poll_interval_minutes: i32,
}

/// Config update request. Plaintext secrets are encrypted on write and
/// never echoed back.
#[derive(Debug, Clone, Default)]
pub struct MonitoringConfigUpdate {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub enabled: Option<bool>,
    pub poll_interval_minutes: Option<i32>,
}

fn to_row(m: monitoring_config::Model) -> MonitoringConfigRow {
    MonitoringConfigRow {
        id: m.id,
        api_url: m.api_url,
        api_token_encrypted: m.api_token_encrypted,
        api_token_iv: m.api_token_iv,
        username: m.username,
        password_encrypted: m.password_encrypted,
        password_iv: m.password_iv,
        enabled: m.enabled,
        poll_interval_minutes: m.poll_interval_minutes,
        last_poll_at: m.last_poll_at.map(|t| t.with_timezone(&Utc)),
        last_error: m.last_error,
        last_error_at: m.last_error_at.map(|t| t.with_timezone(&Utc)),
        total_polls: m.total_polls,
        successful_polls: m.successful_polls,
        failed_polls: m.failed_polls,
        alerts_processed: m.alerts_processed,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    /// Returns the singleton monitoring config, creating it from the
    /// given defaults on first access. Plaintext secrets in the
    /// defaults are encrypted before they are stored.
    pub async fn get_or_init_monitoring_config(
        &self,
        defaults: &ConfigDefaults,
    ) -> Result<MonitoringConfigRow> {
        let existing = Entity::find()
            .order_by(Column::CreatedAt, Order::Asc)
            .one(self.db())
            .await?;
        if let Some(m) = existing {
            return Ok(to_row(m));
        }

        let now = Utc::now().fixed_offset();
        let (token_ct, token_iv) = match defaults.api_token.as_deref() {
            Some(token) if !token.is_empty() => {
                let enc = self.cipher.encrypt(token)?;
                (Some(enc.ciphertext), Some(enc.iv))
            }
            _ => (None, None),
        };
        let (password_ct, password_iv) = match defaults.password.as_deref() {
            Some(password) if !password.is_empty() => {
                let enc = self.cipher.encrypt(password)?;
                (Some(enc.ciphertext), Some(enc.iv))
            }
            _ => (None, None),
        };

        let am = monitoring_config::ActiveModel {
            id: Set(zrelay_common::id::next_id()),
            api_url: Set(defaults.api_url.clone()),
            api_token_encrypted: Set(token_ct),
            api_token_iv: Set(token_iv),
            username: Set(defaults.username.clone()),
            password_encrypted: Set(password_ct),
            password_iv: Set(password_iv),
            enabled: Set(defaults.enabled),
            poll_interval_minutes: Set(defaults.poll_interval_minutes.clamp(1, 60)),
            last_poll_at: Set(None),
            last_error: Set(None),
            last_error_at: Set(None),
            total_polls: Set(0),
            successful_polls: Set(0),
            failed_polls: Set(0),
            alerts_processed: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        tracing::info!("Created monitoring config from defaults");
        Ok(to_row(model))
    }

    /// Applies an administrative config update. `api_token` and
    /// `password` arrive as plaintext and are encrypted at rest with a
    /// fresh IV each.
    pub async fn update_monitoring_config(
        &self,
        defaults: &ConfigDefaults,
        update: MonitoringConfigUpdate,
    ) -> Result<MonitoringConfigRow> {
        let current = self.get_or_init_monitoring_config(defaults).await?;
        let model = Entity::find_by_id(&current.id)
            .one(self.db())
            .await?
            .ok_or_else(|| anyhow::anyhow!("monitoring config row vanished"))?;

        let now = Utc::now().fixed_offset();
        let mut am: monitoring_config::ActiveModel = model.into();
        if let Some(url) = update.api_url {
            am.api_url = Set(Some(url));
        }
        if let Some(token) = update.api_token {
            let enc = self.cipher.encrypt(&token)?;
            am.api_token_encrypted = Set(Some(enc.ciphertext));
            am.api_token_iv = Set(Some(enc.iv));
        }
        if let Some(username) = update.username {
            am.username = Set(Some(username));
        }
        if let Some(password) = update.password {
            let enc = self.cipher.encrypt(&password)?;
            am.password_encrypted = Set(Some(enc.ciphertext));
            am.password_iv = Set(Some(enc.iv));
        }
        if let Some(enabled) = update.enabled {
            am.enabled = Set(enabled);
        }
        if let Some(minutes) = update.poll_interval_minutes {
            am.poll_interval_minutes = Set(minutes.clamp(1, 60));
        }
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        Ok(to_row(updated))
    }

    /// Records a successful poll cycle: stamps the poll time, bumps the
    /// counters, and clears any previous error.
    pub async fn record_poll_success(&self, alerts_processed: u64) -> Result<()> {
        let model = Entity::find().one(self.db()).await?;
        let Some(model) = model else {
            return Ok(());
        };
        let now = Utc::now().fixed_offset();
        let total = model.total_polls + 1;
        let successful = model.successful_polls + 1;
        let processed = model.alerts_processed + alerts_processed as i64;
        let mut am: monitoring_config::ActiveModel = model.into();
        am.total_polls = Set(total);
        am.successful_polls = Set(successful);
        am.alerts_processed = Set(processed);
        am.last_poll_at = Set(Some(now));
        am.last_error = Set(None);
        am.last_error_at = Set(None);
        am.updated_at = Set(now);
        am.update(self.db()).await?;
        Ok(())
    }

    /// Records a failed poll cycle for operator visibility.
    pub async fn record_poll_error(&self, message: &str) -> Result<()> {
        let model = Entity::find().one(self.db()).await?;
        let Some(model) = model else {
            return Ok(());
        };
        let now = Utc::now().fixed_offset();
        let total = model.total_polls + 1;
        let failed = model.failed_polls + 1;
        let mut am: monitoring_config::ActiveModel = model.into();
        am.total_polls = Set(total);
        am.failed_polls = Set(failed);
        am.last_error = Set(Some(message.to_string()));
        am.last_error_at = Set(Some(now));
        am.updated_at = Set(now);
        am.update(self.db()).await?;
        Ok(())
    }

    /// Decrypts the stored API token; `None` when absent or corrupt.
    pub fn decrypted_api_token(&self, row: &MonitoringConfigRow) -> Option<String> {
        let ct = row.api_token_encrypted.as_deref()?;
        let iv = row.api_token_iv.as_deref()?;
        self.cipher.decrypt(ct, iv)
    }

    /// Decrypts the stored password; `None` when absent or corrupt.
    pub fn decrypted_password(&self, row: &MonitoringConfigRow) -> Option<String> {
        let ct = row.password_encrypted.as_deref()?;
        let iv = row.password_iv.as_deref()?;
        self.cipher.decrypt(ct, iv)
    }
}
