use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use zrelay_common::types::{NotificationGroup, Severity};

use crate::entities::notification_group::{self, Column, Entity};
use crate::store::Store;

fn parse_list(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

fn parse_severities(json: &str) -> Vec<Severity> {
    serde_json::from_str(json).unwrap_or_default()
}

impl Store {
    fn to_group(&self, m: notification_group::Model) -> NotificationGroup {
        let bot_token = match (m.bot_token_encrypted.as_deref(), m.bot_token_iv.as_deref()) {
            (Some(ct), Some(iv)) => self.cipher.decrypt(ct, iv),
            _ => None,
        };
        NotificationGroup {
            id: m.id,
            name: m.name,
            description: m.description,
            member_ids: parse_list(&m.member_ids),
            trigger_ids: parse_list(&m.trigger_ids),
            host_patterns: parse_list(&m.host_patterns),
            severities: parse_severities(&m.severities),
            enabled: m.enabled,
            priority: m.priority,
            chat_id: m.chat_id,
            bot_token,
            notify_on_resolve: m.notify_on_resolve,
            notify_on_acknowledge: m.notify_on_acknowledge,
            min_notification_interval_minutes: m.min_notification_interval_minutes,
            alerts_matched: m.alerts_matched,
            notifications_sent: m.notifications_sent,
            last_notification_at: m.last_notification_at.map(|t| t.with_timezone(&Utc)),
            created_at: m.created_at.with_timezone(&Utc),
            updated_at: m.updated_at.with_timezone(&Utc),
        }
    }

    /// Inserts a new notification group; an optional group bot token is
    /// encrypted at rest. Returns the stored group (with a generated id
    /// when the caller left it empty).
    pub async fn insert_group(&self, group: &NotificationGroup) -> Result<NotificationGroup> {
        let now = Utc::now().fixed_offset();
        let id = if group.id.is_empty() {
            zrelay_common::id::next_id()
        } else {
            group.id.clone()
        };
        let (token_ct, token_iv) = match group.bot_token.as_deref() {
            Some(token) if !token.is_empty() => {
                let enc = self.cipher.encrypt(token)?;
                (Some(enc.ciphertext), Some(enc.iv))
            }
            _ => (None, None),
        };
        let am = notification_group::ActiveModel {
            id: Set(id),
            name: Set(group.name.clone()),
            description: Set(group.description.clone()),
            member_ids: Set(serde_json::to_string(&group.member_ids)?),
            trigger_ids: Set(serde_json::to_string(&group.trigger_ids)?),
            host_patterns: Set(serde_json::to_string(&group.host_patterns)?),
            severities: Set(serde_json::to_string(&group.severities)?),
            enabled: Set(group.enabled),
            priority: Set(group.priority),
            chat_id: Set(group.chat_id.clone()),
            bot_token_encrypted: Set(token_ct),
            bot_token_iv: Set(token_iv),
            notify_on_resolve: Set(group.notify_on_resolve),
            notify_on_acknowledge: Set(group.notify_on_acknowledge),
            min_notification_interval_minutes: Set(group.min_notification_interval_minutes),
            alerts_matched: Set(0),
            notifications_sent: Set(0),
            last_notification_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(self.to_group(model))
    }

    /// Replaces the administrator-editable fields of a group. Counters
    /// and the rate-limit stamp are not touched here.
    pub async fn update_group(&self, group: &NotificationGroup) -> Result<Option<NotificationGroup>> {
        let model = Entity::find_by_id(&group.id).one(self.db()).await?;
        let Some(model) = model else {
            return Ok(None);
        };
        let now = Utc::now().fixed_offset();
        let mut am: notification_group::ActiveModel = model.into();
        am.name = Set(group.name.clone());
        am.description = Set(group.description.clone());
        am.member_ids = Set(serde_json::to_string(&group.member_ids)?);
        am.trigger_ids = Set(serde_json::to_string(&group.trigger_ids)?);
        am.host_patterns = Set(serde_json::to_string(&group.host_patterns)?);
        am.severities = Set(serde_json::to_string(&group.severities)?);
        am.enabled = Set(group.enabled);
        am.priority = Set(group.priority);
        am.chat_id = Set(group.chat_id.clone());
        if let Some(token) = group.bot_token.as_deref().filter(|t| !t.is_empty()) {
            let enc = self.cipher.encrypt(token)?;
            am.bot_token_encrypted = Set(Some(enc.ciphertext));
            am.bot_token_iv = Set(Some(enc.iv));
        }
        am.notify_on_resolve = Set(group.notify_on_resolve);
        am.notify_on_acknowledge = Set(group.notify_on_acknowledge);
        am.min_notification_interval_minutes = Set(group.min_notification_interval_minutes);
        am.updated_at = Set(now);
        let updated = am.update(self.db()).await?;
        Ok(Some(self.to_group(updated)))
    }

    pub async fn delete_group(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<NotificationGroup>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(|m| self.to_group(m)))
    }

    pub async fn list_groups(&self) -> Result<Vec<NotificationGroup>> {
        let rows = Entity::find()
            .order_by(Column::Priority, Order::Desc)
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(|m| self.to_group(m)).collect())
    }

    /// Enabled groups in descending priority (stable tie-break on name),
    /// the evaluation order the matcher expects.
    pub async fn list_enabled_groups(&self) -> Result<Vec<NotificationGroup>> {
        let rows = Entity::find()
            .filter(Column::Enabled.eq(true))
            .order_by(Column::Priority, Order::Desc)
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(|m| self.to_group(m)).collect())
    }

    /// Bumps the matched-alerts counter (rate-limited matches count too).
    pub async fn record_group_match(&self, id: &str) -> Result<()> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(model) = model else {
            return Ok(());
        };
        let matched = model.alerts_matched + 1;
        let now = Utc::now().fixed_offset();
        let mut am: notification_group::ActiveModel = model.into();
        am.alerts_matched = Set(matched);
        am.updated_at = Set(now);
        am.update(self.db()).await?;
        Ok(())
    }

    /// Bumps the sent counter and stamps the rate-limit timestamp.
    pub async fn record_group_notification(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(model) = model else {
            return Ok(());
        };
        let sent = model.notifications_sent + 1;
        let mut am: notification_group::ActiveModel = model.into();
        am.notifications_sent = Set(sent);
        am.last_notification_at = Set(Some(at.fixed_offset()));
        am.updated_at = Set(at.fixed_offset());
        am.update(self.db()).await?;
        Ok(())
    }
}
