use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use zrelay_common::types::{Alert, AlertStatus, Severity};

use crate::entities::alert::{self, Column, Entity};
use crate::store::Store;

/// Result of a batch save: one record failing never aborts the rest.
#[derive(Debug, Clone, Default)]
pub struct AlertBatchOutcome {
    pub saved: usize,
    pub updated: usize,
    /// External alert ids of fresh inserts, in input order.
    pub new_ids: Vec<String>,
    pub errors: Vec<String>,
}

fn to_alert(m: alert::Model) -> Alert {
    Alert {
        id: m.id,
        alert_id: m.alert_id,
        trigger_id: m.trigger_id,
        host_id: m.host_id,
        host: m.host,
        trigger_name: m.trigger_name,
        trigger_description: m.trigger_description,
        severity: m.severity.parse().unwrap_or(Severity::NotClassified),
        status: m.status.parse().unwrap_or(AlertStatus::Problem),
        message: m.message,
        event_time: m.event_time.with_timezone(&Utc),
        update_time: m.update_time.with_timezone(&Utc),
        acknowledged: m.acknowledged,
        acknowledged_by: m.acknowledged_by,
        acknowledged_at: m.acknowledged_at.map(|t| t.with_timezone(&Utc)),
        resolved: m.resolved,
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
        raw: serde_json::from_str(&m.raw_json).unwrap_or(serde_json::Value::Null),
        notification_sent: m.notification_sent,
        notification_sent_at: m.notification_sent_at.map(|t| t.with_timezone(&Utc)),
        notified_group_ids: serde_json::from_str(&m.notified_group_ids).unwrap_or_default(),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    /// Upserts an alert keyed by its external `alert_id`. Returns `true`
    /// when a fresh record was inserted, `false` when an existing one was
    /// refreshed. Updates overwrite the mutable fields (status, severity,
    /// update time, acknowledgment, resolution, raw payload, message)
    /// while preserving creation metadata and notification bookkeeping.
    pub async fn upsert_alert(&self, alert: &Alert) -> Result<bool> {
        let existing = Entity::find()
            .filter(Column::AlertId.eq(&alert.alert_id))
            .one(self.db())
            .await?;
        let now = Utc::now().fixed_offset();

        match existing {
            Some(model) => {
                let mut am: alert::ActiveModel = model.into();
                am.trigger_id = Set(alert.trigger_id.clone());
                am.host_id = Set(alert.host_id.clone());
                am.host = Set(alert.host.clone());
                am.trigger_name = Set(alert.trigger_name.clone());
                am.trigger_description = Set(alert.trigger_description.clone());
                am.severity = Set(alert.severity.to_string());
                am.status = Set(alert.status.to_string());
                am.message = Set(alert.message.clone());
                am.update_time = Set(alert.update_time.fixed_offset());
                am.acknowledged = Set(alert.acknowledged);
                am.acknowledged_by = Set(alert.acknowledged_by.clone());
                am.acknowledged_at = Set(alert.acknowledged_at.map(|t| t.fixed_offset()));
                am.resolved = Set(alert.resolved);
                am.resolved_at = Set(alert.resolved_at.map(|t| t.fixed_offset()));
                am.raw_json = Set(serde_json::to_string(&alert.raw)?);
                am.updated_at = Set(now);
                am.update(self.db()).await?;
                Ok(false)
            }
            None => {
                let am = alert::ActiveModel {
                    id: Set(alert.id.clone()),
                    alert_id: Set(alert.alert_id.clone()),
                    trigger_id: Set(alert.trigger_id.clone()),
                    host_id: Set(alert.host_id.clone()),
                    host: Set(alert.host.clone()),
                    trigger_name: Set(alert.trigger_name.clone()),
                    trigger_description: Set(alert.trigger_description.clone()),
                    severity: Set(alert.severity.to_string()),
                    status: Set(alert.status.to_string()),
                    message: Set(alert.message.clone()),
                    event_time: Set(alert.event_time.fixed_offset()),
                    update_time: Set(alert.update_time.fixed_offset()),
                    acknowledged: Set(alert.acknowledged),
                    acknowledged_by: Set(alert.acknowledged_by.clone()),
                    acknowledged_at: Set(alert.acknowledged_at.map(|t| t.fixed_offset())),
                    resolved: Set(alert.resolved),
                    resolved_at: Set(alert.resolved_at.map(|t| t.fixed_offset())),
                    raw_json: Set(serde_json::to_string(&alert.raw)?),
                    notification_sent: Set(false),
                    notification_sent_at: Set(None),
                    notified_group_ids: Set("[]".to_string()),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                am.insert(self.db()).await?;
                Ok(true)
            }
        }
    }

    /// Per-record upsert of a batch; partial success is expected and
    /// normal, failures land in the outcome's error list.
    pub async fn save_alerts(&self, alerts: &[Alert]) -> AlertBatchOutcome {
        let mut outcome = AlertBatchOutcome::default();
        for alert in alerts {
            match self.upsert_alert(alert).await {
                Ok(true) => {
                    outcome.saved += 1;
                    outcome.new_ids.push(alert.alert_id.clone());
                }
                Ok(false) => outcome.updated += 1,
                Err(e) => {
                    tracing::error!(alert_id = %alert.alert_id, error = %e, "Failed to save alert");
                    outcome.errors.push(format!("{}: {e}", alert.alert_id));
                }
            }
        }
        outcome
    }

    /// Marks every unresolved alert whose external id is absent from the
    /// freshly fetched active set as resolved. Returns the newly
    /// resolved alerts. This is the only path that detects alerts which
    /// simply stop appearing upstream.
    pub async fn reconcile_resolved(&self, active_ids: &HashSet<String>) -> Result<Vec<Alert>> {
        let unresolved = Entity::find()
            .filter(Column::Resolved.eq(false))
            .all(self.db())
            .await?;

        let now = Utc::now();
        let now_fixed = now.fixed_offset();
        let mut resolved = Vec::new();
        for model in unresolved {
            if active_ids.contains(&model.alert_id) {
                continue;
            }
            let mut am: alert::ActiveModel = model.into();
            am.resolved = Set(true);
            am.resolved_at = Set(Some(now_fixed));
            am.status = Set(AlertStatus::Ok.to_string());
            am.updated_at = Set(now_fixed);
            let updated = am.update(self.db()).await?;
            tracing::info!(alert_id = %updated.alert_id, "Alert no longer active upstream, marked resolved");
            resolved.push(to_alert(updated));
        }
        Ok(resolved)
    }

    /// Stamps the notification flag with the groups actually notified.
    pub async fn mark_notification_sent(&self, alert_id: &str, group_ids: &[String]) -> Result<()> {
        let model = Entity::find()
            .filter(Column::AlertId.eq(alert_id))
            .one(self.db())
            .await?;
        let Some(model) = model else {
            return Ok(());
        };
        let now = Utc::now().fixed_offset();
        let mut am: alert::ActiveModel = model.into();
        am.notification_sent = Set(true);
        am.notification_sent_at = Set(Some(now));
        am.notified_group_ids = Set(serde_json::to_string(group_ids)?);
        am.updated_at = Set(now);
        am.update(self.db()).await?;
        Ok(())
    }

    /// Marks an alert acknowledged by an operator.
    pub async fn set_alert_acknowledged(
        &self,
        alert_id: &str,
        acknowledged_by: &str,
        at: chrono::DateTime<Utc>,
    ) -> Result<bool> {
        let model = Entity::find()
            .filter(Column::AlertId.eq(alert_id))
            .one(self.db())
            .await?;
        let Some(model) = model else {
            return Ok(false);
        };
        let mut am: alert::ActiveModel = model.into();
        am.acknowledged = Set(true);
        am.acknowledged_by = Set(Some(acknowledged_by.to_string()));
        am.acknowledged_at = Set(Some(at.fixed_offset()));
        am.updated_at = Set(at.fixed_offset());
        am.update(self.db()).await?;
        Ok(true)
    }

    /// Looks up an alert by its external id.
    pub async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>> {
        let model = Entity::find()
            .filter(Column::AlertId.eq(alert_id))
            .one(self.db())
            .await?;
        Ok(model.map(to_alert))
    }

    pub async fn list_active_alerts(&self, limit: usize, offset: usize) -> Result<Vec<Alert>> {
        let rows = Entity::find()
            .filter(Column::Resolved.eq(false))
            .order_by(Column::EventTime, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_alert).collect())
    }

    pub async fn list_recent_alerts(&self, limit: usize, offset: usize) -> Result<Vec<Alert>> {
        let rows = Entity::find()
            .order_by(Column::EventTime, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_alert).collect())
    }

    pub async fn count_alerts(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }
}
