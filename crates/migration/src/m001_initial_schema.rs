use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS monitoring_configs (
    id TEXT PRIMARY KEY NOT NULL,
    api_url TEXT,
    api_token_encrypted TEXT,
    api_token_iv TEXT,
    username TEXT,
    password_encrypted TEXT,
    password_iv TEXT,
    enabled INTEGER NOT NULL DEFAULT 0,
    poll_interval_minutes INTEGER NOT NULL DEFAULT 5,
    last_poll_at TEXT,
    last_error TEXT,
    last_error_at TEXT,
    total_polls INTEGER NOT NULL DEFAULT 0,
    successful_polls INTEGER NOT NULL DEFAULT 0,
    failed_polls INTEGER NOT NULL DEFAULT 0,
    alerts_processed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY NOT NULL,
    alert_id TEXT NOT NULL UNIQUE,
    trigger_id TEXT NOT NULL,
    host_id TEXT NOT NULL,
    host TEXT NOT NULL,
    trigger_name TEXT NOT NULL,
    trigger_description TEXT,
    severity TEXT NOT NULL,
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    event_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    acknowledged_by TEXT,
    acknowledged_at TEXT,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at TEXT,
    raw_json TEXT NOT NULL DEFAULT '{}',
    notification_sent INTEGER NOT NULL DEFAULT 0,
    notification_sent_at TEXT,
    notified_group_ids TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_alert_id ON alerts(alert_id);
CREATE INDEX IF NOT EXISTS idx_alerts_resolved ON alerts(resolved);
CREATE INDEX IF NOT EXISTS idx_alerts_event_time ON alerts(event_time DESC);

CREATE TABLE IF NOT EXISTS notification_groups (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    member_ids TEXT NOT NULL DEFAULT '[]',
    trigger_ids TEXT NOT NULL DEFAULT '[]',
    host_patterns TEXT NOT NULL DEFAULT '[]',
    severities TEXT NOT NULL DEFAULT '[]',
    enabled INTEGER NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 0,
    chat_id TEXT,
    bot_token_encrypted TEXT,
    bot_token_iv TEXT,
    notify_on_resolve INTEGER NOT NULL DEFAULT 0,
    notify_on_acknowledge INTEGER NOT NULL DEFAULT 0,
    min_notification_interval_minutes INTEGER NOT NULL DEFAULT 0,
    alerts_matched INTEGER NOT NULL DEFAULT 0,
    notifications_sent INTEGER NOT NULL DEFAULT 0,
    last_notification_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notification_groups_enabled ON notification_groups(enabled);

CREATE TABLE IF NOT EXISTS subscribers (
    id TEXT PRIMARY KEY NOT NULL,
    member_id TEXT NOT NULL UNIQUE,
    display_name TEXT,
    chat_id TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_subscribers_member_id ON subscribers(member_id);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS subscribers;
DROP TABLE IF EXISTS notification_groups;
DROP TABLE IF EXISTS alerts;
DROP TABLE IF EXISTS monitoring_configs;
";
