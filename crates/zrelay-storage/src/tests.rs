use std::collections::HashSet;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use zrelay_common::types::{Alert, AlertStatus, NotificationGroup, Severity};

use crate::store::{ConfigDefaults, MonitoringConfigUpdate, Store};

async fn setup() -> (TempDir, Store) {
    zrelay_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("zrelay.db").display());
    let store = Store::connect(&db_url, "test-secret").await.unwrap();
    (dir, store)
}

fn make_alert(alert_id: &str, host: &str, severity: Severity) -> Alert {
    let now = Utc::now();
    Alert {
        id: zrelay_common::id::next_id(),
        alert_id: alert_id.to_string(),
        trigger_id: "17001".to_string(),
        host_id: "10084".to_string(),
        host: host.to_string(),
        trigger_name: "Free disk space is low".to_string(),
        trigger_description: None,
        severity,
        status: AlertStatus::Problem,
        message: "Free disk space is low".to_string(),
        event_time: now,
        update_time: now,
        acknowledged: false,
        acknowledged_by: None,
        acknowledged_at: None,
        resolved: false,
        resolved_at: None,
        raw: serde_json::json!({"eventid": alert_id}),
        notification_sent: false,
        notification_sent_at: None,
        notified_group_ids: vec![],
        created_at: now,
        updated_at: now,
    }
}

fn make_group(name: &str) -> NotificationGroup {
    let now = Utc::now();
    NotificationGroup {
        id: String::new(),
        name: name.to_string(),
        description: None,
        member_ids: vec!["u1".to_string()],
        trigger_ids: vec![],
        host_patterns: vec![],
        severities: vec![],
        enabled: true,
        priority: 10,
        chat_id: Some("-100200300".to_string()),
        bot_token: None,
        notify_on_resolve: false,
        notify_on_acknowledge: false,
        min_notification_interval_minutes: 0,
        alerts_matched: 0,
        notifications_sent: 0,
        last_notification_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn upsert_is_idempotent_per_alert_id() {
    let (_dir, store) = setup().await;

    let alert = make_alert("1001", "db-01", Severity::Disaster);
    assert!(store.upsert_alert(&alert).await.unwrap());

    // Re-ingesting the same external id refreshes in place
    let mut again = make_alert("1001", "db-01", Severity::Disaster);
    again.update_time = alert.update_time + Duration::minutes(5);
    assert!(!store.upsert_alert(&again).await.unwrap());

    assert_eq!(store.count_alerts().await.unwrap(), 1);
    let stored = store.get_alert("1001").await.unwrap().unwrap();
    assert!(stored.update_time > alert.update_time);
}

#[tokio::test]
async fn upsert_preserves_notification_bookkeeping() {
    let (_dir, store) = setup().await;

    let alert = make_alert("1002", "web-01", Severity::High);
    store.upsert_alert(&alert).await.unwrap();
    store
        .mark_notification_sent("1002", &["g1".to_string()])
        .await
        .unwrap();

    store.upsert_alert(&alert).await.unwrap();
    let stored = store.get_alert("1002").await.unwrap().unwrap();
    assert!(stored.notification_sent);
    assert_eq!(stored.notified_group_ids, vec!["g1".to_string()]);
}

#[tokio::test]
async fn acknowledgment_is_mirrored_locally() {
    let (_dir, store) = setup().await;

    store
        .upsert_alert(&make_alert("1005", "db-01", Severity::High))
        .await
        .unwrap();
    assert!(store
        .set_alert_acknowledged("1005", "oncall", Utc::now())
        .await
        .unwrap());
    assert!(!store
        .set_alert_acknowledged("9999", "oncall", Utc::now())
        .await
        .unwrap());

    let alert = store.get_alert("1005").await.unwrap().unwrap();
    assert!(alert.acknowledged);
    assert_eq!(alert.acknowledged_by.as_deref(), Some("oncall"));
    assert!(alert.acknowledged_at.is_some());
}

#[tokio::test]
async fn save_alerts_reports_new_ids() {
    let (_dir, store) = setup().await;

    store
        .upsert_alert(&make_alert("1001", "db-01", Severity::High))
        .await
        .unwrap();

    let batch = vec![
        make_alert("1001", "db-01", Severity::High),
        make_alert("1003", "db-02", Severity::Disaster),
    ];
    let outcome = store.save_alerts(&batch).await;
    assert_eq!(outcome.saved, 1);
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.new_ids, vec!["1003".to_string()]);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn reconcile_marks_vanished_alerts_resolved() {
    let (_dir, store) = setup().await;

    store
        .upsert_alert(&make_alert("1001", "db-01", Severity::High))
        .await
        .unwrap();
    store
        .upsert_alert(&make_alert("1002", "db-02", Severity::High))
        .await
        .unwrap();

    // 1001 is still active upstream; 1002 disappeared
    let active: HashSet<String> = ["1001".to_string()].into_iter().collect();
    let resolved = store.reconcile_resolved(&active).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].alert_id, "1002");
    assert_eq!(resolved[0].status, AlertStatus::Ok);
    assert!(resolved[0].resolved);
    assert!(resolved[0].resolved_at.is_some());

    let untouched = store.get_alert("1001").await.unwrap().unwrap();
    assert!(!untouched.resolved);

    // A second reconcile finds nothing new
    let resolved = store.reconcile_resolved(&active).await.unwrap();
    assert!(resolved.is_empty());
}

#[tokio::test]
async fn config_lazy_init_and_poll_stats() {
    let (_dir, store) = setup().await;

    let defaults = ConfigDefaults {
        api_url: Some("https://zabbix.example.com".to_string()),
        api_token: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
        username: Some("relay".to_string()),
        password: Some("hunter2".to_string()),
        enabled: true,
        poll_interval_minutes: 5,
    };

    let config = store.get_or_init_monitoring_config(&defaults).await.unwrap();
    assert!(config.enabled);
    assert!(config.has_api_token());
    assert!(config.has_password());
    // Secrets are encrypted at rest but decrypt back to the seeds
    assert_eq!(
        store.decrypted_api_token(&config).as_deref(),
        Some("0123456789abcdef0123456789abcdef01234567")
    );
    assert_eq!(store.decrypted_password(&config).as_deref(), Some("hunter2"));
    assert_ne!(
        config.api_token_encrypted.as_deref(),
        Some("0123456789abcdef0123456789abcdef01234567")
    );

    // Second access returns the same singleton
    let again = store.get_or_init_monitoring_config(&defaults).await.unwrap();
    assert_eq!(again.id, config.id);

    store.record_poll_success(7).await.unwrap();
    store.record_poll_error("connect timeout").await.unwrap();
    let config = store.get_or_init_monitoring_config(&defaults).await.unwrap();
    assert_eq!(config.total_polls, 2);
    assert_eq!(config.successful_polls, 1);
    assert_eq!(config.failed_polls, 1);
    assert_eq!(config.alerts_processed, 7);
    assert_eq!(config.last_error.as_deref(), Some("connect timeout"));
    assert!(config.last_poll_at.is_some());
}

#[tokio::test]
async fn config_update_encrypts_and_clamps_interval() {
    let (_dir, store) = setup().await;
    let defaults = ConfigDefaults::default();

    let updated = store
        .update_monitoring_config(
            &defaults,
            MonitoringConfigUpdate {
                api_url: Some("https://zabbix.internal".to_string()),
                api_token: Some("plaintext-token-from-admin-ui-0123456789".to_string()),
                poll_interval_minutes: Some(90),
                enabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.poll_interval_minutes, 60);
    assert!(updated.has_api_token());
    assert_eq!(
        store.decrypted_api_token(&updated).as_deref(),
        Some("plaintext-token-from-admin-ui-0123456789")
    );
}

#[tokio::test]
async fn group_counters_and_bot_token_round_trip() {
    let (_dir, store) = setup().await;

    let mut group = make_group("dba");
    group.bot_token = Some("123456:ABC-group-bot".to_string());
    let group = store.insert_group(&group).await.unwrap();
    assert!(!group.id.is_empty());
    // Token decrypts transparently on load
    assert_eq!(group.bot_token.as_deref(), Some("123456:ABC-group-bot"));

    let now = Utc::now();
    store.record_group_match(&group.id).await.unwrap();
    store.record_group_match(&group.id).await.unwrap();
    store.record_group_notification(&group.id, now).await.unwrap();

    let reloaded = store.get_group(&group.id).await.unwrap().unwrap();
    assert_eq!(reloaded.alerts_matched, 2);
    assert_eq!(reloaded.notifications_sent, 1);
    assert!(reloaded.last_notification_at.is_some());
}

#[tokio::test]
async fn enabled_groups_come_back_in_priority_order() {
    let (_dir, store) = setup().await;

    let mut low = make_group("low");
    low.priority = 1;
    let mut high = make_group("high");
    high.priority = 50;
    let mut off = make_group("off");
    off.enabled = false;

    store.insert_group(&low).await.unwrap();
    store.insert_group(&high).await.unwrap();
    store.insert_group(&off).await.unwrap();

    let groups = store.list_enabled_groups().await.unwrap();
    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["high", "low"]);
}

#[tokio::test]
async fn subscriber_handles() {
    let (_dir, store) = setup().await;

    store
        .upsert_subscriber("u1", Some("On-call"), "555001")
        .await
        .unwrap();
    assert_eq!(
        store.chat_handle_for("u1").await.unwrap().as_deref(),
        Some("555001")
    );
    assert!(store.chat_handle_for("u2").await.unwrap().is_none());

    // Re-registering replaces the handle instead of duplicating
    store.upsert_subscriber("u1", None, "555002").await.unwrap();
    assert_eq!(store.list_subscribers().await.unwrap().len(), 1);
    assert_eq!(
        store.chat_handle_for("u1").await.unwrap().as_deref(),
        Some("555002")
    );
}
