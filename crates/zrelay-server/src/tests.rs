use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use tempfile::TempDir;
use zrelay_common::types::{AlertStatus, NotificationGroup};
use zrelay_notify::dispatcher::{MessengerFactory, NotificationDispatcher};
use zrelay_notify::error::NotifyError;
use zrelay_notify::{FormatMode, Messenger, SentMessage};
use zrelay_storage::{ConfigDefaults, Store};
use zrelay_zabbix::types::{ProblemDetail, RawHost, RawProblem, RawTrigger};

use crate::admin::{AdminApi, AdminError, ConfigUpdateRequest};
use crate::directory::StoreSubscriberDirectory;
use crate::poller::PollOrchestrator;

struct CountingMessenger {
    calls: Mutex<Vec<String>>,
}

impl CountingMessenger {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for CountingMessenger {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        _mode: FormatMode,
    ) -> Result<SentMessage, NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{destination}: {text}"));
        Ok(SentMessage { message_id: 1 })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn defaults(enabled: bool, url: Option<&str>) -> ConfigDefaults {
    ConfigDefaults {
        api_url: url.map(str::to_string),
        api_token: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
        username: None,
        password: None,
        enabled,
        poll_interval_minutes: 5,
    }
}

async fn setup(
    enabled: bool,
    url: Option<&str>,
) -> (TempDir, Arc<Store>, Arc<PollOrchestrator>, Arc<CountingMessenger>) {
    zrelay_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("zrelay.db").display());
    let store = Arc::new(Store::connect(&db_url, "test-secret").await.unwrap());

    let messenger = Arc::new(CountingMessenger::new());
    let factory: MessengerFactory =
        Box::new(|_token: &str| Arc::new(CountingMessenger::new()) as Arc<dyn Messenger>);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Some(messenger.clone() as Arc<dyn Messenger>),
        factory,
        Arc::new(StoreSubscriberDirectory::new(store.clone())),
        FixedOffset::east_opt(3 * 3600).unwrap(),
    ));

    let orchestrator = Arc::new(PollOrchestrator::new(
        store.clone(),
        dispatcher,
        defaults(enabled, url),
        1000,
    ));
    (dir, store, orchestrator, messenger)
}

fn disaster_problem(eventid: &str, host: &str) -> ProblemDetail {
    make_problem(eventid, host, "4")
}

fn make_problem(eventid: &str, host: &str, severity: &str) -> ProblemDetail {
    let raw_host = RawHost {
        hostid: "10084".to_string(),
        host: format!("{host}.internal"),
        name: host.to_string(),
        ..Default::default()
    };
    ProblemDetail {
        problem: RawProblem {
            eventid: eventid.to_string(),
            objectid: "17001".to_string(),
            name: "Free disk space is low".to_string(),
            severity: severity.to_string(),
            clock: "1700000000".to_string(),
            value: "1".to_string(),
            ..Default::default()
        },
        trigger: Some(RawTrigger {
            triggerid: "17001".to_string(),
            description: "Free disk space below 10%".to_string(),
            priority: severity.to_string(),
            hosts: vec![raw_host.clone()],
            ..Default::default()
        }),
        host: Some(raw_host),
    }
}

fn open_group(name: &str) -> NotificationGroup {
    let now = Utc::now();
    NotificationGroup {
        id: String::new(),
        name: name.to_string(),
        description: None,
        member_ids: vec![],
        trigger_ids: vec![],
        host_patterns: vec![],
        severities: vec![],
        enabled: true,
        priority: 10,
        chat_id: Some("-100777".to_string()),
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
async fn first_sighting_persists_and_notifies_once() {
    let (_dir, store, orchestrator, messenger) = setup(true, Some("https://zbx.example.com")).await;
    let group = store.insert_group(&open_group("ops")).await.unwrap();

    let outcome = orchestrator
        .ingest_problems(vec![disaster_problem("1001", "db-01")])
        .await
        .unwrap();

    assert_eq!(outcome.alerts_processed, 1);
    assert_eq!(outcome.new_alerts, 1);
    assert_eq!(outcome.notifications_sent, 1);
    assert!(outcome.errors.is_empty());

    let alert = store.get_alert("1001").await.unwrap().unwrap();
    assert!(!alert.resolved);
    assert!(alert.notification_sent);
    assert_eq!(alert.notified_group_ids, vec![group.id.clone()]);

    let group = store.get_group(&group.id).await.unwrap().unwrap();
    assert_eq!(group.alerts_matched, 1);
    assert_eq!(group.notifications_sent, 1);
    assert!(group.last_notification_at.is_some());

    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Free disk space"));
}

#[tokio::test]
async fn resighting_does_not_renotify() {
    let (_dir, store, orchestrator, messenger) = setup(true, Some("https://zbx.example.com")).await;
    store.insert_group(&open_group("ops")).await.unwrap();

    orchestrator
        .ingest_problems(vec![disaster_problem("1001", "db-01")])
        .await
        .unwrap();
    let first = store.get_alert("1001").await.unwrap().unwrap();

    // Same external id still active on the next cycle
    let outcome = orchestrator
        .ingest_problems(vec![disaster_problem("1001", "db-01")])
        .await
        .unwrap();

    assert_eq!(outcome.new_alerts, 0);
    assert_eq!(outcome.notifications_sent, 0);
    assert_eq!(messenger.sent().len(), 1);

    let second = store.get_alert("1001").await.unwrap().unwrap();
    assert!(second.updated_at >= first.updated_at);
    assert!(second.update_time >= first.update_time);
}

#[tokio::test]
async fn non_actionable_severities_are_never_persisted_or_notified() {
    let (_dir, store, orchestrator, messenger) = setup(true, Some("https://zbx.example.com")).await;
    store.insert_group(&open_group("ops")).await.unwrap();

    let outcome = orchestrator
        .ingest_problems(vec![make_problem("2001", "web-01", "2")])
        .await
        .unwrap();

    assert_eq!(outcome.alerts_fetched, 1);
    assert_eq!(outcome.alerts_processed, 0);
    assert_eq!(outcome.new_alerts, 0);
    assert_eq!(store.count_alerts().await.unwrap(), 0);
    assert!(messenger.sent().is_empty());
}

#[tokio::test]
async fn vanished_alert_is_reconciled_to_resolved() {
    let (_dir, store, orchestrator, _messenger) = setup(true, Some("https://zbx.example.com")).await;
    store.insert_group(&open_group("ops")).await.unwrap();

    orchestrator
        .ingest_problems(vec![disaster_problem("1001", "db-01")])
        .await
        .unwrap();

    // Next fetch no longer reports 1001 as active
    let resolved = orchestrator
        .reconcile_with_ids(&HashSet::new())
        .await
        .unwrap();
    assert_eq!(resolved, 1);

    let alert = store.get_alert("1001").await.unwrap().unwrap();
    assert!(alert.resolved);
    assert!(alert.resolved_at.is_some());
    assert_eq!(alert.status, AlertStatus::Ok);
}

#[tokio::test]
async fn resolve_notices_go_to_opted_in_groups_only() {
    let (_dir, store, orchestrator, messenger) = setup(true, Some("https://zbx.example.com")).await;
    let mut group = open_group("ops");
    group.notify_on_resolve = true;
    store.insert_group(&group).await.unwrap();

    orchestrator
        .ingest_problems(vec![disaster_problem("1001", "db-01")])
        .await
        .unwrap();
    assert_eq!(messenger.sent().len(), 1);

    orchestrator
        .reconcile_with_ids(&HashSet::new())
        .await
        .unwrap();
    let sent = messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("RESOLVED"));

    // A group without the opt-in never gets a second message
    let (_dir2, store2, orchestrator2, messenger2) =
        setup(true, Some("https://zbx.example.com")).await;
    store2.insert_group(&open_group("quiet")).await.unwrap();
    orchestrator2
        .ingest_problems(vec![disaster_problem("1001", "db-01")])
        .await
        .unwrap();
    orchestrator2
        .reconcile_with_ids(&HashSet::new())
        .await
        .unwrap();
    assert_eq!(messenger2.sent().len(), 1);
}

#[tokio::test]
async fn disabled_integration_skips_the_cycle() {
    let (_dir, _store, orchestrator, messenger) =
        setup(false, Some("https://zbx.example.com")).await;

    let outcome = orchestrator.poll_now().await.unwrap();
    assert_eq!(outcome.skipped.as_deref(), Some("integration disabled"));
    assert!(messenger.sent().is_empty());
}

#[tokio::test]
async fn missing_endpoint_is_recorded_as_config_error() {
    let (_dir, store, orchestrator, _messenger) = setup(true, None).await;

    let outcome = orchestrator.poll_now().await.unwrap();
    assert_eq!(
        outcome.skipped.as_deref(),
        Some("no monitoring endpoint configured")
    );

    let config = store
        .get_or_init_monitoring_config(&defaults(true, None))
        .await
        .unwrap();
    assert_eq!(
        config.last_error.as_deref(),
        Some("no monitoring endpoint configured")
    );
    assert_eq!(config.failed_polls, 1);
}

#[tokio::test]
async fn admin_config_view_redacts_secrets() {
    let (_dir, store, orchestrator, _messenger) = setup(true, Some("https://zbx.example.com")).await;
    let admin = AdminApi::new(store, orchestrator, defaults(true, Some("https://zbx.example.com")));

    let view = admin.get_config().await.unwrap();
    assert!(view.has_api_token);
    assert!(!view.has_password);
    // Secrets only ever surface as presence flags
    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("api_token").is_none());
    assert!(json.get("password").is_none());
}

#[tokio::test]
async fn admin_update_validates_interval_and_credentials() {
    let (_dir, store, orchestrator, _messenger) = setup(true, Some("https://zbx.example.com")).await;
    let admin = AdminApi::new(store, orchestrator, defaults(true, Some("https://zbx.example.com")));

    let err = admin
        .update_config(ConfigUpdateRequest {
            poll_interval_minutes: Some(0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::BadRequest(_)));

    let err = admin
        .update_config(ConfigUpdateRequest {
            api_url: Some("not a url at all".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::BadRequest(_)));

    let view = admin
        .update_config(ConfigUpdateRequest {
            poll_interval_minutes: Some(10),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(view.poll_interval_minutes, 10);
}

#[tokio::test]
async fn admin_refuses_enabling_without_credentials() {
    zrelay_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("zrelay.db").display());
    let store = Arc::new(Store::connect(&db_url, "test-secret").await.unwrap());
    // No token and no username/password in the defaults
    let bare = ConfigDefaults {
        api_url: Some("https://zbx.example.com".to_string()),
        poll_interval_minutes: 5,
        ..Default::default()
    };
    let factory: MessengerFactory =
        Box::new(|_token: &str| Arc::new(CountingMessenger::new()) as Arc<dyn Messenger>);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        None,
        factory,
        Arc::new(StoreSubscriberDirectory::new(store.clone())),
        FixedOffset::east_opt(0).unwrap(),
    ));
    let orchestrator = Arc::new(PollOrchestrator::new(
        store.clone(),
        dispatcher,
        bare.clone(),
        1000,
    ));
    let admin = AdminApi::new(store, orchestrator, bare);

    let err = admin
        .update_config(ConfigUpdateRequest {
            enabled: Some(true),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::BadRequest(_)));

    // Supplying a bearer-shaped token makes enabling valid
    let view = admin
        .update_config(ConfigUpdateRequest {
            enabled: Some(true),
            api_token: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(view.enabled);
    assert!(view.has_api_token);
}

#[tokio::test]
async fn host_filtered_group_does_not_match_other_hosts() {
    let (_dir, store, orchestrator, messenger) = setup(true, Some("https://zbx.example.com")).await;
    let mut group = open_group("db-only");
    group.host_patterns = vec!["^db-".to_string()];
    store.insert_group(&group).await.unwrap();

    orchestrator
        .ingest_problems(vec![disaster_problem("3001", "web-09")])
        .await
        .unwrap();
    assert!(messenger.sent().is_empty());

    orchestrator
        .ingest_problems(vec![disaster_problem("3002", "db-02")])
        .await
        .unwrap();
    assert_eq!(messenger.sent().len(), 1);
}
