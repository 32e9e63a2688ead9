use chrono::{TimeZone, Utc};
use zrelay_common::types::{AlertStatus, Severity};

use crate::client::{looks_like_api_token, normalize_endpoint};
use crate::error::ZabbixError;
use crate::transform::to_alert;
use crate::types::{RawAcknowledge, RawHost, RawProblem, RawTrigger};

fn problem(eventid: &str, value: &str, severity: &str, clock: &str) -> RawProblem {
    RawProblem {
        eventid: eventid.to_string(),
        objectid: "17001".to_string(),
        name: "Free disk space is low".to_string(),
        severity: severity.to_string(),
        clock: clock.to_string(),
        value: value.to_string(),
        ..Default::default()
    }
}

fn trigger() -> RawTrigger {
    RawTrigger {
        triggerid: "17001".to_string(),
        description: "Free disk space below 10% on /data".to_string(),
        expression: "{db-01:vfs.fs.size[/data,pfree].last()}<10".to_string(),
        comments: "Grow the volume or clear old backups".to_string(),
        priority: "4".to_string(),
        hosts: vec![host()],
        ..Default::default()
    }
}

fn host() -> RawHost {
    RawHost {
        hostid: "10084".to_string(),
        host: "db-01.internal".to_string(),
        name: "db-01".to_string(),
        ..Default::default()
    }
}

// ── endpoint & token classification ──

#[test]
fn endpoint_normalization() {
    assert_eq!(
        normalize_endpoint("https://zbx.example.com"),
        "https://zbx.example.com/api_jsonrpc.php"
    );
    assert_eq!(
        normalize_endpoint("https://zbx.example.com///"),
        "https://zbx.example.com/api_jsonrpc.php"
    );
    assert_eq!(
        normalize_endpoint("https://zbx.example.com/api_jsonrpc.php"),
        "https://zbx.example.com/api_jsonrpc.php"
    );
}

#[test]
fn api_token_heuristic() {
    // Long and whitespace-free: usable directly
    assert!(looks_like_api_token(
        "0123456789abcdef0123456789abcdef0123456789abcdef"
    ));
    // Too short
    assert!(!looks_like_api_token("short-token"));
    // Contains whitespace
    assert!(!looks_like_api_token(
        "0123456789abcdef 0123456789abcdef 0123456789abcdef"
    ));
}

// ── error classification ──

#[test]
fn auth_errors_are_detected_from_payload() {
    let err = ZabbixError::Api {
        code: -32602,
        message: "Invalid params.".to_string(),
        data: "Session terminated, re-login, please.".to_string(),
    };
    assert!(err.is_auth());
    assert!(!err.is_connectivity());

    let err = ZabbixError::Api {
        code: -32500,
        message: "Application error.".to_string(),
        data: "Not authorised.".to_string(),
    };
    assert!(err.is_auth());

    let err = ZabbixError::Api {
        code: -32602,
        message: "Invalid params.".to_string(),
        data: "Incorrect value for field".to_string(),
    };
    assert!(!err.is_auth());
}

// ── transformer ──

#[test]
fn transform_basic_problem() {
    let p = problem("1001", "1", "4", "1700000000");
    let t = trigger();
    let h = host();
    let alert = to_alert(&p, Some(&t), Some(&h));

    assert_eq!(alert.alert_id, "1001");
    assert_eq!(alert.trigger_id, "17001");
    assert_eq!(alert.host, "db-01");
    assert_eq!(alert.host_id, "10084");
    assert_eq!(alert.severity, Severity::Disaster);
    assert_eq!(alert.status, AlertStatus::Problem);
    assert!(!alert.resolved);
    assert!(alert.resolved_at.is_none());
    assert_eq!(alert.event_time, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    assert_eq!(alert.trigger_name, "Free disk space below 10% on /data");
    assert_eq!(
        alert.trigger_description.as_deref(),
        Some("Grow the volume or clear old backups")
    );
    // Raw payload retained for diagnostics
    assert_eq!(alert.raw["eventid"], "1001");
}

#[test]
fn transform_ok_value_means_resolved() {
    let p = problem("1002", "0", "3", "1700000000");
    let alert = to_alert(&p, None, None);
    assert_eq!(alert.status, AlertStatus::Ok);
    assert!(alert.resolved);
    assert_eq!(alert.resolved_at, Some(alert.event_time));
}

#[test]
fn transform_event_time_fallbacks() {
    // No clock, but the event id parses as a plausible epoch
    let p = problem("1700000123", "1", "3", "");
    let alert = to_alert(&p, None, None);
    assert_eq!(alert.event_time, Utc.timestamp_opt(1_700_000_123, 0).unwrap());

    // Neither clock nor an epoch-shaped id: falls back to now
    let before = Utc::now();
    let p = problem("42", "1", "3", "not-a-number");
    let alert = to_alert(&p, None, None);
    assert!(alert.event_time >= before);
}

#[test]
fn transform_synthesizes_deterministic_alert_id() {
    let mut p = problem("", "1", "3", "1700000000");
    p.objectid = "17001".to_string();
    let a = to_alert(&p, None, None);
    let b = to_alert(&p, None, None);
    assert_eq!(a.alert_id, "17001-1700000000");
    // Re-polling the same open problem reuses the identity
    assert_eq!(a.alert_id, b.alert_id);
}

#[test]
fn transform_host_fallback_chain() {
    // Explicit host object wins
    let p = problem("1", "1", "3", "1700000000");
    let alert = to_alert(&p, Some(&trigger()), Some(&host()));
    assert_eq!(alert.host, "db-01");

    // Next: trigger's first host
    let alert = to_alert(&p, Some(&trigger()), None);
    assert_eq!(alert.host, "db-01");

    // Next: hosts embedded in the problem itself
    let mut p2 = problem("2", "1", "3", "1700000000");
    p2.hosts = vec![RawHost {
        hostid: "10099".to_string(),
        host: "web-07".to_string(),
        name: String::new(),
        ..Default::default()
    }];
    let alert = to_alert(&p2, None, None);
    assert_eq!(alert.host, "web-07");
    assert_eq!(alert.host_id, "10099");

    // Nothing at all
    let alert = to_alert(&p, None, None);
    assert_eq!(alert.host, "Unknown");
    assert_eq!(alert.host_id, "unknown");
}

#[test]
fn transform_takes_last_acknowledgment_entry() {
    let mut p = problem("1001", "1", "4", "1700000000");
    p.acknowledged = "1".to_string();
    p.acknowledges = vec![
        RawAcknowledge {
            clock: "1700000100".to_string(),
            alias: "first.responder".to_string(),
            ..Default::default()
        },
        RawAcknowledge {
            clock: "1700000200".to_string(),
            alias: String::new(),
            name: "Dana".to_string(),
            surname: "Ops".to_string(),
            ..Default::default()
        },
    ];
    let alert = to_alert(&p, None, None);
    assert!(alert.acknowledged);
    assert_eq!(alert.acknowledged_by.as_deref(), Some("Dana Ops"));
    assert_eq!(
        alert.acknowledged_at,
        Some(Utc.timestamp_opt(1_700_000_200, 0).unwrap())
    );
}

#[test]
fn transform_acknowledged_always_has_timestamp() {
    let mut p = problem("1001", "1", "4", "1700000000");
    p.acknowledged = "1".to_string();
    // Flag set but the acknowledges list is empty
    let alert = to_alert(&p, None, None);
    assert!(alert.acknowledged);
    assert!(alert.acknowledged_at.is_some());
}

#[test]
fn transform_message_preference() {
    // Problem name wins
    let p = problem("1", "1", "3", "1700000000");
    assert_eq!(to_alert(&p, None, None).message, "Free disk space is low");

    // Then operational data
    let mut p2 = problem("2", "1", "3", "1700000000");
    p2.name = String::new();
    p2.opdata = "used: 92%".to_string();
    assert_eq!(to_alert(&p2, None, None).message, "used: 92%");

    // Then the trigger name
    let mut p3 = problem("3", "1", "3", "1700000000");
    p3.name = String::new();
    assert_eq!(
        to_alert(&p3, Some(&trigger()), None).message,
        "Free disk space below 10% on /data"
    );
}

#[test]
fn transform_unknown_severity_clamps() {
    let p = problem("1", "1", "not-a-code", "1700000000");
    assert_eq!(to_alert(&p, None, None).severity, Severity::NotClassified);
}

#[test]
fn raw_payload_round_trips_unknown_fields() {
    let json = serde_json::json!({
        "eventid": "1001",
        "objectid": "17001",
        "name": "x",
        "severity": "4",
        "clock": "1700000000",
        "value": "1",
        "suppressed": "0",
        "correlationid": "0",
    });
    let p: RawProblem = serde_json::from_value(json).unwrap();
    assert_eq!(p.extra["suppressed"], "0");

    let alert = to_alert(&p, None, None);
    // Unknown upstream fields survive into the stored raw payload
    assert_eq!(alert.raw["correlationid"], "0");
}
