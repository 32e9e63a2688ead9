use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use zrelay_common::types::{Alert, AlertStatus, Severity};

use crate::types::{RawAcknowledge, RawHost, RawProblem, RawTrigger};

// Epoch-second range accepted as a plausible timestamp embedded in an
// event id (2001-09..2033-05).
const EPOCH_MIN: i64 = 1_000_000_000;
const EPOCH_MAX: i64 = 2_000_000_000;

fn parse_epoch(value: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = value.parse().ok()?;
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

fn embedded_event_time(eventid: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = eventid.parse().ok()?;
    if !(EPOCH_MIN..EPOCH_MAX).contains(&secs) {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

fn ack_author(ack: &RawAcknowledge) -> String {
    if !ack.alias.is_empty() {
        return ack.alias.clone();
    }
    let full = format!("{} {}", ack.name, ack.surname);
    let full = full.trim().to_string();
    if full.is_empty() {
        "unknown".to_string()
    } else {
        full
    }
}

fn resolve_host(
    problem: &RawProblem,
    trigger: Option<&RawTrigger>,
    host: Option<&RawHost>,
) -> (String, String) {
    let pick = |h: &RawHost| {
        let name = if !h.name.is_empty() {
            h.name.clone()
        } else {
            h.host.clone()
        };
        (name, h.hostid.clone())
    };

    if let Some(h) = host {
        return pick(h);
    }
    if let Some(h) = trigger.and_then(|t| t.hosts.first()) {
        return pick(h);
    }
    if let Some(h) = problem.hosts.first() {
        return pick(h);
    }
    ("Unknown".to_string(), "unknown".to_string())
}

/// Maps one raw problem (with optional trigger/host detail) into the
/// internal alert shape. Pure: every derivation has an explicit
/// fallback and nothing here can fail.
pub fn to_alert(
    problem: &RawProblem,
    trigger: Option<&RawTrigger>,
    host: Option<&RawHost>,
) -> Alert {
    let now = Utc::now();

    let event_time = parse_epoch(&problem.clock)
        .or_else(|| embedded_event_time(&problem.eventid))
        .unwrap_or(now);

    let status = if problem.value == "1" {
        AlertStatus::Problem
    } else {
        AlertStatus::Ok
    };

    let (host_name, host_id) = resolve_host(problem, trigger, host);

    let trigger_id = trigger
        .map(|t| t.triggerid.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| problem.objectid.clone());
    let trigger_name = trigger
        .map(|t| t.description.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| problem.name.clone());
    let trigger_description = trigger.and_then(|t| {
        if !t.comments.is_empty() {
            Some(t.comments.clone())
        } else if !t.expression.is_empty() {
            Some(t.expression.clone())
        } else {
            None
        }
    });

    // Re-polling the same still-open problem must map to the same
    // identity, so the synthesized fallback is deterministic.
    let alert_id = if problem.eventid.is_empty() {
        format!("{}-{}", trigger_id, event_time.timestamp())
    } else {
        problem.eventid.clone()
    };

    let acknowledged = problem.acknowledged == "1";
    let (acknowledged_by, acknowledged_at) = if acknowledged {
        match problem.acknowledges.last() {
            Some(ack) => (Some(ack_author(ack)), parse_epoch(&ack.clock).or(Some(now))),
            None => (None, Some(now)),
        }
    } else {
        (None, None)
    };

    let resolved = status == AlertStatus::Ok;
    let resolved_at = resolved.then_some(event_time);

    let message = if !problem.name.is_empty() {
        problem.name.clone()
    } else if !problem.opdata.is_empty() {
        problem.opdata.clone()
    } else {
        trigger_name.clone()
    };

    let severity = problem
        .severity
        .parse::<u8>()
        .map(Severity::from_code)
        .unwrap_or(Severity::NotClassified);

    Alert {
        id: zrelay_common::id::next_id(),
        alert_id,
        trigger_id,
        host_id,
        host: host_name,
        trigger_name,
        trigger_description,
        severity,
        status,
        message,
        event_time,
        update_time: now,
        acknowledged,
        acknowledged_by,
        acknowledged_at,
        resolved,
        resolved_at,
        raw: serde_json::to_value(problem).unwrap_or(Value::Null),
        notification_sent: false,
        notification_sent_at: None,
        notified_group_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}
