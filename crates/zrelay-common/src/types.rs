use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity as reported by the monitoring system, ordered from
/// lowest to highest.
///
/// # Examples
///
/// ```
/// use zrelay_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.code(), 3);
/// assert!(Severity::Disaster > Severity::Warning);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(rename = "not_classified")]
    NotClassified,
    Info,
    Warning,
    High,
    Disaster,
}

impl Severity {
    /// Severities this pipeline acts on; everything else is dropped
    /// before persistence.
    pub const ACTIONABLE: [Severity; 2] = [Severity::High, Severity::Disaster];

    /// Numeric code used on the wire (0-4).
    pub fn code(self) -> u8 {
        match self {
            Severity::NotClassified => 0,
            Severity::Info => 1,
            Severity::Warning => 2,
            Severity::High => 3,
            Severity::Disaster => 4,
        }
    }

    /// Maps a wire code back to a severity. Unknown codes collapse to
    /// [`Severity::NotClassified`] instead of erroring.
    pub fn from_code(code: u8) -> Severity {
        match code {
            1 => Severity::Info,
            2 => Severity::Warning,
            3 => Severity::High,
            4 => Severity::Disaster,
            _ => Severity::NotClassified,
        }
    }

    pub fn is_actionable(self) -> bool {
        matches!(self, Severity::High | Severity::Disaster)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::NotClassified => "not_classified",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Disaster => "disaster",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_classified" | "notclassified" | "unclassified" => Ok(Severity::NotClassified),
            "info" | "information" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "high" => Ok(Severity::High),
            "disaster" => Ok(Severity::Disaster),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Whether the upstream problem is still firing or has returned to OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Ok,
    Problem,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Ok => write!(f, "OK"),
            AlertStatus::Problem => write!(f, "PROBLEM"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OK" => Ok(AlertStatus::Ok),
            "PROBLEM" => Ok(AlertStatus::Problem),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// One relayed alert, keyed upstream by `alert_id`.
///
/// Created on first sighting of an external event id during a poll and
/// updated in place on every later sighting; resolution is detected by
/// the event id disappearing from the upstream active set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Internal row id.
    pub id: String,
    /// External event id; globally unique upstream identity.
    pub alert_id: String,
    pub trigger_id: String,
    pub host_id: String,
    pub host: String,
    pub trigger_name: String,
    pub trigger_description: Option<String>,
    pub severity: Severity,
    pub status: AlertStatus,
    pub message: String,
    pub event_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Source payload retained verbatim for diagnostics.
    pub raw: serde_json::Value,
    pub notification_sent: bool,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub notified_group_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An administrator-defined recipient set with match filters and rate
/// limiting. Empty filter lists match every alert on that dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Members resolved to personal chat handles when no shared chat is set.
    pub member_ids: Vec<String>,
    pub trigger_ids: Vec<String>,
    pub host_patterns: Vec<String>,
    pub severities: Vec<Severity>,
    pub enabled: bool,
    /// Ordering hint for evaluation and review; not exclusivity.
    pub priority: i32,
    /// Shared chat destination; members are ignored when present.
    pub chat_id: Option<String>,
    /// Group-specific messaging credential, decrypted on load.
    pub bot_token: Option<String>,
    pub notify_on_resolve: bool,
    pub notify_on_acknowledge: bool,
    pub min_notification_interval_minutes: i64,
    pub alerts_matched: i64,
    pub notifications_sent: i64,
    pub last_notification_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationGroup {
    /// Rate-limit gate: passes when no interval is configured, the group
    /// was never notified, or the interval has elapsed since the last
    /// notification.
    pub fn can_send_notification(&self, now: DateTime<Utc>) -> bool {
        if self.min_notification_interval_minutes <= 0 {
            return true;
        }
        match self.last_notification_at {
            None => true,
            Some(last) => now - last > Duration::minutes(self.min_notification_interval_minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_code_round_trip() {
        for sev in [
            Severity::NotClassified,
            Severity::Info,
            Severity::Warning,
            Severity::High,
            Severity::Disaster,
        ] {
            assert_eq!(Severity::from_code(sev.code()), sev);
        }
        // Unknown codes clamp instead of erroring
        assert_eq!(Severity::from_code(9), Severity::NotClassified);
    }

    #[test]
    fn only_high_and_disaster_are_actionable() {
        assert!(Severity::High.is_actionable());
        assert!(Severity::Disaster.is_actionable());
        assert!(!Severity::Warning.is_actionable());
        assert!(!Severity::Info.is_actionable());
        assert!(!Severity::NotClassified.is_actionable());
    }

    #[test]
    fn rate_limit_gate() {
        let now = Utc::now();
        let mut group = NotificationGroup {
            id: "g1".into(),
            name: "ops".into(),
            description: None,
            member_ids: vec![],
            trigger_ids: vec![],
            host_patterns: vec![],
            severities: vec![],
            enabled: true,
            priority: 0,
            chat_id: None,
            bot_token: None,
            notify_on_resolve: false,
            notify_on_acknowledge: false,
            min_notification_interval_minutes: 30,
            alerts_matched: 0,
            notifications_sent: 0,
            last_notification_at: Some(now - Duration::minutes(5)),
            created_at: now,
            updated_at: now,
        };
        assert!(!group.can_send_notification(now));

        group.last_notification_at = Some(now - Duration::minutes(31));
        assert!(group.can_send_notification(now));

        group.last_notification_at = None;
        assert!(group.can_send_notification(now));

        group.min_notification_interval_minutes = 0;
        group.last_notification_at = Some(now);
        assert!(group.can_send_notification(now));
    }
}
