use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use zrelay_common::types::{Alert, NotificationGroup};

/// Outcome of matching one alert against the group set. Rate-limited
/// groups matched the filters but may not be notified yet; they still
/// count toward match statistics.
#[derive(Debug, Default)]
pub struct GroupMatch<'a> {
    pub eligible: Vec<&'a NotificationGroup>,
    pub rate_limited: Vec<&'a NotificationGroup>,
}

impl<'a> GroupMatch<'a> {
    /// All groups whose filters passed, notified or not.
    pub fn matched(&self) -> impl Iterator<Item = &&'a NotificationGroup> {
        self.eligible.iter().chain(self.rate_limited.iter())
    }
}

/// Evaluates every enabled group against the alert in descending
/// priority order (priority orders the result for human review, it
/// never short-circuits evaluation).
pub fn find_eligible_groups<'a>(
    alert: &Alert,
    groups: &'a [NotificationGroup],
    now: DateTime<Utc>,
) -> GroupMatch<'a> {
    let mut ordered: Vec<&NotificationGroup> = groups.iter().filter(|g| g.enabled).collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

    let mut result = GroupMatch::default();
    for group in ordered {
        if !group_matches(group, alert) {
            continue;
        }
        if group.can_send_notification(now) {
            result.eligible.push(group);
        } else {
            // Skipped silently, not an error
            tracing::debug!(group = %group.name, alert_id = %alert.alert_id, "Group matched but is rate-limited");
            result.rate_limited.push(group);
        }
    }
    result
}

/// A group matches when all of its configured filters pass; an empty
/// filter list is open, not exclusionary.
pub fn group_matches(group: &NotificationGroup, alert: &Alert) -> bool {
    if !group.severities.is_empty() && !group.severities.contains(&alert.severity) {
        return false;
    }
    if !group.trigger_ids.is_empty() && !group.trigger_ids.iter().any(|id| id == &alert.trigger_id)
    {
        return false;
    }
    if !group.host_patterns.is_empty() && !host_matches(&group.host_patterns, &alert.host) {
        return false;
    }
    true
}

fn host_matches(patterns: &[String], host: &str) -> bool {
    patterns.iter().any(|pattern| {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re.is_match(host),
            // Not a valid regex: degrade to case-insensitive containment
            Err(_) => host.to_lowercase().contains(&pattern.to_lowercase()),
        }
    })
}
