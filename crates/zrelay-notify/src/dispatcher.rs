use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use zrelay_common::types::{Alert, NotificationGroup};

use crate::error::NotifyError;
use crate::format::{self, MessageVariants};
use crate::{FormatMode, Messenger, SubscriberDirectory};

/// Formatting ladder, richest first. Only markup-parse-class failures
/// advance to the next tier.
pub const FALLBACK_LADDER: [FormatMode; 3] =
    [FormatMode::MarkdownV2, FormatMode::Html, FormatMode::Plain];

/// One successful delivery, including which tier finally worked.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub group_id: String,
    pub destination: String,
    pub mode: FormatMode,
    pub message_id: i64,
}

/// Aggregate result of dispatching one alert to a set of groups.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    /// Groups with at least one successful delivery.
    pub notified_group_ids: Vec<String>,
    pub errors: Vec<String>,
    pub deliveries: Vec<Delivery>,
}

/// Builds a messenger for a group-specific credential.
pub type MessengerFactory = Box<dyn Fn(&str) -> Arc<dyn Messenger> + Send + Sync>;

/// Sends `variants` through the formatting ladder until a tier lands.
pub async fn send_with_fallback(
    messenger: &dyn Messenger,
    destination: &str,
    variants: &MessageVariants,
) -> Result<(FormatMode, i64), NotifyError> {
    let mut last_err: Option<NotifyError> = None;
    for mode in FALLBACK_LADDER {
        match messenger
            .send_message(destination, variants.for_mode(mode), mode)
            .await
        {
            Ok(sent) => {
                if mode != FormatMode::MarkdownV2 {
                    tracing::info!(destination, mode = %mode, "Delivered after format fallback");
                }
                return Ok((mode, sent.message_id));
            }
            Err(e) if e.is_markup_parse() => {
                tracing::warn!(destination, mode = %mode, error = %e, "Markup rejected, degrading format");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(NotifyError::FormattingExhausted(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

/// Delivers formatted alerts to matched groups: a shared chat when the
/// group has one, otherwise each member with a registered personal
/// handle.
pub struct NotificationDispatcher {
    default_messenger: Option<Arc<dyn Messenger>>,
    messenger_factory: MessengerFactory,
    directory: Arc<dyn SubscriberDirectory>,
    timezone: FixedOffset,
}

impl NotificationDispatcher {
    pub fn new(
        default_messenger: Option<Arc<dyn Messenger>>,
        messenger_factory: MessengerFactory,
        directory: Arc<dyn SubscriberDirectory>,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            default_messenger,
            messenger_factory,
            directory,
            timezone,
        }
    }

    fn messenger_for(&self, group: &NotificationGroup) -> Option<Arc<dyn Messenger>> {
        match group.bot_token.as_deref() {
            Some(token) if !token.is_empty() => Some((self.messenger_factory)(token)),
            _ => self.default_messenger.clone(),
        }
    }

    /// Dispatches one alert to the given groups.
    ///
    /// Never panics: with no usable messenger at all the report carries
    /// a descriptive error and zero sends. One group's failure does not
    /// block the others.
    pub async fn notify(&self, alert: &Alert, groups: &[&NotificationGroup]) -> DispatchReport {
        let mut report = DispatchReport {
            total: groups.len(),
            ..Default::default()
        };
        if groups.is_empty() {
            return report;
        }

        if self.default_messenger.is_none()
            && !groups.iter().any(|g| g.bot_token.as_deref().is_some_and(|t| !t.is_empty()))
        {
            report.failed = groups.len();
            report
                .errors
                .push("no messaging client is configured".to_string());
            tracing::error!(alert_id = %alert.alert_id, "Cannot notify: no messaging client is configured");
            return report;
        }

        let variants = format::render(alert, self.timezone);
        let now = Utc::now();

        for group in groups {
            // Belt-and-suspenders with the matcher
            if !group.can_send_notification(now) {
                tracing::debug!(group = %group.name, "Rate limit hit at dispatch time, skipping");
                continue;
            }
            match self.notify_group(group, &variants).await {
                Ok(deliveries) => {
                    report.sent += 1;
                    report.notified_group_ids.push(group.id.clone());
                    report.deliveries.extend(deliveries);
                }
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {e}", group.name));
                    tracing::error!(group = %group.name, alert_id = %alert.alert_id, error = %e, "Group notification failed");
                }
            }
        }
        report
    }

    async fn notify_group(
        &self,
        group: &NotificationGroup,
        variants: &MessageVariants,
    ) -> Result<Vec<Delivery>, NotifyError> {
        let Some(messenger) = self.messenger_for(group) else {
            return Err(NotifyError::MessengerUnavailable);
        };

        // Shared chat destination wins over individual members
        if let Some(chat_id) = group.chat_id.as_deref().filter(|c| !c.is_empty()) {
            let (mode, message_id) =
                send_with_fallback(messenger.as_ref(), chat_id, variants).await?;
            return Ok(vec![Delivery {
                group_id: group.id.clone(),
                destination: chat_id.to_string(),
                mode,
                message_id,
            }]);
        }

        let mut handles = Vec::new();
        for member in &group.member_ids {
            match self.directory.chat_handle(member).await {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {
                    tracing::debug!(member = %member, group = %group.name, "Member has no registered chat handle");
                }
                Err(e) => {
                    tracing::warn!(member = %member, group = %group.name, error = %e, "Subscriber lookup failed");
                }
            }
        }
        if handles.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let mut deliveries = Vec::new();
        let mut errors = Vec::new();
        for handle in handles {
            // One recipient's failure must not block the rest
            match send_with_fallback(messenger.as_ref(), &handle, variants).await {
                Ok((mode, message_id)) => deliveries.push(Delivery {
                    group_id: group.id.clone(),
                    destination: handle,
                    mode,
                    message_id,
                }),
                Err(e) => {
                    tracing::warn!(destination = %handle, error = %e, "Recipient delivery failed");
                    errors.push(format!("{handle}: {e}"));
                }
            }
        }
        if deliveries.is_empty() {
            return Err(NotifyError::Other(format!(
                "all recipients failed: {}",
                errors.join("; ")
            )));
        }
        Ok(deliveries)
    }
}
