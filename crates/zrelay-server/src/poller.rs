use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use zrelay_common::types::{Alert, NotificationGroup, Severity};
use zrelay_notify::dispatcher::NotificationDispatcher;
use zrelay_storage::{ConfigDefaults, MonitoringConfigRow, Store};
use zrelay_zabbix::client::{ClientSettings, ZabbixClient};
use zrelay_zabbix::transform;
use zrelay_zabbix::types::ProblemDetail;

/// Result of one poll cycle.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Set when the cycle was skipped before doing any work.
    pub skipped: Option<String>,
    pub alerts_fetched: usize,
    /// Actionable alerts that went through the transformer and store.
    pub alerts_processed: usize,
    pub new_alerts: usize,
    pub notifications_sent: usize,
    pub resolved: usize,
    pub errors: Vec<String>,
}

impl PollOutcome {
    fn skipped(reason: &str) -> Self {
        Self {
            skipped: Some(reason.to_string()),
            ..Default::default()
        }
    }
}

/// Ties the client, transformer, store, matcher, and dispatcher into
/// one poll cycle: fetch, filter, transform, persist, match, notify,
/// reconcile, record.
///
/// Constructed once per process and shared; a single-flight guard
/// ensures a new cycle never starts while a prior one is still running,
/// even when the timer interval is shorter than a slow poll.
pub struct PollOrchestrator {
    store: Arc<Store>,
    dispatcher: Arc<NotificationDispatcher>,
    client: Mutex<ZabbixClient>,
    cycle_guard: Mutex<()>,
    defaults: ConfigDefaults,
    fetch_limit: u64,
}

impl PollOrchestrator {
    pub fn new(
        store: Arc<Store>,
        dispatcher: Arc<NotificationDispatcher>,
        defaults: ConfigDefaults,
        fetch_limit: u64,
    ) -> Self {
        Self {
            store,
            dispatcher,
            client: Mutex::new(ZabbixClient::new()),
            cycle_guard: Mutex::new(()),
            defaults,
            fetch_limit,
        }
    }

    /// Runs one poll cycle, shared by the timer and the manual admin
    /// trigger. Overlapping invocations are skipped, not queued.
    pub async fn poll_now(&self) -> Result<PollOutcome> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            tracing::warn!("Poll cycle already running, skipping overlapping trigger");
            return Ok(PollOutcome::skipped("a poll cycle is already running"));
        };

        let config = self
            .store
            .get_or_init_monitoring_config(&self.defaults)
            .await?;
        if !config.enabled {
            tracing::debug!("Monitoring integration disabled, skipping cycle");
            return Ok(PollOutcome::skipped("integration disabled"));
        }
        if config
            .api_url
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
        {
            self.store
                .record_poll_error("no monitoring endpoint configured")
                .await?;
            return Ok(PollOutcome::skipped("no monitoring endpoint configured"));
        }

        match self.run_cycle(&config).await {
            Ok(outcome) => {
                self.store
                    .record_poll_success(outcome.alerts_processed as u64)
                    .await?;
                tracing::info!(
                    fetched = outcome.alerts_fetched,
                    processed = outcome.alerts_processed,
                    new = outcome.new_alerts,
                    notified = outcome.notifications_sent,
                    resolved = outcome.resolved,
                    "Poll cycle completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(record_err) = self.store.record_poll_error(&e.to_string()).await {
                    tracing::error!(error = %record_err, "Failed to record poll error");
                }
                tracing::error!(error = %e, "Poll cycle failed");
                Err(e)
            }
        }
    }

    fn client_settings(&self, config: &MonitoringConfigRow) -> ClientSettings {
        ClientSettings {
            url: config.api_url.clone().unwrap_or_default(),
            api_token: self.store.decrypted_api_token(config),
            username: config.username.clone(),
            password: self.store.decrypted_password(config),
        }
    }

    async fn run_cycle(&self, config: &MonitoringConfigRow) -> Result<PollOutcome> {
        let settings = self.client_settings(config);

        let mut client = self.client.lock().await;
        client
            .initialize(&settings)
            .await
            .map_err(|e| anyhow::anyhow!("client initialization failed: {e}"))?;

        let details = client
            .fetch_problems_with_details(&Severity::ACTIONABLE, self.fetch_limit)
            .await?;

        let mut outcome = self.ingest_problems(details).await?;

        // Reconciliation failures never block alert ingestion from
        // counting as a successful poll.
        match client
            .fetch_active_event_ids(&Severity::ACTIONABLE, self.fetch_limit)
            .await
        {
            Ok(active_ids) => match self.reconcile_with_ids(&active_ids).await {
                Ok(resolved) => outcome.resolved = resolved,
                Err(e) => {
                    tracing::error!(error = %e, "Reconciliation failed");
                    outcome.errors.push(format!("reconciliation: {e}"));
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Reconciliation fetch failed");
                outcome.errors.push(format!("reconciliation fetch: {e}"));
            }
        }

        Ok(outcome)
    }

    /// Transforms, persists, matches, and notifies one batch of fetched
    /// problems. Only fresh inserts that are still unresolved are
    /// candidates for first-time notification.
    pub async fn ingest_problems(&self, details: Vec<ProblemDetail>) -> Result<PollOutcome> {
        let mut outcome = PollOutcome {
            alerts_fetched: details.len(),
            ..Default::default()
        };

        // Defensive re-filter even though the fetch already asked for
        // actionable severities only.
        let alerts: Vec<Alert> = details
            .iter()
            .map(|d| transform::to_alert(&d.problem, d.trigger.as_ref(), d.host.as_ref()))
            .filter(|a| a.severity.is_actionable())
            .collect();
        outcome.alerts_processed = alerts.len();

        let batch = self.store.save_alerts(&alerts).await;
        outcome.new_alerts = batch.new_ids.len();
        outcome.errors.extend(batch.errors);

        // Config can change concurrently; re-check before notifying
        let config = self
            .store
            .get_or_init_monitoring_config(&self.defaults)
            .await?;
        if !config.enabled {
            tracing::info!("Integration disabled mid-cycle, skipping notifications");
            return Ok(outcome);
        }

        for alert_id in &batch.new_ids {
            let Some(alert) = self.store.get_alert(alert_id).await? else {
                continue;
            };
            if alert.resolved {
                continue;
            }

            // Reloaded per alert so rate-limit stamps from earlier
            // alerts in this cycle are visible.
            let groups = self.store.list_enabled_groups().await?;
            let now = Utc::now();
            let matched = zrelay_notify::matcher::find_eligible_groups(&alert, &groups, now);
            for group in matched.matched() {
                if let Err(e) = self.store.record_group_match(&group.id).await {
                    tracing::warn!(group = %group.name, error = %e, "Failed to record group match");
                }
            }
            if matched.eligible.is_empty() {
                continue;
            }

            let report = self.dispatcher.notify(&alert, &matched.eligible).await;
            outcome.notifications_sent += report.sent;
            outcome.errors.extend(report.errors);
            for group_id in &report.notified_group_ids {
                if let Err(e) = self.store.record_group_notification(group_id, now).await {
                    tracing::warn!(group_id = %group_id, error = %e, "Failed to record group notification");
                }
            }
            if !report.notified_group_ids.is_empty() {
                self.store
                    .mark_notification_sent(&alert.alert_id, &report.notified_group_ids)
                    .await?;
            }
        }

        Ok(outcome)
    }

    /// Marks alerts missing from the active set as resolved and sends
    /// resolution notices to previously notified groups that opted in.
    /// Returns how many alerts were newly resolved.
    pub async fn reconcile_with_ids(&self, active_ids: &HashSet<String>) -> Result<usize> {
        let resolved = self.store.reconcile_resolved(active_ids).await?;
        let count = resolved.len();

        for alert in resolved {
            if !alert.notification_sent || alert.notified_group_ids.is_empty() {
                continue;
            }
            let mut recipients = Vec::new();
            for group_id in &alert.notified_group_ids {
                match self.store.get_group(group_id).await {
                    Ok(Some(group)) if group.enabled && group.notify_on_resolve => {
                        recipients.push(group)
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(group_id = %group_id, error = %e, "Failed to load group for resolve notice");
                    }
                }
            }
            if recipients.is_empty() {
                continue;
            }

            let refs: Vec<&NotificationGroup> = recipients.iter().collect();
            let report = self.dispatcher.notify(&alert, &refs).await;
            for error in &report.errors {
                tracing::warn!(alert_id = %alert.alert_id, error = %error, "Resolve notice failed");
            }
            let now = Utc::now();
            for group_id in &report.notified_group_ids {
                if let Err(e) = self.store.record_group_notification(group_id, now).await {
                    tracing::warn!(group_id = %group_id, error = %e, "Failed to record group notification");
                }
            }
        }

        Ok(count)
    }

    /// Acknowledges an alert upstream and mirrors the flag locally.
    pub async fn acknowledge(
        &self,
        alert_id: &str,
        operator: &str,
        message: &str,
    ) -> Result<()> {
        let alert = self
            .store
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no alert with id '{alert_id}'"))?;
        let config = self
            .store
            .get_or_init_monitoring_config(&self.defaults)
            .await?;

        let mut client = self.client.lock().await;
        if !client.is_initialized() {
            let settings = self.client_settings(&config);
            client
                .initialize(&settings)
                .await
                .map_err(|e| anyhow::anyhow!("client initialization failed: {e}"))?;
        }
        client
            .acknowledge_event(&[alert.alert_id.clone()], message)
            .await
            .map_err(|e| anyhow::anyhow!("acknowledge failed: {e}"))?;

        self.store
            .set_alert_acknowledged(&alert.alert_id, operator, Utc::now())
            .await?;
        Ok(())
    }

    /// Builds a throwaway client and round-trips initialize + version
    /// against the currently stored credentials.
    pub async fn test_connection(&self) -> Result<String, zrelay_zabbix::ZabbixError> {
        let config = self
            .store
            .get_or_init_monitoring_config(&self.defaults)
            .await
            .map_err(|e| zrelay_zabbix::ZabbixError::Protocol(e.to_string()))?;
        let settings = self.client_settings(&config);
        let mut client = ZabbixClient::new();
        client.initialize(&settings).await?;
        client.api_version().await
    }
}
