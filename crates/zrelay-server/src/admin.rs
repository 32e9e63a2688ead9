use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zrelay_common::types::NotificationGroup;
use zrelay_storage::{ConfigDefaults, MonitoringConfigRow, MonitoringConfigUpdate, Store};
use zrelay_zabbix::client::looks_like_api_token;
use zrelay_zabbix::ZabbixError;

use crate::poller::{PollOrchestrator, PollOutcome};

/// Admin surface errors, split so an external HTTP layer can map them
/// to client-error vs server-error status classes. Credential material
/// never appears in these messages.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Config as shown to operators: secrets redacted to presence flags.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub api_url: Option<String>,
    pub has_api_token: bool,
    pub username: Option<String>,
    pub has_password: bool,
    pub enabled: bool,
    pub poll_interval_minutes: i32,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub total_polls: i64,
    pub successful_polls: i64,
    pub failed_polls: i64,
    pub alerts_processed: i64,
}

impl From<MonitoringConfigRow> for ConfigView {
    fn from(row: MonitoringConfigRow) -> Self {
        Self {
            api_url: row.api_url.clone(),
            has_api_token: row.has_api_token(),
            username: row.username.clone(),
            has_password: row.has_password(),
            enabled: row.enabled,
            poll_interval_minutes: row.poll_interval_minutes,
            last_poll_at: row.last_poll_at,
            last_error: row.last_error,
            last_error_at: row.last_error_at,
            total_polls: row.total_polls,
            successful_polls: row.successful_polls,
            failed_polls: row.failed_polls,
            alerts_processed: row.alerts_processed,
        }
    }
}

/// Config update as accepted from the admin UI. Secrets arrive as
/// plaintext, are encrypted at rest immediately, and are never echoed
/// back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdateRequest {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub enabled: Option<bool>,
    pub poll_interval_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestConnectionReport {
    pub version: String,
}

/// Typed admin operations consumed by an external admin UI; the HTTP
/// layer itself lives outside this crate.
pub struct AdminApi {
    store: Arc<Store>,
    orchestrator: Arc<PollOrchestrator>,
    defaults: ConfigDefaults,
}

impl AdminApi {
    pub fn new(
        store: Arc<Store>,
        orchestrator: Arc<PollOrchestrator>,
        defaults: ConfigDefaults,
    ) -> Self {
        Self {
            store,
            orchestrator,
            defaults,
        }
    }

    pub async fn get_config(&self) -> Result<ConfigView, AdminError> {
        let row = self
            .store
            .get_or_init_monitoring_config(&self.defaults)
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))?;
        Ok(row.into())
    }

    pub async fn update_config(
        &self,
        request: ConfigUpdateRequest,
    ) -> Result<ConfigView, AdminError> {
        if let Some(minutes) = request.poll_interval_minutes {
            if !(1..=60).contains(&minutes) {
                return Err(AdminError::BadRequest(
                    "poll interval must be between 1 and 60 minutes".to_string(),
                ));
            }
        }
        if let Some(url) = request.api_url.as_deref() {
            if zrelay_zabbix::client::validate_endpoint(url).is_err() {
                return Err(AdminError::BadRequest(format!(
                    "'{url}' is not a valid endpoint URL"
                )));
            }
        }

        // Invariant: an enabled config needs a bearer-shaped token or a
        // username/password pair. Compute the post-update state first.
        let current = self
            .store
            .get_or_init_monitoring_config(&self.defaults)
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))?;
        let enabled = request.enabled.unwrap_or(current.enabled);
        if enabled {
            let has_token = request
                .api_token
                .as_deref()
                .map(looks_like_api_token)
                .unwrap_or(current.has_api_token());
            let has_login = request
                .username
                .as_deref()
                .or(current.username.as_deref())
                .is_some_and(|u| !u.is_empty())
                && (request.password.is_some() || current.has_password());
            if !has_token && !has_login {
                return Err(AdminError::BadRequest(
                    "an API token or a username/password pair is required while enabled"
                        .to_string(),
                ));
            }
        }

        let row = self
            .store
            .update_monitoring_config(
                &self.defaults,
                MonitoringConfigUpdate {
                    api_url: request.api_url,
                    api_token: request.api_token,
                    username: request.username,
                    password: request.password,
                    enabled: request.enabled,
                    poll_interval_minutes: request.poll_interval_minutes,
                },
            )
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))?;
        Ok(row.into())
    }

    /// Validates URL and credentials with a real round-trip against the
    /// monitoring endpoint.
    pub async fn test_connection(&self) -> Result<TestConnectionReport, AdminError> {
        match self.orchestrator.test_connection().await {
            Ok(version) => Ok(TestConnectionReport { version }),
            Err(e @ (ZabbixError::InvalidUrl(_) | ZabbixError::MissingCredentials)) => {
                Err(AdminError::BadRequest(e.to_string()))
            }
            Err(e) => Err(AdminError::Unavailable(e.to_string())),
        }
    }

    /// Manual out-of-band poll trigger; shares the orchestrator's
    /// single-flight guard with the scheduled path.
    pub async fn poll_now(&self) -> Result<PollOutcome, AdminError> {
        self.orchestrator
            .poll_now()
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))
    }

    /// Acknowledges an alert upstream with an operator message and
    /// mirrors the acknowledgment locally.
    pub async fn acknowledge_alert(
        &self,
        alert_id: &str,
        operator: &str,
        message: &str,
    ) -> Result<(), AdminError> {
        let exists = self
            .store
            .get_alert(alert_id)
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))?
            .is_some();
        if !exists {
            return Err(AdminError::BadRequest(format!(
                "no alert with id '{alert_id}'"
            )));
        }
        self.orchestrator
            .acknowledge(alert_id, operator, message)
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))
    }

    // ── notification group management ──

    pub async fn create_group(
        &self,
        group: NotificationGroup,
    ) -> Result<NotificationGroup, AdminError> {
        if group.name.trim().is_empty() {
            return Err(AdminError::BadRequest("group name is required".to_string()));
        }
        self.store
            .insert_group(&group)
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))
    }

    pub async fn update_group(
        &self,
        group: NotificationGroup,
    ) -> Result<NotificationGroup, AdminError> {
        if group.name.trim().is_empty() {
            return Err(AdminError::BadRequest("group name is required".to_string()));
        }
        self.store
            .update_group(&group)
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))?
            .ok_or_else(|| AdminError::BadRequest(format!("no group with id '{}'", group.id)))
    }

    pub async fn delete_group(&self, id: &str) -> Result<(), AdminError> {
        let deleted = self
            .store
            .delete_group(id)
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))?;
        if deleted {
            Ok(())
        } else {
            Err(AdminError::BadRequest(format!("no group with id '{id}'")))
        }
    }

    pub async fn list_groups(&self) -> Result<Vec<NotificationGroup>, AdminError> {
        self.store
            .list_groups()
            .await
            .map_err(|e| AdminError::Unavailable(e.to_string()))
    }
}
