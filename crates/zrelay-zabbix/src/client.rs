use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use zrelay_common::types::Severity;

use crate::error::ZabbixError;
use crate::types::{ProblemDetail, RawHost, RawProblem, RawTrigger, RpcResponse};

const RPC_PATH: &str = "api_jsonrpc.php";
const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Credentials and endpoint for one client initialization, already
/// decrypted by the caller.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub url: String,
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Strips trailing slashes and appends the JSON-RPC path when the
/// operator configured only the base URL.
pub fn normalize_endpoint(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with(RPC_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/{RPC_PATH}")
    }
}

/// Normalizes and validates an endpoint URL, returning the full
/// JSON-RPC endpoint.
pub fn validate_endpoint(url: &str) -> Result<String, ZabbixError> {
    let endpoint = normalize_endpoint(url);
    reqwest::Url::parse(&endpoint).map_err(|_| ZabbixError::InvalidUrl(url.to_string()))?;
    Ok(endpoint)
}

/// Heuristic for long-lived API tokens: long enough and free of
/// whitespace. Anything else is treated as unusable directly and forces
/// a session login.
pub fn looks_like_api_token(token: &str) -> bool {
    token.len() >= 40 && !token.chars().any(char::is_whitespace)
}

#[derive(serde::Deserialize)]
struct EventIdOnly {
    #[serde(default)]
    eventid: String,
}

/// Client for the Zabbix JSON-RPC API.
///
/// Holds either a bearer-style API token or a session token obtained
/// via `user.login`; the token travels in the request body `auth` field
/// for both kinds.
pub struct ZabbixClient {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
    bearer_token: bool,
    username: Option<String>,
    password: Option<String>,
    initialized: bool,
    next_request_id: AtomicU64,
}

impl Default for ZabbixClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ZabbixClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: String::new(),
            auth_token: None,
            bearer_token: false,
            username: None,
            password: None,
            initialized: false,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// (Re-)initializes the client from decrypted settings.
    ///
    /// Classifies the token, logs in when only username/password are
    /// usable, and probes the unauthenticated version endpoint so
    /// "service unreachable" and "credentials bad" stay distinguishable.
    /// A failed probe while holding an API token falls back to a session
    /// login (when credentials exist) and retries the probe once.
    pub async fn initialize(&mut self, settings: &ClientSettings) -> Result<(), ZabbixError> {
        self.endpoint = validate_endpoint(&settings.url)?;
        self.username = settings.username.clone().filter(|s| !s.is_empty());
        self.password = settings.password.clone().filter(|s| !s.is_empty());
        self.initialized = false;

        match settings.api_token.as_deref() {
            Some(token) if looks_like_api_token(token) => {
                self.auth_token = Some(token.to_string());
                self.bearer_token = true;
            }
            _ => {
                if self.username.is_none() || self.password.is_none() {
                    return Err(ZabbixError::MissingCredentials);
                }
                self.login().await?;
            }
        }

        if let Err(probe_err) = self.api_version().await {
            if self.bearer_token && self.username.is_some() && self.password.is_some() {
                tracing::warn!(
                    error = %probe_err,
                    "Connectivity probe failed while holding an API token, falling back to session login"
                );
                self.login().await?;
                self.api_version().await?;
            } else {
                return Err(probe_err);
            }
        }

        self.initialized = true;
        tracing::info!(
            endpoint = %self.endpoint,
            bearer = self.bearer_token,
            "Zabbix client initialized"
        );
        Ok(())
    }

    /// Unauthenticated connectivity probe.
    pub async fn api_version(&self) -> Result<String, ZabbixError> {
        let result = self.call_once("apiinfo.version", json!([]), false).await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    async fn login(&mut self) -> Result<(), ZabbixError> {
        let (Some(username), Some(password)) = (self.username.clone(), self.password.clone())
        else {
            return Err(ZabbixError::MissingCredentials);
        };
        let result = self
            .call_once(
                "user.login",
                json!({ "username": username, "password": password }),
                false,
            )
            .await?;
        let token = result
            .as_str()
            .ok_or_else(|| ZabbixError::Login("login returned a non-string session token".into()))?;
        self.auth_token = Some(token.to_string());
        self.bearer_token = false;
        tracing::info!(endpoint = %self.endpoint, "Obtained Zabbix session token");
        Ok(())
    }

    async fn call_once(
        &self,
        method: &str,
        params: Value,
        with_auth: bool,
    ) -> Result<Value, ZabbixError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let mut body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        if with_auth {
            if let Some(token) = &self.auth_token {
                // Zabbix carries auth in the body, not an HTTP header
                body["auth"] = Value::String(token.clone());
            }
        }

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&body)
            .send()
            .await?;
        let rpc: RpcResponse = response.json().await?;

        if let Some(err) = rpc.error {
            return Err(ZabbixError::Api {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        rpc.result.ok_or_else(|| {
            ZabbixError::Protocol(format!("{method} returned neither result nor error"))
        })
    }

    /// Issues an authenticated RPC call.
    ///
    /// Connection-class failures back off linearly (`attempt * 1000ms`)
    /// and retry up to `max_retries`; other errors consume retry slots
    /// without backoff classification. An authentication rejection
    /// triggers one inline re-login per call (when username/password are
    /// known) and replays the same attempt without consuming a slot.
    pub async fn request(
        &mut self,
        method: &str,
        params: Value,
        max_retries: u32,
    ) -> Result<Value, ZabbixError> {
        if !self.initialized {
            return Err(ZabbixError::NotInitialized);
        }

        let mut reauthenticated = false;
        let mut attempt: u32 = 1;
        loop {
            match self.call_once(method, params.clone(), true).await {
                Ok(result) => return Ok(result),
                Err(e)
                    if e.is_auth()
                        && !reauthenticated
                        && self.username.is_some()
                        && self.password.is_some() =>
                {
                    tracing::warn!(method, attempt, error = %e, "Token rejected, re-logging in");
                    self.login().await?;
                    reauthenticated = true;
                    // replay the same attempt, no retry slot consumed
                }
                Err(e) if attempt < max_retries => {
                    let class = if e.is_connectivity() { "connection" } else { "other" };
                    tracing::warn!(method, attempt, class, error = %e, "Request failed, backing off");
                    tokio::time::sleep(Duration::from_millis(attempt as u64 * 1000)).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(method, attempt, error = %e, "Request failed, retries exhausted");
                    return Err(e);
                }
            }
        }
    }

    /// Fetches active problems at the given severities together with
    /// their trigger and host detail, joined in memory.
    pub async fn fetch_problems_with_details(
        &mut self,
        severities: &[Severity],
        limit: u64,
    ) -> Result<Vec<ProblemDetail>, ZabbixError> {
        let severity_codes: Vec<u8> = severities.iter().map(|s| s.code()).collect();
        let problems_value = self
            .request(
                "problem.get",
                json!({
                    "output": "extend",
                    "severities": severity_codes,
                    "recent": false,
                    "selectAcknowledges": "extend",
                    "sortfield": ["eventid"],
                    "sortorder": "DESC",
                    "limit": limit,
                }),
                DEFAULT_MAX_RETRIES,
            )
            .await?;
        let problems: Vec<RawProblem> = serde_json::from_value(problems_value)?;

        let trigger_ids: BTreeSet<String> = problems
            .iter()
            .map(|p| p.objectid.clone())
            .filter(|id| !id.is_empty())
            .collect();
        let mut triggers: HashMap<String, RawTrigger> = HashMap::new();
        if !trigger_ids.is_empty() {
            let value = self
                .request(
                    "trigger.get",
                    json!({
                        "triggerids": trigger_ids,
                        "output": "extend",
                        "selectHosts": ["hostid", "host", "name"],
                        "expandDescription": true,
                    }),
                    DEFAULT_MAX_RETRIES,
                )
                .await?;
            for trigger in serde_json::from_value::<Vec<RawTrigger>>(value)? {
                triggers.insert(trigger.triggerid.clone(), trigger);
            }
        }

        let host_ids: BTreeSet<String> = triggers
            .values()
            .flat_map(|t| t.hosts.iter().map(|h| h.hostid.clone()))
            .filter(|id| !id.is_empty())
            .collect();
        let mut hosts: HashMap<String, RawHost> = HashMap::new();
        if !host_ids.is_empty() {
            let value = self
                .request(
                    "host.get",
                    json!({
                        "hostids": host_ids,
                        "output": ["hostid", "host", "name"],
                    }),
                    DEFAULT_MAX_RETRIES,
                )
                .await?;
            for host in serde_json::from_value::<Vec<RawHost>>(value)? {
                hosts.insert(host.hostid.clone(), host);
            }
        }

        let details: Vec<ProblemDetail> = problems
            .into_iter()
            .map(|problem| {
                let trigger = triggers.get(&problem.objectid).cloned();
                let host = trigger.as_ref().and_then(|t| t.hosts.first()).map(|h| {
                    hosts.get(&h.hostid).cloned().unwrap_or_else(|| h.clone())
                });
                ProblemDetail {
                    problem,
                    trigger,
                    host,
                }
            })
            .collect();

        tracing::debug!(count = details.len(), "Fetched problems with detail");
        Ok(details)
    }

    /// Event ids of the currently active problems, used to reconcile
    /// alerts that stopped being reported upstream.
    pub async fn fetch_active_event_ids(
        &mut self,
        severities: &[Severity],
        limit: u64,
    ) -> Result<HashSet<String>, ZabbixError> {
        let severity_codes: Vec<u8> = severities.iter().map(|s| s.code()).collect();
        let value = self
            .request(
                "problem.get",
                json!({
                    "output": ["eventid"],
                    "severities": severity_codes,
                    "recent": false,
                    "limit": limit,
                }),
                DEFAULT_MAX_RETRIES,
            )
            .await?;
        let rows: Vec<EventIdOnly> = serde_json::from_value(value)?;
        Ok(rows
            .into_iter()
            .map(|r| r.eventid)
            .filter(|id| !id.is_empty())
            .collect())
    }

    /// Acknowledges events upstream with an operator message.
    pub async fn acknowledge_event(
        &mut self,
        event_ids: &[String],
        message: &str,
    ) -> Result<(), ZabbixError> {
        // action 6 = acknowledge (2) + add message (4)
        self.request(
            "event.acknowledge",
            json!({
                "eventids": event_ids,
                "action": 6,
                "message": message,
            }),
            DEFAULT_MAX_RETRIES,
        )
        .await?;
        Ok(())
    }
}
