/// Errors surfaced by the monitoring client.
///
/// The poll orchestrator only needs two classifications: connectivity
/// failures (retried with backoff) and authentication failures (healed
/// with one inline re-login); everything else is terminal for the cycle.
#[derive(Debug, thiserror::Error)]
pub enum ZabbixError {
    #[error("Zabbix: invalid endpoint URL '{0}'")]
    InvalidUrl(String),

    #[error("Zabbix: no usable credentials (API token or username/password required)")]
    MissingCredentials,

    #[error("Zabbix: client not initialized")]
    NotInitialized,

    #[error("Zabbix: request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error object returned by the API itself.
    #[error("Zabbix: API error {code}: {message} ({data})")]
    Api {
        code: i64,
        message: String,
        data: String,
    },

    #[error("Zabbix: malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zabbix: protocol error: {0}")]
    Protocol(String),

    #[error("Zabbix: login failed: {0}")]
    Login(String),
}

impl ZabbixError {
    /// Connection-class errors: refused, timed out, DNS failures.
    pub fn is_connectivity(&self) -> bool {
        match self {
            ZabbixError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Authentication-class errors, detected from the API error payload.
    pub fn is_auth(&self) -> bool {
        match self {
            ZabbixError::Api { message, data, .. } => {
                let haystack = format!("{message} {data}").to_lowercase();
                haystack.contains("not authorised")
                    || haystack.contains("not authorized")
                    || haystack.contains("session terminated")
                    || haystack.contains("re-login")
            }
            _ => false,
        }
    }
}
