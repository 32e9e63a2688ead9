use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC response envelope. Zabbix returns either `result` or
/// `error`, never both.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: String,
}

/// An active or historical problem as returned by `problem.get`.
///
/// Zabbix serializes every scalar as a string and omits fields freely
/// depending on API version and selected output, so everything defaults
/// and unknown fields are retained verbatim in `extra` for diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProblem {
    pub eventid: String,
    pub objectid: String,
    pub name: String,
    pub severity: String,
    pub clock: String,
    pub value: String,
    pub acknowledged: String,
    pub opdata: String,
    pub acknowledges: Vec<RawAcknowledge>,
    pub hosts: Vec<RawHost>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAcknowledge {
    pub clock: String,
    pub message: String,
    pub alias: String,
    pub name: String,
    pub surname: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A trigger definition as returned by `trigger.get`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTrigger {
    pub triggerid: String,
    pub description: String,
    pub expression: String,
    pub comments: String,
    pub priority: String,
    pub hosts: Vec<RawHost>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawHost {
    pub hostid: String,
    pub host: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A problem joined in memory with its trigger and host detail. Either
/// join side may be unresolvable and stays `None`.
#[derive(Debug, Clone)]
pub struct ProblemDetail {
    pub problem: RawProblem,
    pub trigger: Option<RawTrigger>,
    pub host: Option<RawHost>,
}
