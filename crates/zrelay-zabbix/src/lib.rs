//! JSON-RPC client for the Zabbix monitoring API and the raw-problem to
//! alert transformer.
//!
//! The client authenticates with either a long-lived API token or a
//! username/password session, carries the token in the request body
//! `auth` field, retries connection failures with linear backoff, and
//! re-logs-in transparently when a session token expires mid-poll.

pub mod client;
pub mod error;
pub mod transform;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{ClientSettings, ZabbixClient};
pub use error::ZabbixError;
pub use types::{ProblemDetail, RawAcknowledge, RawHost, RawProblem, RawTrigger};
