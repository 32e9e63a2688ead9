//! Persistence layer for the relay: monitoring configuration, alert
//! records, notification groups, and subscriber handles.
//!
//! All access goes through the [`store::Store`] façade (SeaORM + SQLite,
//! WAL mode). Secrets are encrypted at rest via [`secrets::SecretCipher`].

pub mod entities;
pub mod secrets;
pub mod store;

#[cfg(test)]
mod tests;

pub use secrets::{EncryptedSecret, SecretCipher};
pub use store::{
    AlertBatchOutcome, ConfigDefaults, MonitoringConfigRow, MonitoringConfigUpdate, Store,
    SubscriberRow,
};
