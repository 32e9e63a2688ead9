use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use crate::secrets::SecretCipher;

pub mod alert;
pub mod config;
pub mod group;
pub mod subscriber;

pub use alert::AlertBatchOutcome;
pub use config::{ConfigDefaults, MonitoringConfigRow, MonitoringConfigUpdate};
pub use subscriber::SubscriberRow;

/// Unified access layer for the relay database.
///
/// All methods are `async fn` over SeaORM; secrets pass through the
/// embedded [`SecretCipher`] so plaintext credentials never hit disk.
pub struct Store {
    pub(crate) db: DatabaseConnection,
    pub(crate) cipher: SecretCipher,
}

impl Store {
    /// Connects to the database, runs pending migrations, and prepares
    /// the secret cipher from the application secret.
    ///
    /// SQLite example URL: `sqlite://data/zrelay.db?mode=rwc`.
    pub async fn connect(db_url: &str, app_secret: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL only applies to SQLite
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        let cipher = SecretCipher::from_secret(app_secret);
        tracing::info!(db_url = %db_url, "Initialized relay store");

        Ok(Self { db, cipher })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn cipher(&self) -> &SecretCipher {
        &self.cipher
    }
}
