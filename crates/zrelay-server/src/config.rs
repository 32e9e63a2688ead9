use serde::{Deserialize, Serialize};
use zrelay_storage::ConfigDefaults;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_db_url")]
    pub db_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Key material for credential encryption is derived from this via
    /// a one-way hash; change it and stored secrets become unreadable.
    #[serde(default = "default_app_secret")]
    pub app_secret: String,

    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub zabbix: ZabbixDefaultsConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Fixed display offset (hours from UTC) for message timestamps.
    #[serde(default = "default_timezone_offset_hours")]
    pub timezone_offset_hours: i32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_telegram_api_base(),
            timezone_offset_hours: default_timezone_offset_hours(),
        }
    }
}

/// Seed values for the lazily created monitoring config row. All of
/// them can be overridden from the environment (`ZABBIX_URL`,
/// `ZABBIX_API_TOKEN`, `ZABBIX_USERNAME`, `ZABBIX_PASSWORD`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZabbixDefaultsConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: i32,
}

impl Default for ZabbixDefaultsConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_token: None,
            username: None,
            password: None,
            enabled: false,
            poll_interval_minutes: default_poll_interval_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// How often the scheduler re-reads the config for interval or
    /// enabled-flag changes.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    /// Generous upper bound on fetched problems so truncation never
    /// silently masks incidents.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_db_url() -> String {
    "sqlite://data/zrelay.db?mode=rwc".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_app_secret() -> String {
    "changeme".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timezone_offset_hours() -> i32 {
    3
}

fn default_poll_interval_minutes() -> i32 {
    5
}

fn default_refresh_secs() -> u64 {
    30
}

fn default_fetch_limit() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_url: default_db_url(),
            data_dir: default_data_dir(),
            app_secret: default_app_secret(),
            telegram: TelegramConfig::default(),
            zabbix: ZabbixDefaultsConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a
    /// config file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ZABBIX_URL") {
            if !url.is_empty() {
                self.zabbix.url = Some(url);
            }
        }
        if let Ok(token) = std::env::var("ZABBIX_API_TOKEN") {
            if !token.is_empty() {
                self.zabbix.api_token = Some(token);
            }
        }
        if let Ok(username) = std::env::var("ZABBIX_USERNAME") {
            if !username.is_empty() {
                self.zabbix.username = Some(username);
            }
        }
        if let Ok(password) = std::env::var("ZABBIX_PASSWORD") {
            if !password.is_empty() {
                self.zabbix.password = Some(password);
            }
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram.bot_token = Some(token);
            }
        }
    }

    /// Seed values handed to the store for lazy config creation.
    pub fn config_defaults(&self) -> ConfigDefaults {
        ConfigDefaults {
            api_url: self.zabbix.url.clone(),
            api_token: self.zabbix.api_token.clone(),
            username: self.zabbix.username.clone(),
            password: self.zabbix.password.clone(),
            enabled: self.zabbix.enabled,
            poll_interval_minutes: self.zabbix.poll_interval_minutes,
        }
    }
}
