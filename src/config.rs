use crate::error::{Result, SyncError};
use serde::Deserialize;
use std::env;
use std::fs;

/// Tunables loaded once from `config.toml`. Secrets never live here; they come
/// from the environment via [`Credentials::from_env`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub sheets: SheetsSettings,
    pub sync: SyncSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Cell range read from every funnel tab, e.g. "A2:R60".
    pub range: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    /// Spreadsheet tab names, one per funnel/product.
    pub funnels: Vec<String>,
    #[serde(default = "default_log_type")]
    pub log_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_base_url() -> String {
    "https://sheets.googleapis.com/v4/spreadsheets".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_log_type() -> String {
    "aquisicao".to_string()
}

fn default_db_path() -> String {
    "data/funnel_sync.db".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            SyncError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

/// Spreadsheet access credentials, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub spreadsheet_id: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("SHEETS_API_KEY").map_err(|_| {
            SyncError::Config("SHEETS_API_KEY environment variable not set".to_string())
        })?;
        let spreadsheet_id = env::var("SPREADSHEET_ID").map_err(|_| {
            SyncError::Config("SPREADSHEET_ID environment variable not set".to_string())
        })?;
        Ok(Self {
            api_key,
            spreadsheet_id,
        })
    }
}
