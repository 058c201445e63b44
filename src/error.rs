use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl SyncError {
    /// Only transient fetch failures are candidates for a retry. Credential
    /// and sheet-name problems will not fix themselves on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Http(_) | SyncError::Fetch(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
