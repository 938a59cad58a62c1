use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote configuration error: {message}")]
    RemoteConfig { message: String, auth_related: bool },

    #[error("Dump failed: {0}")]
    Dump(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Override failed: {0}")]
    Override(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl SyncError {
    /// True for SSH failures caused by authentication or connectivity, where
    /// the fix is on the user's side (keys, host, firewall) rather than ours.
    pub fn is_auth_related(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteConfig {
                auth_related: true,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
