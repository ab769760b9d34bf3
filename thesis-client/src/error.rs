use thiserror::Error;

use crate::transfer::TransferError;

/// Unified error type for all client operations.
///
/// Job failures and unresolvable navigation paths are deliberately *not*
/// represented here: the server reports them as data (`Job::error`,
/// `HierarchyModel::resolve` returning `None`) so that polling loops and
/// navigation keep running.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication expired")]
    AuthExpired,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Snapshot error: {0}")]
    Snapshot(anyhow::Error),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Whether this error ends the current session.
    ///
    /// Terminal auth failures clear stored credentials before they surface,
    /// so callers seeing this should tear down rather than retry.
    pub fn is_auth_terminal(&self) -> bool {
        matches!(self, ClientError::AuthExpired)
    }
}
