//! Error types shared across the TeleVoltaic crates.
//!
//! Routing errors (pattern, configuration and resolution failures) live in
//! `televoltaic-routing`; this module only covers talking back to the chat
//! platform.

use thiserror::Error;

/// Error type for outbound API calls made through a [`Bot`](crate::Bot).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The bot is not connected to the platform.
    #[error("bot is not connected")]
    NotConnected,
    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,
    /// The platform rejected the call.
    #[error("API error ({code}): {description}")]
    Rejected { code: i64, description: String },
    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The update carries no chat or callback to reply to.
    #[error("missing session info")]
    MissingSession,
    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
