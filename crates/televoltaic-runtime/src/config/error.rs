//! Settings loading and validation errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// A settings file given explicitly does not exist.
    #[error("Settings file not found: {0}")]
    FileNotFound(PathBuf),

    /// The merged sources could not be extracted into the schema.
    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    /// A value is present but not acceptable.
    #[error("Invalid settings: {message}")]
    ValidationError { message: String },

    /// A required value is absent.
    #[error("Missing required setting: {field}")]
    MissingField { field: String },

    /// `root_routes` is not a valid route collection descriptor.
    #[error("Invalid root_routes descriptor: {0}")]
    InvalidRootRoutes(String),

    /// An installed app identifier is malformed or repeated.
    #[error("Invalid installed app: {0}")]
    InvalidApp(String),
}

impl SettingsError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
