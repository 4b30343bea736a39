//! Runtime error types.

use thiserror::Error;

use crate::config::SettingsError;
use televoltaic_routing::RouteError;

/// Errors that can occur while starting or reloading the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `root_routes` is not configured.
    #[error("No root route collection configured (set root_routes or TELEVOLTAIC_ROOT_ROUTES)")]
    MissingRootRoutes,

    /// The builder was not given a required component.
    #[error("Runtime builder is missing a {0}")]
    MissingComponent(&'static str),

    /// Route declarations failed to compile.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Settings could not be loaded or are invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
