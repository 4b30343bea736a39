//! Error types for route declaration and compilation.
//!
//! Every error here is fatal to startup: a bot must not serve traffic with a
//! half-built route table. "No route matched" is not an error and never
//! appears here; it is a normal [`DispatchOutcome`](crate::DispatchOutcome).

use thiserror::Error;

/// A matcher criterion is malformed (bad regex, unusable command token).
#[derive(Debug, Clone, Error)]
#[error("invalid pattern '{pattern}': {reason}")]
pub struct PatternError {
    /// The offending pattern source.
    pub pattern: String,
    /// Why it was rejected.
    pub reason: String,
}

impl PatternError {
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// A route collection declaration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Namespace is empty or contains characters other than `[A-Za-z0-9_-]`.
    #[error("invalid namespace '{0}': expected a non-empty identifier without ':'")]
    InvalidNamespace(String),

    /// Route name is empty or contains characters other than `[A-Za-z0-9_-]`.
    #[error("invalid route name '{0}': expected a non-empty identifier without ':'")]
    InvalidName(String),

    /// A handler or include reference is not a valid descriptor.
    #[error("invalid reference '{0}': expected a dotted path like 'app.handlers.start'")]
    InvalidReference(String),

    /// Two routes share a fully-qualified name.
    #[error("duplicate route name '{0}'")]
    DuplicateName(String),

    /// A collection includes itself, directly or transitively.
    #[error("include cycle detected: {0}")]
    IncludeCycle(String),

    /// An include target could not be resolved to a route collection.
    #[error("included route collection '{0}' could not be resolved")]
    UnresolvedInclude(String),
}

/// A handler reference could not be resolved to a callable.
#[derive(Debug, Clone, Error)]
#[error("cannot resolve handler '{path}'{}", route_suffix(.route))]
pub struct HandlerResolutionError {
    /// The unresolved handler descriptor.
    pub path: String,
    /// Full name of the route that referenced it, if named.
    pub route: Option<String>,
}

fn route_suffix(route: &Option<String>) -> String {
    route
        .as_deref()
        .map(|r| format!(" for route '{r}'"))
        .unwrap_or_default()
}

/// Any error raised while declaring or compiling routes.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    HandlerResolution(#[from] HandlerResolutionError),
}

impl RouteError {
    /// Returns the configuration error, if this is one.
    pub fn as_config(&self) -> Option<&ConfigError> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for route declaration and compilation.
pub type RouteResult<T> = Result<T, RouteError>;
