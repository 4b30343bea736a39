//! Settings loading for the TeleVoltaic runtime.
//!
//! Settings come from TOML/YAML files, `TELEVOLTAIC_*` environment variables
//! and programmatic overrides, merged with figment and validated before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{SettingsError, SettingsResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
    TeleVoltaicConfig,
};
pub use validation::validate_config;
