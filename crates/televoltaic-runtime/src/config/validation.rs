//! Settings validation.

use std::collections::HashSet;

use super::error::{SettingsError, SettingsResult};
use super::schema::{DispatchConfig, LogOutput, LoggingConfig, TeleVoltaicConfig};
use televoltaic_core::Settings;
use televoltaic_routing::is_valid_descriptor;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration.
///
/// A missing `root_routes` is not an error here; the runtime reports it
/// when it needs to compile routes.
pub fn validate_config(config: &TeleVoltaicConfig) -> SettingsResult<()> {
    validate_settings(&config.settings)?;
    validate_logging(&config.logging)?;
    validate_dispatch(&config.dispatch)?;
    Ok(())
}

fn validate_settings(settings: &Settings) -> SettingsResult<()> {
    if let Some(root) = &settings.root_routes
        && !is_valid_descriptor(root, true)
    {
        return Err(SettingsError::InvalidRootRoutes(root.clone()));
    }

    // Apps may name a config class: `module.path:ClassName`.
    let mut seen = HashSet::new();
    for app in &settings.installed_apps {
        if !is_valid_descriptor(app, true) {
            return Err(SettingsError::InvalidApp(app.clone()));
        }
        if !seen.insert(app.as_str()) {
            return Err(SettingsError::InvalidApp(format!("{app} is listed twice")));
        }
    }

    if let Some(token) = &settings.telegram.token
        && token.trim().is_empty()
    {
        return Err(SettingsError::validation("telegram.token must not be blank"));
    }

    Ok(())
}

fn validate_level(level: &str, what: &str) -> SettingsResult<()> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(SettingsError::validation(format!(
            "Invalid {what}: {level}. Valid values are: {LOG_LEVELS:?}"
        )))
    }
}

fn validate_logging(logging: &LoggingConfig) -> SettingsResult<()> {
    validate_level(&logging.level, "log level")?;
    for (target, level) in &logging.filters {
        validate_level(level, &format!("log level for '{target}'"))?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(SettingsError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> SettingsResult<()> {
    if dispatch.handler_timeout_ms == Some(0) {
        return Err(SettingsError::validation(
            "dispatch.handler_timeout_ms must be greater than 0",
        ));
    }
    if dispatch.max_concurrency == Some(0) {
        return Err(SettingsError::validation(
            "dispatch.max_concurrency must be greater than 0",
        ));
    }
    Ok(())
}
