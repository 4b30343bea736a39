//! Settings loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `televoltaic.toml`, `settings.toml`
//! - `yaml-config`: `televoltaic.yaml`, `televoltaic.yml`, `settings.yaml`,
//!   `settings.yml`
//!
//! # Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific file (`televoltaic.{profile}.toml`)
//! 3. Main file (`televoltaic.toml`)
//! 4. Environment variables (`TELEVOLTAIC_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variables
//!
//! | variable | setting |
//! |---|---|
//! | `TELEVOLTAIC_DEBUG` | `debug`; `1`, `true`, `yes`, `on`, `y` are true, anything else false |
//! | `TELEVOLTAIC_TOKEN` | `telegram.token` |
//! | `TELEVOLTAIC_ROOT_ROUTES` | `root_routes` |
//! | `TELEVOLTAIC_INSTALLED_APPS` | `installed_apps`, comma-separated |
//! | `TELEVOLTAIC_PROFILE` | selects the profile file |
//!
//! Empty values of the last three are ignored. Any other
//! `TELEVOLTAIC_` variable maps to a nested key with `__` as the separator:
//! `TELEVOLTAIC_LOGGING__LEVEL=debug` sets `logging.level`.
//!
//! ```rust,ignore
//! use televoltaic_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("deploy/televoltaic.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{SettingsError, SettingsResult};
use super::schema::TeleVoltaicConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "TELEVOLTAIC_";
const TRUTHY: [&str; 5] = ["1", "true", "yes", "on", "y"];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" | "" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `TELEVOLTAIC_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(format!("{ENV_PREFIX}PROFILE"))
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a boolean environment flag.
pub fn parse_flag(value: &str) -> bool {
    TRUTHY.contains(&value.trim().to_lowercase().as_str())
}

/// Splits a comma-separated list, dropping blank items.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Layered settings loader.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory searched for settings files.
    ///
    /// Without any, the current directory and the user config directory
    /// (`~/.config/televoltaic` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a full configuration on top of every other source.
    pub fn merge(mut self, config: TeleVoltaicConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Overrides a single key, e.g. `set("dispatch.max_concurrency", 4)`.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> SettingsResult<TeleVoltaicConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: TeleVoltaicConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            debug = config.settings.debug,
            root_routes = config.settings.root_routes.as_deref().unwrap_or("-"),
            installed_apps = config.settings.installed_apps.len(),
            log_level = %config.logging.level,
            "Settings loaded"
        );

        Ok(config)
    }

    fn build_figment(self) -> SettingsResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TeleVoltaicConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(SettingsError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading settings file");
            figment = Self::merge_file(figment, path)?;
        } else {
            figment = self.search_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["DEBUG", "TOKEN", "ROOT_ROUTES", "INSTALLED_APPS", "PROFILE"])
                    .split("__"),
            );
            figment = Self::merge_special_env(figment);
        }

        Ok(figment.merge(self.overrides))
    }

    /// Applies the variables with their own parsing rules.
    fn merge_special_env(mut figment: Figment) -> Figment {
        let var = |name: &str| std::env::var(format!("{ENV_PREFIX}{name}")).ok();

        if let Some(value) = var("DEBUG") {
            figment = figment.merge(Serialized::default("debug", parse_flag(&value)));
        }
        if let Some(token) = var("TOKEN").filter(|t| !t.is_empty()) {
            figment = figment.merge(Serialized::default("telegram.token", token));
        }
        if let Some(root) = var("ROOT_ROUTES").filter(|r| !r.is_empty()) {
            figment = figment.merge(Serialized::default("root_routes", root));
        }
        if let Some(apps) = var("INSTALLED_APPS").map(|a| split_csv(&a)).filter(|a| !a.is_empty()) {
            figment = figment.merge(Serialized::default("installed_apps", apps));
        }
        figment
    }

    fn merge_file(figment: Figment, path: &Path) -> SettingsResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(SettingsError::ParseError(format!(
                "Unsupported or disabled settings file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("televoltaic")))
            .collect()
    }

    /// Merges the profile file then the main file of the first directory
    /// holding a main file of this format.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn search_format<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for dir in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile settings file");
                    figment = merge(figment, &profile_path);
                }

                let base_path = dir.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading settings file");
                    return (merge(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_mut, unused_variables)
    )]
    fn search_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.search_format(
                figment,
                &search_paths,
                &["televoltaic.toml", "settings.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.search_format(
                figment,
                &search_paths,
                &["televoltaic.yaml", "televoltaic.yml", "settings.yaml", "settings.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No settings file found, using defaults");
        }
        figment
    }
}

/// Loads settings from the default locations.
pub fn load_config() -> SettingsResult<TeleVoltaicConfig> {
    ConfigLoader::new().load()
}

/// Loads settings from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> SettingsResult<TeleVoltaicConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
