//! Process settings handed to handlers.
//!
//! The runtime loads these from files and the environment; the routing core
//! only reads them. `root_routes` names the root route collection and is
//! resolved by the embedding application, `installed_apps` is consumed by
//! app discovery and never interpreted by routing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Read-only process configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enables verbose logging and debug behaviour.
    #[serde(default)]
    pub debug: bool,

    /// App identifiers, in load order.
    #[serde(default)]
    pub installed_apps: Vec<String>,

    /// Descriptor of the root route collection, e.g. `myproject.routes`.
    #[serde(default)]
    pub root_routes: Option<String>,

    /// Platform credentials and identity.
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// App-specific keys not known to the framework.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot API token.
    #[serde(default)]
    pub token: Option<String>,

    /// The bot's own username, used to ignore commands addressed to other bots.
    #[serde(default)]
    pub username: Option<String>,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .finish()
    }
}

impl Settings {
    /// Looks up an app-specific setting.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Returns the configured bot username, if any.
    pub fn bot_username(&self) -> Option<&str> {
        self.telegram.username.as_deref().filter(|u| !u.is_empty())
    }
}
