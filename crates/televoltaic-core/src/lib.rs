//! # TeleVoltaic Core
//!
//! Shared building blocks for the TeleVoltaic framework:
//!
//! - **Updates**: the inbound event model ([`Update`]) and command parsing
//!   ([`parse_command`])
//! - **Bot**: the outbound capability used to reply ([`Bot`], [`BoxedBot`])
//! - **Settings**: read-only process configuration ([`Settings`])
//! - **Errors**: API call failures ([`ApiError`])
//!
//! Routing and dispatch live in `televoltaic-routing`; configuration loading,
//! logging and the update loop live in `televoltaic-runtime`.

pub mod bot;
pub mod error;
pub mod settings;
pub mod update;

pub use bot::{Bot, BoxedBot};
pub use error::{ApiError, ApiResult};
pub use settings::{Settings, TelegramSettings};
pub use update::{
    COMMAND_MARKER, CallbackQuery, Chat, ChatId, CommandInvocation, Message, Origin, Update, User,
    parse_command,
};
