//! Inbound update model.
//!
//! The transport layer (long polling or webhook) produces [`Update`] values
//! and hands them to the dispatcher. Only the fields routing cares about are
//! modelled: message text, callback payload and the origin chat. The shape
//! follows the Telegram Bot API so updates can be deserialized straight from
//! the wire.

use serde::{Deserialize, Serialize};

/// Prefix that turns a text message into a command.
pub const COMMAND_MARKER: char = '/';

/// Chat identifier.
pub type ChatId = i64;

/// An incoming update from the chat platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// The bot message the button was attached to, if still available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Where a reply to an update should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A plain chat message.
    Chat(ChatId),
    /// A callback query, optionally attached to a message in a chat.
    Callback { id: String, chat: Option<ChatId> },
}

/// A parsed command: `/name@mention arg1 arg2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Command token without the marker and mention suffix.
    pub name: String,
    /// Bot username after `@`, if the command was addressed explicitly.
    pub mention: Option<String>,
    /// Remaining whitespace-delimited arguments.
    pub args: Vec<String>,
}

impl CommandInvocation {
    /// Returns `true` if this command may be handled by a bot named
    /// `username`. Commands without a mention are addressed to everyone.
    pub fn is_addressed_to(&self, username: &str) -> bool {
        match &self.mention {
            Some(mention) => mention.eq_ignore_ascii_case(username.trim_start_matches('@')),
            None => true,
        }
    }
}

/// Parses command-shaped text.
///
/// Returns `None` unless `text` starts with [`COMMAND_MARKER`] followed by a
/// non-empty token.
///
/// ```
/// use televoltaic_core::parse_command;
///
/// let cmd = parse_command("/start@my_bot deep link").unwrap();
/// assert_eq!(cmd.name, "start");
/// assert_eq!(cmd.mention.as_deref(), Some("my_bot"));
/// assert_eq!(cmd.args, vec!["deep", "link"]);
/// ```
pub fn parse_command(text: &str) -> Option<CommandInvocation> {
    let rest = text.strip_prefix(COMMAND_MARKER)?;
    let mut words = rest.split_whitespace();

    // Whitespace right after the marker means there is no token at all.
    if rest.starts_with(char::is_whitespace) {
        return None;
    }
    let head = words.next()?;

    let (name, mention) = match head.split_once('@') {
        Some((name, mention)) => (name, Some(mention.to_string()).filter(|m| !m.is_empty())),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }

    Some(CommandInvocation {
        name: name.to_string(),
        mention,
        args: words.map(str::to_string).collect(),
    })
}

impl Update {
    /// Text of the update's own message.
    ///
    /// The message a callback button is attached to is the bot's message,
    /// so it is deliberately not consulted here.
    pub fn text(&self) -> Option<&str> {
        self.message.as_ref()?.text.as_deref()
    }

    /// Payload of the callback query, if any.
    pub fn callback_data(&self) -> Option<&str> {
        self.callback_query.as_ref()?.data.as_deref()
    }

    /// Identifier of the callback query, if any.
    pub fn callback_id(&self) -> Option<&str> {
        self.callback_query.as_ref().map(|q| q.id.as_str())
    }

    /// Chat the update originated from.
    pub fn chat_id(&self) -> Option<ChatId> {
        self.message
            .as_ref()
            .or_else(|| self.callback_query.as_ref()?.message.as_ref())
            .map(|m| m.chat.id)
    }

    /// Parses the message text as a command.
    pub fn command(&self) -> Option<CommandInvocation> {
        self.text().and_then(parse_command)
    }

    /// Returns where replies to this update should be delivered.
    pub fn origin(&self) -> Option<Origin> {
        if let Some(query) = &self.callback_query {
            return Some(Origin::Callback {
                id: query.id.clone(),
                chat: query.message.as_ref().map(|m| m.chat.id),
            });
        }
        self.message.as_ref().map(|m| Origin::Chat(m.chat.id))
    }

    /// Builds a text message update. Mostly useful in tests and demos.
    pub fn text_message(update_id: i64, chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat { id: chat_id },
                from: None,
                text: Some(text.into()),
            }),
            callback_query: None,
        }
    }

    /// Builds a callback query update. Mostly useful in tests and demos.
    pub fn callback(
        update_id: i64,
        query_id: impl Into<String>,
        chat_id: Option<ChatId>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            update_id,
            message: None,
            callback_query: Some(CallbackQuery {
                id: query_id.into(),
                from: None,
                message: chat_id.map(|id| Message {
                    message_id: update_id,
                    chat: Chat { id },
                    from: None,
                    text: None,
                }),
                data: Some(data.into()),
            }),
        }
    }
}
