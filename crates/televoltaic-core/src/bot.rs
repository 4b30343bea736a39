//! Bot trait and related types.
//!
//! This module defines the `Bot` trait which represents the outbound half of
//! a bot: the capability to send messages back to the chat platform.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::update::ChatId;

/// The core Bot trait.
///
/// The transport layer owns the connection to the platform and provides a
/// `Bot` implementation; routing only ever uses it through the handler
/// context's reply capability.
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Returns the bot's unique identifier.
    fn id(&self) -> &str;

    /// Sends a text message to a chat.
    ///
    /// # Returns
    ///
    /// The identifier of the sent message.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> ApiResult<i64>;

    /// Answers a callback query, optionally showing `text` as a notification.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ApiResult<()>;

    /// Returns self as an `Arc<dyn Any>` for safe downcasting.
    ///
    /// Implementors should simply return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;
