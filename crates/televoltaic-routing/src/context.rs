//! Handler context.
//!
//! A [`HandlerContext`] is created fresh for every resolved dispatch and
//! handed to the matched handler. It carries:
//!
//! - the update being handled
//! - the captures produced by the matcher
//! - the matched route's full name and kind
//! - read-only [`Settings`]
//! - the [`Bot`](televoltaic_core::Bot) used to reply, bound to the update's
//!   origin through [`reply`](HandlerContext::reply)
//! - optional extension slots ([`StateBackend`], [`MetricsHook`])
//! - a cancellation token that fires when the dispatch is abandoned
//!
//! Contexts share nothing mutable with each other; cloning one only clones
//! `Arc`s.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn show_user(_update: Arc<Update>, ctx: HandlerContext) -> Result<(), HandlerError> {
//!     let id = ctx.capture(0).unwrap_or_default();
//!     ctx.reply(&format!("user {id}")).await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::extension::{MetricsHook, StateBackend};
use crate::matcher::{Captures, RouteKind};
use televoltaic_core::{ApiError, ApiResult, BoxedBot, Origin, Settings, Update};

/// Per-invocation context passed to handlers.
#[derive(Clone)]
pub struct HandlerContext {
    update: Arc<Update>,
    captures: Arc<Captures>,
    route: Option<Arc<str>>,
    kind: RouteKind,
    settings: Arc<Settings>,
    bot: BoxedBot,
    state: Option<Arc<dyn StateBackend>>,
    metrics: Option<Arc<dyn MetricsHook>>,
    cancel: CancellationToken,
}

impl HandlerContext {
    /// Creates a context without extension slots.
    pub fn new(
        update: Arc<Update>,
        captures: Captures,
        kind: RouteKind,
        settings: Arc<Settings>,
        bot: BoxedBot,
    ) -> Self {
        Self {
            update,
            captures: Arc::new(captures),
            route: None,
            kind,
            settings,
            bot,
            state: None,
            metrics: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_route_name(mut self, name: Option<&str>) -> Self {
        self.route = name.map(Arc::from);
        self
    }

    pub fn with_state_backend(mut self, state: Option<Arc<dyn StateBackend>>) -> Self {
        self.state = state;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<dyn MetricsHook>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    pub fn update(&self) -> &Arc<Update> {
        &self.update
    }

    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    /// Shorthand for `captures().get(index)`.
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index)
    }

    /// Shorthand for `captures().name(name)`.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.captures.name(name)
    }

    /// Full name of the matched route, e.g. `users:profile`.
    pub fn route_name(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    pub fn state(&self) -> Option<&Arc<dyn StateBackend>> {
        self.state.as_ref()
    }

    pub fn metrics(&self) -> Option<&Arc<dyn MetricsHook>> {
        self.metrics.as_ref()
    }

    // ─── Cancellation ─────────────────────────────────────────────────────────

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the dispatch is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    // ─── Replying ─────────────────────────────────────────────────────────────

    /// Sends `text` back to where the update came from.
    ///
    /// Callback queries attached to a chat message get a chat message; bare
    /// callback queries are answered with `text` as the notification.
    /// Returns the sent message id, or `None` when the callback was answered.
    pub async fn reply(&self, text: &str) -> ApiResult<Option<i64>> {
        match self.update.origin() {
            Some(Origin::Chat(chat)) | Some(Origin::Callback { chat: Some(chat), .. }) => {
                self.bot.send_text(chat, text).await.map(Some)
            }
            Some(Origin::Callback { id, chat: None }) => {
                self.bot.answer_callback(&id, Some(text)).await.map(|_| None)
            }
            None => Err(ApiError::MissingSession),
        }
    }

    /// Answers the update's callback query.
    pub async fn answer_callback(&self, text: Option<&str>) -> ApiResult<()> {
        let id = self.update.callback_id().ok_or(ApiError::MissingSession)?;
        self.bot.answer_callback(id, text).await
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("update_id", &self.update.update_id)
            .field("route", &self.route)
            .field("kind", &self.kind)
            .field("captures", &self.captures)
            .field("bot", &self.bot.id())
            .field("has_state", &self.state.is_some())
            .field("has_metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBot, Sent};

    fn context(update: Update, bot: Arc<MockBot>) -> HandlerContext {
        HandlerContext::new(
            Arc::new(update),
            Captures::default(),
            RouteKind::Message,
            Arc::new(Settings::default()),
            bot,
        )
    }

    #[tokio::test]
    async fn test_reply_to_chat() {
        let bot = MockBot::new();
        let ctx = context(Update::text_message(1, 42, "hi"), bot.clone());
        assert_eq!(ctx.reply("hello").await.unwrap(), Some(1));
        assert_eq!(bot.sent(), vec![Sent::Text { chat: 42, text: "hello".into() }]);
    }

    #[tokio::test]
    async fn test_reply_to_callback_with_chat() {
        let bot = MockBot::new();
        let ctx = context(Update::callback(1, "q1", Some(7), "vote:up"), bot.clone());
        ctx.reply("thanks").await.unwrap();
        assert_eq!(bot.sent(), vec![Sent::Text { chat: 7, text: "thanks".into() }]);
    }

    #[tokio::test]
    async fn test_reply_to_bare_callback_answers_it() {
        let bot = MockBot::new();
        let ctx = context(Update::callback(1, "q1", None, "vote:up"), bot.clone());
        assert_eq!(ctx.reply("noted").await.unwrap(), None);
        assert_eq!(
            bot.sent(),
            vec![Sent::Answer { id: "q1".into(), text: Some("noted".into()) }]
        );
    }

    #[tokio::test]
    async fn test_reply_without_origin() {
        let bot = MockBot::new();
        let ctx = context(Update::default(), bot.clone());
        assert!(matches!(ctx.reply("x").await, Err(ApiError::MissingSession)));
        assert!(matches!(ctx.answer_callback(None).await, Err(ApiError::MissingSession)));
        assert!(bot.sent().is_empty());
    }

    #[test]
    fn test_builder_slots() {
        let ctx = context(Update::text_message(1, 1, "x"), MockBot::new())
            .with_route_name(Some("users:profile"));
        assert_eq!(ctx.route_name(), Some("users:profile"));
        assert!(ctx.state().is_none());
        assert!(ctx.metrics().is_none());
        assert!(!ctx.is_cancelled());
    }
}
