//! Extension points carried by the handler context.
//!
//! Routing ships no implementation of either trait. Applications plug in a
//! state store or metrics sink through
//! [`Dispatcher::with_state_backend`](crate::Dispatcher::with_state_backend)
//! and [`Dispatcher::with_metrics`](crate::Dispatcher::with_metrics).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::handler::HandlerError;
use crate::matcher::RouteKind;
use televoltaic_core::ChatId;

/// Per-chat key/value storage available to handlers.
#[async_trait]
pub trait StateBackend: Send + Sync + 'static {
    async fn get(&self, chat: ChatId, key: &str) -> Result<Option<Value>, HandlerError>;

    async fn set(&self, chat: ChatId, key: &str, value: Value) -> Result<(), HandlerError>;
}

/// Observer notified about dispatch results.
///
/// Calls happen inline on the dispatch path and should not block.
pub trait MetricsHook: Send + Sync + 'static {
    fn route_matched(&self, kind: RouteKind, route: Option<&str>);

    fn route_unmatched(&self, kind: RouteKind);

    fn handler_completed(&self, kind: RouteKind, route: Option<&str>, elapsed: Duration, ok: bool);
}
