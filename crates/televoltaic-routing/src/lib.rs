//! # TeleVoltaic Routing
//!
//! Declarative routing and dispatch for chat bot updates.
//!
//! This layer provides:
//! - Pattern matchers for commands, message text and callback data
//! - Route declaration with `patterns`, `command`, `message`, `callback` and
//!   `include`, with nested namespaces
//! - A compiler that flattens route trees into an immutable [`RouteTable`]
//! - A [`Dispatcher`] doing ordered first-match resolution per update kind
//! - The handler trait and the per-dispatch [`HandlerContext`]
//!
//! ```rust,ignore
//! use televoltaic_routing::prelude::*;
//!
//! async fn start(_update: Arc<Update>, _ctx: HandlerContext) -> &'static str {
//!     "Welcome!"
//! }
//!
//! let resolver = Resolver::new().handler("core.start", start);
//! let root = patterns(None, [command("start", "core.start", Some("start"))])?;
//! let table = RouteTable::compile(&root, &resolver)?;
//! let dispatcher = Dispatcher::new(SharedRouteTable::new(table), bot, settings);
//! dispatcher.dispatch(Arc::new(update)).await?;
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extension;
pub mod handler;
pub mod matcher;
pub mod patterns;
pub mod registry;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use context::HandlerContext;
pub use dispatcher::{
    DispatchOutcome, DispatchPhase, Dispatcher, ResolvedRoute, UpdateKind, classify,
};
pub use error::{
    ConfigError, HandlerResolutionError, PatternError, RouteError, RouteResult,
};
pub use extension::{MetricsHook, StateBackend};
pub use handler::{
    BoxedHandler, Handler, HandlerError, HandlerRef, HandlerResponse, HandlerResult, into_handler,
    is_valid_descriptor,
};
pub use matcher::{Captures, MatchResult, Matcher, RouteKind};
pub use patterns::{
    Entry, IncludeRef, IncludeTarget, RouteCollection, RouteEntry, callback, command, include,
    message, patterns,
};
pub use registry::{CompiledRoute, RouteTable, SharedRouteTable};
pub use resolver::{Resolver, RouteResolver};

pub use televoltaic_core::{Settings, Update};

/// Everything needed to declare routes and write handlers.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        DispatchOutcome, Dispatcher, HandlerContext, HandlerError, HandlerRef, Resolver,
        RouteCollection, RouteResult, RouteTable, SharedRouteTable, callback, command, include,
        message, patterns,
    };
    pub use televoltaic_core::{Settings, Update};
}
