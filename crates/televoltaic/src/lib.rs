//! # TeleVoltaic
//!
//! Declarative, URL-style routing for Telegram-like chat bots.
//!
//! ## Overview
//!
//! Applications declare route collections much like a web framework's URL
//! configuration: commands, message text patterns and callback payloads map
//! to async handlers, collections nest under namespaces, and every named
//! route gets a full `namespace:name` that can be reversed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌─────────────────────┐
//! │  Transport  │────▶│  Runtime   │────▶│ Dispatcher          │──▶ handler(update, ctx)
//! │  (updates)  │     │ (one task  │     │ classify → partition│
//! └─────────────┘     │ per update)│     │ → first match       │
//!                     └────────────┘     └─────────────────────┘
//!                            │ compile / reload
//!                            ▼
//!                     ┌────────────┐
//!                     │ RouteTable │  (immutable, swapped atomically)
//!                     └────────────┘
//! ```
//!
//! - **Core**: update model, the outbound `Bot` trait and settings
//! - **Routing**: matchers, route declarations, the compiler and dispatcher
//! - **Runtime**: settings loading, logging and the update loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use televoltaic::prelude::*;
//!
//! async fn start(_update: Arc<Update>, _ctx: HandlerContext) -> &'static str {
//!     "Welcome!"
//! }
//!
//! async fn profile(_update: Arc<Update>, ctx: HandlerContext) -> String {
//!     format!("Profile of {}", ctx.capture(0).unwrap_or("nobody"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Resolver::new()
//!         .handler("core.start", start)
//!         .handler("users.profile", profile)
//!         .routes_with("users.routes", || {
//!             patterns(None, [message(r"^profile (\w+)$", "users.profile", Some("profile"))])
//!         })
//!         .routes_with("project.routes", || {
//!             patterns(None, [
//!                 command("start", "core.start", Some("start")),
//!                 include("users.routes", Some("users")),
//!             ])
//!         });
//!
//!     let runtime = TeleVoltaic::builder()
//!         .set("root_routes", "project.routes")
//!         .resolver(resolver)
//!         .bot(my_bot())
//!         .build()?;
//!
//!     runtime.run(my_updates()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML settings files (default)
//! - `yaml-config`: YAML settings files
//! - `json-log`: JSON log output

pub use televoltaic_core as core;
pub use televoltaic_routing as routing;
pub use televoltaic_runtime as runtime;

pub use televoltaic_core::{Bot, BoxedBot, Settings, Update};
pub use televoltaic_routing::{
    DispatchOutcome, Dispatcher, HandlerContext, Resolver, RouteError, RouteTable,
};
pub use televoltaic_runtime::{RuntimeError, TeleVoltaic};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use televoltaic::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use televoltaic_runtime::{ConfigLoader, TeleVoltaic, TeleVoltaicConfig};

    // Route declaration
    pub use televoltaic_routing::patterns::{callback, command, include, message, patterns};
    pub use televoltaic_routing::{HandlerRef, Resolver, RouteCollection, RouteResult};

    // Handlers
    pub use televoltaic_routing::{HandlerContext, HandlerError, HandlerResult};

    // Core types
    pub use televoltaic_core::{Bot, BoxedBot, Settings, Update};
}
