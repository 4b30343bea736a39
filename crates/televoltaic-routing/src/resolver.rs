//! Reference resolution.
//!
//! Route declarations name handlers and nested collections by descriptor
//! (`users.handlers.profile`, `users.routes:admin`). The compiler turns those
//! descriptors into values through a [`RouteResolver`]; nothing is looked up
//! dynamically at dispatch time.
//!
//! [`Resolver`] is the stock implementation: an explicit registry filled at
//! startup. Route collections may be registered as factories so they are
//! only built when some include actually reaches them, which allows
//! collections to reference each other regardless of declaration order.
//!
//! ```rust
//! use std::sync::Arc;
//! use televoltaic_routing::patterns::{command, patterns};
//! use televoltaic_routing::{HandlerContext, Resolver, RouteResolver, Update};
//!
//! async fn start(_update: Arc<Update>, _ctx: HandlerContext) -> &'static str {
//!     "welcome"
//! }
//!
//! let resolver = Resolver::new()
//!     .handler("core.handlers.start", start)
//!     .routes_with("core.routes", || patterns(None, [command("start", "core.handlers.start", None)]));
//!
//! assert!(resolver.resolve_handler("core.handlers.start").is_some());
//! assert!(resolver.resolve_routes("core.routes").is_some());
//! assert!(resolver.resolve_routes("missing.routes").is_none());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RouteResult;
use crate::handler::{BoxedHandler, Handler, into_handler};
use crate::patterns::RouteCollection;

/// Resolves descriptors to handlers and route collections.
pub trait RouteResolver: Send + Sync {
    /// Looks up a handler; `None` if the descriptor is unknown.
    fn resolve_handler(&self, path: &str) -> Option<BoxedHandler>;

    /// Looks up a route collection; `None` if the descriptor is unknown.
    ///
    /// A lazily-built collection may itself fail to build, hence the inner
    /// result.
    fn resolve_routes(&self, path: &str) -> Option<RouteResult<RouteCollection>>;
}

type RoutesFactory = Arc<dyn Fn() -> RouteResult<RouteCollection> + Send + Sync>;

#[derive(Clone)]
enum RoutesSource {
    Ready(RouteCollection),
    Lazy(RoutesFactory),
}

/// Explicit descriptor registry.
#[derive(Clone, Default)]
pub struct Resolver {
    handlers: HashMap<String, BoxedHandler>,
    routes: HashMap<String, RoutesSource>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `path`, replacing any previous one.
    pub fn handler<H, R>(mut self, path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<R>,
        R: 'static,
    {
        self.handlers.insert(path.into(), into_handler(handler));
        self
    }

    /// Registers an already boxed handler.
    pub fn boxed_handler(mut self, path: impl Into<String>, handler: BoxedHandler) -> Self {
        self.handlers.insert(path.into(), handler);
        self
    }

    /// Registers a built collection under `path`.
    pub fn routes(mut self, path: impl Into<String>, collection: RouteCollection) -> Self {
        self.routes.insert(path.into(), RoutesSource::Ready(collection));
        self
    }

    /// Registers a collection built on demand each time it is resolved.
    pub fn routes_with<F>(mut self, path: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> RouteResult<RouteCollection> + Send + Sync + 'static,
    {
        self.routes.insert(path.into(), RoutesSource::Lazy(Arc::new(factory)));
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn routes_count(&self) -> usize {
        self.routes.len()
    }
}

impl RouteResolver for Resolver {
    fn resolve_handler(&self, path: &str) -> Option<BoxedHandler> {
        self.handlers.get(path).cloned()
    }

    fn resolve_routes(&self, path: &str) -> Option<RouteResult<RouteCollection>> {
        match self.routes.get(path)? {
            RoutesSource::Ready(collection) => Some(Ok(collection.clone())),
            RoutesSource::Lazy(factory) => Some(factory()),
        }
    }
}

impl<T: RouteResolver + ?Sized> RouteResolver for Arc<T> {
    fn resolve_handler(&self, path: &str) -> Option<BoxedHandler> {
        (**self).resolve_handler(path)
    }

    fn resolve_routes(&self, path: &str) -> Option<RouteResult<RouteCollection>> {
        (**self).resolve_routes(path)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        let mut routes: Vec<_> = self.routes.keys().collect();
        handlers.sort();
        routes.sort();
        f.debug_struct("Resolver")
            .field("handlers", &handlers)
            .field("routes", &routes)
            .finish()
    }
}
