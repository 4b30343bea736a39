//! Handler system.
//!
//! A handler is any async function taking the update and a
//! [`HandlerContext`]:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use televoltaic_routing::{HandlerContext, Update};
//!
//! // No return value
//! async fn log_it(update: Arc<Update>, _ctx: HandlerContext) {
//!     tracing::info!(update_id = update.update_id, "seen");
//! }
//!
//! // Return a String - it is sent back as a reply
//! async fn greet(_update: Arc<Update>, _ctx: HandlerContext) -> String {
//!     "Hello!".to_string()
//! }
//!
//! // Return a Result - errors propagate to the caller of `dispatch`
//! async fn profile(_update: Arc<Update>, ctx: HandlerContext) -> Result<String, std::io::Error> {
//!     Ok(format!("profile of {}", ctx.capture(0).unwrap_or("you")))
//! }
//! ```
//!
//! The dispatcher stores handlers type-erased as [`BoxedHandler`]. Route
//! declarations refer to handlers either by a path descriptor resolved at
//! compile time or directly through [`HandlerRef::direct`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::BoxError;

use crate::context::HandlerContext;
use televoltaic_core::Update;

/// Error returned by a failing handler.
pub type HandlerError = BoxError;

/// Result of a handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// HandlerResponse
// ============================================================================

/// A trait for types that can be returned from handlers.
#[async_trait]
pub trait HandlerResponse: Send + 'static {
    /// Performs the side effects of the response (e.g. sending a reply).
    async fn process_response(self, ctx: &HandlerContext) -> HandlerResult;
}

/// Implementation for `()` - no response needed.
#[async_trait]
impl HandlerResponse for () {
    async fn process_response(self, _ctx: &HandlerContext) -> HandlerResult {
        Ok(())
    }
}

/// Implementation for `String` - sent as a reply to the update's origin.
#[async_trait]
impl HandlerResponse for String {
    async fn process_response(self, ctx: &HandlerContext) -> HandlerResult {
        ctx.reply(&self).await?;
        Ok(())
    }
}

#[async_trait]
impl HandlerResponse for &'static str {
    async fn process_response(self, ctx: &HandlerContext) -> HandlerResult {
        ctx.reply(self).await?;
        Ok(())
    }
}

/// Implementation for `Option<T>` where T implements HandlerResponse.
///
/// On Some, the inner value's response is handled. On None, no action is taken.
#[async_trait]
impl<T: HandlerResponse> HandlerResponse for Option<T> {
    async fn process_response(self, ctx: &HandlerContext) -> HandlerResult {
        match self {
            Some(t) => t.process_response(ctx).await,
            None => Ok(()),
        }
    }
}

/// Implementation for `Result<T, E>` where T implements HandlerResponse.
///
/// On Ok, the inner value's response is handled. On Err, the error is
/// returned to the caller unchanged.
#[async_trait]
impl<T, E> HandlerResponse for Result<T, E>
where
    T: HandlerResponse,
    E: Into<BoxError> + Send + 'static,
{
    async fn process_response(self, ctx: &HandlerContext) -> HandlerResult {
        match self {
            Ok(t) => t.process_response(ctx).await,
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for route handlers.
///
/// Automatically implemented for async functions and closures of the shape
/// `Fn(Arc<Update>, HandlerContext) -> impl Future<Output = R>` where `R`
/// implements [`HandlerResponse`].
pub trait Handler<R>: Clone + Send + Sync + 'static {
    /// Calls the handler with the update and its context.
    fn call(self, update: Arc<Update>, ctx: HandlerContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, R> Handler<R> for F
where
    F: FnOnce(Arc<Update>, HandlerContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerResponse,
{
    fn call(self, update: Arc<Update>, ctx: HandlerContext) -> BoxFuture<'static, HandlerResult> {
        async move {
            let res = (self)(update, ctx.clone()).await;
            res.process_response(&ctx).await
        }
        .boxed()
    }
}

// ============================================================================
// BoxedHandler - Type-erased handler stored in route tables
// ============================================================================

/// A type-erased handler that can be stored in collections.
///
/// Internally a closure that captures the original handler and calls it
/// with a cloned copy on each invocation.
pub type BoxedHandler =
    Arc<dyn Fn(Arc<Update>, HandlerContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Convert a handler function into a boxed handler.
pub fn into_handler<H, R>(h: H) -> BoxedHandler
where
    H: Handler<R>,
    R: 'static,
{
    Arc::new(move |update, ctx| h.clone().call(update, ctx))
}

// ============================================================================
// HandlerRef
// ============================================================================

/// How a route refers to its handler.
///
/// Path references are resolved through a
/// [`RouteResolver`](crate::resolver::RouteResolver) when the route table is
/// compiled, so routes can be declared before the handler modules exist.
#[derive(Clone)]
pub enum HandlerRef {
    /// Dotted path such as `users.handlers.profile`.
    Path(String),
    /// An already-built handler, labelled for diagnostics.
    Direct { label: String, handler: BoxedHandler },
}

impl HandlerRef {
    /// Wraps a handler function directly.
    pub fn direct<H, R>(label: impl Into<String>, handler: H) -> Self
    where
        H: Handler<R>,
        R: 'static,
    {
        Self::Direct {
            label: label.into(),
            handler: into_handler(handler),
        }
    }

    /// Wraps an already boxed handler.
    pub fn boxed(label: impl Into<String>, handler: BoxedHandler) -> Self {
        Self::Direct {
            label: label.into(),
            handler,
        }
    }

    /// The path or label, for logs and error messages.
    pub fn describe(&self) -> &str {
        match self {
            Self::Path(path) => path,
            Self::Direct { label, .. } => label,
        }
    }
}

impl PartialEq for HandlerRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Path(a), Self::Path(b)) => a == b,
            (Self::Direct { handler: a, .. }, Self::Direct { handler: b, .. }) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Direct { label, .. } => f.debug_struct("Direct").field("label", label).finish_non_exhaustive(),
        }
    }
}

impl From<&str> for HandlerRef {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

/// Checks that `descriptor` is a dotted path of identifier segments.
///
/// A single `:attr` suffix is accepted when `allow_attr` is set, as used by
/// route collection references (`project.routes:admin`).
pub fn is_valid_descriptor(descriptor: &str, allow_attr: bool) -> bool {
    let (path, attr) = match descriptor.split_once(':') {
        Some((path, attr)) if allow_attr => (path, Some(attr)),
        Some(_) => return false,
        None => (descriptor, None),
    };

    let is_ident = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    path.split('.').all(is_ident) && attr.is_none_or(is_ident)
}
