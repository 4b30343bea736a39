//! Route declaration.
//!
//! Routes are plain values assembled with the builder functions in this
//! module. Nothing is registered globally; a collection only takes effect when
//! it is compiled into a [`RouteTable`](crate::RouteTable).
//!
//! ```rust
//! use televoltaic_routing::patterns::{callback, command, include, message, patterns};
//!
//! let users = patterns(Some("users"), [
//!     command("profile", "users.handlers.profile", Some("profile")),
//!     callback(r"^user:(\d+)$", "users.handlers.show", Some("show")),
//! ])
//! .unwrap();
//!
//! let root = patterns(None, [
//!     command("start", "core.handlers.start", Some("start")),
//!     include(users, Some("accounts")),
//!     message(".*", "core.handlers.fallback", None),
//! ])
//! .unwrap();
//!
//! assert_eq!(root.len(), 3);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{ConfigError, RouteResult};
use crate::handler::{HandlerRef, is_valid_descriptor};
use crate::matcher::{Matcher, RouteKind};

/// Returns `true` for a non-empty `[A-Za-z0-9_-]` identifier.
pub(crate) fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ============================================================================
// Entries
// ============================================================================

/// A matcher bound to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    pub matcher: Matcher,
    pub handler: HandlerRef,
    /// Local name, unique within the enclosing namespace.
    pub name: Option<String>,
}

impl RouteEntry {
    pub fn kind(&self) -> RouteKind {
        self.matcher.kind()
    }
}

/// What an [`IncludeRef`] points at.
#[derive(Debug, Clone, PartialEq)]
pub enum IncludeTarget {
    /// Descriptor resolved at compile time, e.g. `users.routes` or
    /// `users.routes:admin`.
    Path(String),
    /// A collection value built in place.
    Inline(RouteCollection),
}

impl IncludeTarget {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.clone(),
            Self::Inline(collection) => match &collection.namespace {
                Some(ns) => format!("<inline {ns}>"),
                None => "<inline>".to_string(),
            },
        }
    }
}

impl From<&str> for IncludeTarget {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for IncludeTarget {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<RouteCollection> for IncludeTarget {
    fn from(collection: RouteCollection) -> Self {
        Self::Inline(collection)
    }
}

/// A nested collection, optionally mounted under an extra namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeRef {
    pub target: IncludeTarget,
    /// Outer prefix; the included collection's own namespace nests inside it.
    pub namespace: Option<String>,
}

/// One item of a [`RouteCollection`].
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Route(RouteEntry),
    Include(IncludeRef),
}

// ============================================================================
// RouteCollection
// ============================================================================

/// An ordered, optionally namespaced group of entries.
///
/// Collections are immutable and cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCollection {
    namespace: Option<String>,
    entries: Arc<Vec<Entry>>,
}

impl RouteCollection {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builds a route collection.
///
/// Entries are taken as results so builder calls can be listed inline; the
/// first error is returned. Two routes of this collection declaring the same
/// name are rejected here. Clashes across collections are detected when the
/// table is compiled.
pub fn patterns<I>(namespace: Option<&str>, entries: I) -> RouteResult<RouteCollection>
where
    I: IntoIterator<Item = RouteResult<Entry>>,
{
    if let Some(ns) = namespace
        && !is_valid_identifier(ns)
    {
        return Err(ConfigError::InvalidNamespace(ns.to_string()).into());
    }

    let entries = entries.into_iter().collect::<RouteResult<Vec<_>>>()?;

    let mut seen = HashSet::new();
    for entry in &entries {
        if let Entry::Route(RouteEntry { name: Some(name), .. }) = entry
            && !seen.insert(name.as_str())
        {
            let full = match namespace {
                Some(ns) => format!("{ns}:{name}"),
                None => name.clone(),
            };
            return Err(ConfigError::DuplicateName(full).into());
        }
    }

    Ok(RouteCollection {
        namespace: namespace.map(str::to_string),
        entries: Arc::new(entries),
    })
}

/// Declares a command route matching `/token`.
pub fn command(token: &str, handler: impl Into<HandlerRef>, name: Option<&str>) -> RouteResult<Entry> {
    route(Matcher::command(token)?, handler.into(), name)
}

/// Declares a route matching message text by regex search.
pub fn message(pattern: &str, handler: impl Into<HandlerRef>, name: Option<&str>) -> RouteResult<Entry> {
    route(Matcher::message(pattern)?, handler.into(), name)
}

/// Declares a route matching callback data by regex search.
pub fn callback(pattern: &str, handler: impl Into<HandlerRef>, name: Option<&str>) -> RouteResult<Entry> {
    route(Matcher::callback(pattern)?, handler.into(), name)
}

/// Mounts another collection, by descriptor or inline.
pub fn include(target: impl Into<IncludeTarget>, namespace: Option<&str>) -> RouteResult<Entry> {
    let target = target.into();
    if let IncludeTarget::Path(path) = &target
        && !is_valid_descriptor(path, true)
    {
        return Err(ConfigError::InvalidReference(path.clone()).into());
    }
    if let Some(ns) = namespace
        && !is_valid_identifier(ns)
    {
        return Err(ConfigError::InvalidNamespace(ns.to_string()).into());
    }

    Ok(Entry::Include(IncludeRef {
        target,
        namespace: namespace.map(str::to_string),
    }))
}

fn route(matcher: Matcher, handler: HandlerRef, name: Option<&str>) -> RouteResult<Entry> {
    if let HandlerRef::Path(path) = &handler
        && !is_valid_descriptor(path, false)
    {
        return Err(ConfigError::InvalidReference(path.clone()).into());
    }
    if let Some(name) = name
        && !is_valid_identifier(name)
    {
        return Err(ConfigError::InvalidName(name.to_string()).into());
    }

    Ok(Entry::Route(RouteEntry {
        matcher,
        handler,
        name: name.map(str::to_string),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouteError;

    fn config_err<T: std::fmt::Debug>(result: RouteResult<T>) -> ConfigError {
        match result.unwrap_err() {
            RouteError::Config(e) => e,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_collection_preserves_order() {
        let coll = patterns(
            Some("shop"),
            [
                command("buy", "shop.buy", Some("buy")),
                message("^price", "shop.price", None),
                include("shop.admin.routes", None),
            ],
        )
        .unwrap();

        assert_eq!(coll.namespace(), Some("shop"));
        assert_eq!(coll.len(), 3);
        assert!(matches!(&coll.entries()[0], Entry::Route(r) if r.kind() == RouteKind::Command));
        assert!(matches!(&coll.entries()[1], Entry::Route(r) if r.kind() == RouteKind::Message));
        assert!(matches!(&coll.entries()[2], Entry::Include(_)));
    }

    #[test]
    fn test_invalid_namespace() {
        assert_eq!(
            config_err(patterns(Some(""), [])),
            ConfigError::InvalidNamespace(String::new())
        );
        assert_eq!(
            config_err(patterns(Some("a:b"), [])),
            ConfigError::InvalidNamespace("a:b".into())
        );
        assert!(patterns(Some("user-admin_2"), []).is_ok());
        assert_eq!(
            config_err(include("a.routes", Some("x y"))),
            ConfigError::InvalidNamespace("x y".into())
        );
    }

    #[test]
    fn test_invalid_references() {
        assert_eq!(
            config_err(command("start", "", None)),
            ConfigError::InvalidReference(String::new())
        );
        assert_eq!(
            config_err(command("start", "app..start", None)),
            ConfigError::InvalidReference("app..start".into())
        );
        assert_eq!(
            config_err(message("x", "app.handlers:start", None)),
            ConfigError::InvalidReference("app.handlers:start".into())
        );
        assert_eq!(
            config_err(include("app routes", None)),
            ConfigError::InvalidReference("app routes".into())
        );
        assert!(include("app.routes:admin", None).is_ok());
    }

    #[test]
    fn test_invalid_name() {
        assert_eq!(
            config_err(command("start", "app.start", Some("a:b"))),
            ConfigError::InvalidName("a:b".into())
        );
    }

    #[test]
    fn test_duplicate_name_in_collection() {
        let err = config_err(patterns(
            Some("core"),
            [
                command("start", "core.start", Some("start")),
                message("^start$", "core.start_text", Some("start")),
            ],
        ));
        assert_eq!(err, ConfigError::DuplicateName("core:start".into()));
    }

    #[test]
    fn test_first_entry_error_is_returned() {
        let err = patterns(
            None,
            [
                command("ok", "app.ok", None),
                message("(bad", "app.bad", None),
                command("/worse", "app.worse", None),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RouteError::Pattern(p) if p.pattern == "(bad"));
    }

    #[test]
    fn test_inline_include() {
        let inner = patterns(Some("inner"), [command("a", "x.a", None)]).unwrap();
        let Entry::Include(inc) = include(inner.clone(), Some("outer")).unwrap() else {
            panic!("expected include");
        };
        assert_eq!(inc.target, IncludeTarget::Inline(inner));
        assert_eq!(inc.namespace.as_deref(), Some("outer"));
        assert_eq!(inc.target.describe(), "<inline inner>");
    }
}
