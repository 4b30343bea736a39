//! Route table compilation.
//!
//! [`RouteTable::compile`] walks a root [`RouteCollection`] depth-first,
//! resolves every handler and include through a [`RouteResolver`], and
//! flattens the tree into three ordered partitions (commands, callbacks,
//! messages) plus a full-name index. Declaration order is preserved within a
//! partition; included collections are spliced in where the include appears.
//!
//! Namespaces nest outer to inner. An include override is the outer prefix
//! and the included collection's own namespace sits inside it:
//!
//! ```text
//! include("users.routes", namespace = "accounts")
//!   users.routes = patterns("users", [command("profile", .., name = "profile")])
//!   => accounts:users:profile
//! ```
//!
//! A compiled table is immutable. [`SharedRouteTable`] publishes tables to
//! concurrent readers and swaps in a fresh one on reload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{ConfigError, HandlerResolutionError, RouteResult};
use crate::handler::{BoxedHandler, HandlerRef};
use crate::matcher::{Matcher, RouteKind};
use crate::patterns::{Entry, IncludeRef, IncludeTarget, RouteCollection, RouteEntry};
use crate::resolver::RouteResolver;
use televoltaic_core::COMMAND_MARKER;

// ============================================================================
// CompiledRoute
// ============================================================================

/// A flattened route with its handler resolved.
#[derive(Clone)]
pub struct CompiledRoute {
    full_name: Option<String>,
    matcher: Matcher,
    handler_ref: HandlerRef,
    handler: BoxedHandler,
}

impl CompiledRoute {
    /// Namespaced name such as `users:profile`; `None` for unnamed routes.
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn kind(&self) -> RouteKind {
        self.matcher.kind()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// The reference the route was declared with.
    pub fn handler_ref(&self) -> &HandlerRef {
        &self.handler_ref
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

impl PartialEq for CompiledRoute {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
            && self.matcher == other.matcher
            && self.handler_ref == other.handler_ref
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("full_name", &self.full_name)
            .field("kind", &self.kind())
            .field("matcher", &self.matcher.source())
            .field("handler", &self.handler_ref.describe())
            .finish()
    }
}

// ============================================================================
// RouteTable
// ============================================================================

/// The compiled, read-only form of a route tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    commands: Vec<Arc<CompiledRoute>>,
    callbacks: Vec<Arc<CompiledRoute>>,
    messages: Vec<Arc<CompiledRoute>>,
    names: HashMap<String, Arc<CompiledRoute>>,
}

impl RouteTable {
    /// Compiles `root` into a table.
    ///
    /// # Errors
    ///
    /// - [`HandlerResolutionError`] for the first handler the resolver does
    ///   not know
    /// - [`ConfigError::UnresolvedInclude`] / [`ConfigError::IncludeCycle`]
    ///   for bad includes
    /// - [`ConfigError::DuplicateName`] naming the first repeated full name
    ///   in traversal order
    pub fn compile(root: &RouteCollection, resolver: &dyn RouteResolver) -> RouteResult<Self> {
        Compiler::new(resolver).run(root, None)
    }

    /// Resolves the root collection from a descriptor, then compiles it.
    pub fn compile_path(path: &str, resolver: &dyn RouteResolver) -> RouteResult<Self> {
        let root = resolver
            .resolve_routes(path)
            .ok_or_else(|| ConfigError::UnresolvedInclude(path.to_string()))??;
        Compiler::new(resolver).run(&root, Some(path))
    }

    /// The ordered routes of one kind.
    pub fn routes(&self, kind: RouteKind) -> &[Arc<CompiledRoute>] {
        match kind {
            RouteKind::Command => &self.commands,
            RouteKind::Callback => &self.callbacks,
            RouteKind::Message => &self.messages,
        }
    }

    /// Looks up a route by full name.
    pub fn get(&self, full_name: &str) -> Option<&Arc<CompiledRoute>> {
        self.names.get(full_name)
    }

    /// Total number of routes across all kinds.
    pub fn len(&self) -> usize {
        self.commands.len() + self.callbacks.len() + self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All full names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Rebuilds the command text that would reach the named command route.
    ///
    /// Returns `None` if the name is unknown or not a command route.
    pub fn reverse(&self, full_name: &str, args: &[&str]) -> Option<String> {
        let Matcher::Command(matcher) = &self.get(full_name)?.matcher else {
            return None;
        };
        let mut text = format!("{COMMAND_MARKER}{}", matcher.token());
        for arg in args {
            text.push(' ');
            text.push_str(arg);
        }
        Some(text)
    }

    fn push(&mut self, route: Arc<CompiledRoute>) {
        match route.kind() {
            RouteKind::Command => self.commands.push(route),
            RouteKind::Callback => self.callbacks.push(route),
            RouteKind::Message => self.messages.push(route),
        }
    }
}

// ============================================================================
// Compiler
// ============================================================================

struct Compiler<'a> {
    resolver: &'a dyn RouteResolver,
    /// Enclosing namespaces, outermost first.
    namespaces: Vec<String>,
    /// Include descriptors currently being expanded.
    include_stack: Vec<String>,
    /// Handlers already resolved during this pass.
    handlers: HashMap<String, BoxedHandler>,
    first_duplicate: Option<String>,
    table: RouteTable,
}

impl<'a> Compiler<'a> {
    fn new(resolver: &'a dyn RouteResolver) -> Self {
        Self {
            resolver,
            namespaces: Vec::new(),
            include_stack: Vec::new(),
            handlers: HashMap::new(),
            first_duplicate: None,
            table: RouteTable::default(),
        }
    }

    fn run(mut self, root: &RouteCollection, root_path: Option<&str>) -> RouteResult<RouteTable> {
        if let Some(path) = root_path {
            self.include_stack.push(path.to_string());
        }
        self.visit(root)?;

        if let Some(name) = self.first_duplicate {
            return Err(ConfigError::DuplicateName(name).into());
        }

        let table = self.table;
        debug!(
            commands = table.commands.len(),
            callbacks = table.callbacks.len(),
            messages = table.messages.len(),
            named = table.names.len(),
            handlers_resolved = self.handlers.len(),
            "Route table compiled"
        );
        Ok(table)
    }

    fn visit(&mut self, collection: &RouteCollection) -> RouteResult<()> {
        let pushed = self.push_namespace(collection.namespace());
        for entry in collection.entries() {
            match entry {
                Entry::Route(route) => self.add_route(route)?,
                Entry::Include(include) => self.expand(include)?,
            }
        }
        self.pop_namespace(pushed);
        Ok(())
    }

    fn add_route(&mut self, entry: &RouteEntry) -> RouteResult<()> {
        let full_name = entry.name.as_deref().map(|name| self.qualify(name));
        let handler = self.resolve_handler(&entry.handler, full_name.as_deref())?;

        trace!(
            kind = %entry.kind(),
            name = full_name.as_deref().unwrap_or("-"),
            matcher = entry.matcher.source(),
            handler = entry.handler.describe(),
            "Compiled route"
        );

        let route = Arc::new(CompiledRoute {
            full_name,
            matcher: entry.matcher.clone(),
            handler_ref: entry.handler.clone(),
            handler,
        });

        if let Some(name) = &route.full_name {
            if self.table.names.contains_key(name) {
                self.first_duplicate.get_or_insert_with(|| name.clone());
            } else {
                self.table.names.insert(name.clone(), Arc::clone(&route));
            }
        }
        self.table.push(route);
        Ok(())
    }

    fn expand(&mut self, include: &IncludeRef) -> RouteResult<()> {
        let pushed_override = self.push_namespace(include.namespace.as_deref());

        match &include.target {
            IncludeTarget::Inline(collection) => self.visit(collection)?,
            IncludeTarget::Path(path) => {
                if let Some(start) = self.include_stack.iter().position(|p| p == path) {
                    let mut chain = self.include_stack[start..].to_vec();
                    chain.push(path.clone());
                    return Err(ConfigError::IncludeCycle(chain.join(" -> ")).into());
                }

                let collection = self
                    .resolver
                    .resolve_routes(path)
                    .ok_or_else(|| ConfigError::UnresolvedInclude(include.target.describe()))??;

                self.include_stack.push(path.clone());
                self.visit(&collection)?;
                self.include_stack.pop();
            }
        }

        self.pop_namespace(pushed_override);
        Ok(())
    }

    fn resolve_handler(
        &mut self,
        handler: &HandlerRef,
        route: Option<&str>,
    ) -> Result<BoxedHandler, HandlerResolutionError> {
        let path = match handler {
            HandlerRef::Direct { handler, .. } => return Ok(Arc::clone(handler)),
            HandlerRef::Path(path) => path,
        };

        if let Some(cached) = self.handlers.get(path) {
            return Ok(Arc::clone(cached));
        }

        let resolved = self
            .resolver
            .resolve_handler(path)
            .ok_or_else(|| HandlerResolutionError {
                path: path.clone(),
                route: route.map(str::to_string),
            })?;
        self.handlers.insert(path.clone(), Arc::clone(&resolved));
        Ok(resolved)
    }

    fn qualify(&self, name: &str) -> String {
        if self.namespaces.is_empty() {
            name.to_string()
        } else {
            format!("{}:{name}", self.namespaces.join(":"))
        }
    }

    fn push_namespace(&mut self, namespace: Option<&str>) -> bool {
        match namespace {
            Some(ns) => {
                self.namespaces.push(ns.to_string());
                true
            }
            None => false,
        }
    }

    fn pop_namespace(&mut self, pushed: bool) {
        if pushed {
            self.namespaces.pop();
        }
    }
}

// ============================================================================
// SharedRouteTable
// ============================================================================

/// The current route table, shared between the dispatcher and reloaders.
///
/// Readers take a snapshot with [`load`](Self::load) and never block.
/// Writers are serialized; a reload builds the new table outside the swap
/// and publishes it in one step, so a reader sees either the whole old
/// table or the whole new one.
#[derive(Clone)]
pub struct SharedRouteTable {
    current: Arc<ArcSwap<RouteTable>>,
    writer: Arc<Mutex<()>>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Returns a snapshot of the current table.
    pub fn load(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Replaces the current table.
    pub fn store(&self, table: RouteTable) {
        let _guard = self.writer.lock();
        self.current.store(Arc::new(table));
    }

    /// Builds a new table with `build` and publishes it.
    ///
    /// On error the current table stays in place.
    pub fn reload<F>(&self, build: F) -> RouteResult<Arc<RouteTable>>
    where
        F: FnOnce() -> RouteResult<RouteTable>,
    {
        let _guard = self.writer.lock();
        let table = Arc::new(build()?);
        self.current.store(Arc::clone(&table));
        debug!(routes = table.len(), "Route table reloaded");
        Ok(table)
    }
}

impl Default for SharedRouteTable {
    fn default() -> Self {
        Self::new(RouteTable::default())
    }
}

impl fmt::Debug for SharedRouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRouteTable")
            .field("routes", &self.current.load().len())
            .finish()
    }
}
