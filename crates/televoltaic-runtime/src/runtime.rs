//! Main runtime orchestration.
//!
//! [`TeleVoltaic`] ties the pieces together: it loads settings, compiles the
//! root route collection named by `root_routes`, and feeds updates from a
//! transport to the dispatcher, one task per update.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use televoltaic_runtime::TeleVoltaic;
//!
//! let runtime = TeleVoltaic::builder()
//!     .config_file("config/televoltaic.toml")
//!     .resolver(resolver)
//!     .bot(bot)
//!     .build()?;
//!
//! // Any `Stream<Item = Update>`: long polling, a webhook channel, a test vector.
//! runtime.run(updates).await?;
//! ```
//!
//! Routes can be recompiled while running with [`TeleVoltaic::reload`];
//! dispatches already in flight finish against the table they started with.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigLoader, TeleVoltaicConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use televoltaic_core::{BoxedBot, Settings, Update};
use televoltaic_routing::{
    DispatchOutcome, Dispatcher, MetricsHook, RouteResolver, RouteTable, SharedRouteTable,
    StateBackend,
};

/// The TeleVoltaic runtime.
pub struct TeleVoltaic {
    config: TeleVoltaicConfig,
    resolver: Arc<dyn RouteResolver>,
    dispatcher: Dispatcher,
    /// Bounds concurrent dispatches when `dispatch.max_concurrency` is set.
    limiter: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl TeleVoltaic {
    /// Creates a runtime builder that loads settings from files and the
    /// environment.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from already-loaded configuration.
    ///
    /// Initializes logging and compiles the collection named by
    /// `root_routes` through `resolver`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Settings`] if `config` fails validation,
    /// [`RuntimeError::MissingRootRoutes`] when `root_routes` is unset, or
    /// the route error if the collection does not compile.
    pub fn from_config(
        config: TeleVoltaicConfig,
        resolver: impl RouteResolver + 'static,
        bot: BoxedBot,
    ) -> RuntimeResult<Self> {
        Self::assemble(config, Arc::new(resolver), bot, None, None)
    }

    fn assemble(
        config: TeleVoltaicConfig,
        resolver: Arc<dyn RouteResolver>,
        bot: BoxedBot,
        state: Option<Arc<dyn StateBackend>>,
        metrics: Option<Arc<dyn MetricsHook>>,
    ) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging, config.settings.debug);

        let root = config
            .settings
            .root_routes
            .as_deref()
            .ok_or(RuntimeError::MissingRootRoutes)?;
        let table = RouteTable::compile_path(root, resolver.as_ref())?;

        info!(
            root_routes = root,
            routes = table.len(),
            bot = bot.id(),
            debug = config.settings.debug,
            "Runtime initialized"
        );

        let mut dispatcher = Dispatcher::new(
            SharedRouteTable::new(table),
            bot,
            Arc::new(config.settings.clone()),
        );
        if let Some(state) = state {
            dispatcher = dispatcher.with_state_backend(state);
        }
        if let Some(metrics) = metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }

        let limiter = config
            .dispatch
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n)));

        Ok(Self {
            config,
            resolver,
            dispatcher,
            limiter,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &TeleVoltaicConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        self.dispatcher.settings()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn routes(&self) -> &SharedRouteTable {
        self.dispatcher.routes()
    }

    /// Recompiles `root_routes` and swaps the new table in.
    ///
    /// Reloads are serialized. On failure the current table stays active.
    pub fn reload(&self) -> RuntimeResult<Arc<RouteTable>> {
        let root = self
            .config
            .settings
            .root_routes
            .as_deref()
            .ok_or(RuntimeError::MissingRootRoutes)?;

        match self
            .routes()
            .reload(|| RouteTable::compile_path(root, self.resolver.as_ref()))
        {
            Ok(table) => {
                info!(routes = table.len(), "Routes reloaded");
                Ok(table)
            }
            Err(e) => {
                warn!(error = %e, "Route reload failed, keeping current routes");
                Err(e.into())
            }
        }
    }

    /// Dispatches `update` on its own task.
    ///
    /// The task waits for a concurrency permit, applies the handler timeout
    /// and stops early on shutdown. Handler errors and panics are logged and
    /// never escape the task.
    pub fn spawn_update(&self, update: Update) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let limiter = self.limiter.clone();
        let timeout = self.config.dispatch.handler_timeout();
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move {
            let update_id = update.update_id;

            let _permit = match limiter {
                Some(limiter) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(update_id, "Shutdown before dispatch, dropping update");
                        return;
                    }
                    permit = limiter.acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => return,
                    },
                },
                None => None,
            };

            let dispatch = dispatcher.dispatch_with_cancel(Arc::new(update), cancel.clone());
            let work = AssertUnwindSafe(dispatch).catch_unwind();
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => {
                        cancel.cancel();
                        let timeout_ms = limit.as_millis() as u64;
                        warn!(update_id, timeout_ms, "Handler timed out");
                        return;
                    }
                },
                None => work.await,
            };

            match result {
                Ok(Ok(DispatchOutcome::NoMatch { kind })) => {
                    trace!(update_id, ?kind, "No route for update");
                }
                Ok(Ok(outcome)) => trace!(update_id, ?outcome, "Update processed"),
                Ok(Err(e)) => error!(update_id, error = %e, "Handler failed"),
                Err(_) => error!(update_id, "Handler panicked"),
            }
        })
    }

    /// Dispatches every update from `updates` until the stream ends or
    /// [`shutdown`](Self::shutdown) is called, then waits for in-flight
    /// updates to finish.
    pub async fn run_stream<S>(&self, updates: S) -> RuntimeResult<()>
    where
        S: Stream<Item = Update> + Send,
    {
        let mut updates = std::pin::pin!(updates);
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        info!("Dispatching updates");
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping update intake");
                    break;
                }
                next = updates.next() => next,
            };

            let Some(update) = next else {
                debug!("Update stream ended");
                break;
            };

            in_flight.retain(|task| !task.is_finished());
            in_flight.push(self.spawn_update(update));
        }

        for task in in_flight {
            // Panics are caught inside the task; a join error here means it was aborted.
            if let Err(e) = task.await {
                debug!(error = %e, "Update task did not complete");
            }
        }

        info!("Runtime stopped");
        Ok(())
    }

    /// Like [`run_stream`](Self::run_stream), but also shuts down on Ctrl+C
    /// or SIGTERM.
    pub async fn run<S>(&self, updates: S) -> RuntimeResult<()>
    where
        S: Stream<Item = Update> + Send,
    {
        let token = self.shutdown.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => token.cancel(),
                _ = token.cancelled() => {}
            }
        });

        info!("TeleVoltaic is now running. Press Ctrl+C to stop.");
        let result = self.run_stream(updates).await;
        watcher.abort();
        result
    }

    /// Stops update intake and cancels running handlers.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl fmt::Debug for TeleVoltaic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeleVoltaic")
            .field("dispatcher", &self.dispatcher)
            .field("max_concurrency", &self.config.dispatch.max_concurrency)
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or SIGTERM.
///
/// If no handler can be installed this never resolves; the runtime then only
/// stops through [`TeleVoltaic::shutdown`] or the end of the stream.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = signal::ctrl_c() => match result {
                        Ok(()) => info!("Received Ctrl+C, shutting down"),
                        Err(e) => {
                            warn!(error = %e, "Failed to listen for Ctrl+C");
                            sigterm.recv().await;
                            info!("Received SIGTERM, shutting down");
                        }
                    },
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`TeleVoltaic`] runtime.
///
/// Settings are loaded with a [`ConfigLoader`] searching the current
/// directory; the resolver and bot must be supplied.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    resolver: Option<Arc<dyn RouteResolver>>,
    bot: Option<BoxedBot>,
    state: Option<Arc<dyn StateBackend>>,
    metrics: Option<Arc<dyn MetricsHook>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            resolver: None,
            bot: None,
            state: None,
            metrics: None,
        }
    }

    /// Sets a specific settings file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the settings profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for settings files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading `TELEVOLTAIC_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Overrides a single settings key, e.g. `("root_routes", "app.routes")`.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Replaces the settings loader entirely.
    pub fn config_loader(mut self, loader: ConfigLoader) -> Self {
        self.config_loader = loader;
        self
    }

    pub fn resolver(mut self, resolver: impl RouteResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn bot(mut self, bot: BoxedBot) -> Self {
        self.bot = Some(bot);
        self
    }

    pub fn state_backend(mut self, state: Arc<dyn StateBackend>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsHook>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Loads settings and builds the runtime.
    pub fn build(self) -> RuntimeResult<TeleVoltaic> {
        let resolver = self.resolver.ok_or(RuntimeError::MissingComponent("resolver"))?;
        let bot = self.bot.ok_or(RuntimeError::MissingComponent("bot"))?;
        let config = self.config_loader.load()?;

        TeleVoltaic::assemble(config, resolver, bot, self.state, self.metrics)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use televoltaic_core::{ApiResult, Bot, ChatId};
    use televoltaic_routing::patterns::{command, message, patterns};
    use televoltaic_routing::{HandlerContext, Resolver};

    #[derive(Debug, Default)]
    struct MockBot {
        sent: Mutex<Vec<(ChatId, String)>>,
    }

    impl MockBot {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Bot for MockBot {
        fn id(&self) -> &str {
            "mock"
        }

        async fn send_text(&self, chat: ChatId, text: &str) -> ApiResult<i64> {
            let mut sent = self.sent.lock();
            sent.push((chat, text.to_string()));
            Ok(sent.len() as i64)
        }

        async fn answer_callback(&self, _id: &str, _text: Option<&str>) -> ApiResult<()> {
            Ok(())
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    async fn start(_update: Arc<Update>, _ctx: HandlerContext) -> &'static str {
        "welcome"
    }

    async fn echo(update: Arc<Update>, _ctx: HandlerContext) -> Option<String> {
        update.text().map(str::to_string)
    }

    async fn stall(_update: Arc<Update>, _ctx: HandlerContext) {
        std::future::pending::<()>().await;
    }

    async fn explode(_update: Arc<Update>, _ctx: HandlerContext) {
        panic!("handler bug");
    }

    fn resolver() -> Resolver {
        Resolver::new()
            .handler("core.start", start)
            .handler("core.echo", echo)
            .handler("core.stall", stall)
            .handler("core.explode", explode)
            .routes_with("project.routes", || {
                patterns(
                    None,
                    [
                        command("start", "core.start", Some("start")),
                        command("stall", "core.stall", Some("stall")),
                        command("explode", "core.explode", Some("explode")),
                        message(".*", "core.echo", Some("echo")),
                    ],
                )
            })
    }

    fn config() -> TeleVoltaicConfig {
        let mut config = TeleVoltaicConfig::default();
        config.settings.root_routes = Some("project.routes".into());
        config
    }

    fn runtime(config: TeleVoltaicConfig) -> (TeleVoltaic, Arc<MockBot>) {
        let bot = Arc::new(MockBot::default());
        let runtime = TeleVoltaic::from_config(config, resolver(), bot.clone()).unwrap();
        (runtime, bot)
    }

    #[test]
    fn test_missing_root_routes() {
        let bot = Arc::new(MockBot::default());
        let result = TeleVoltaic::from_config(TeleVoltaicConfig::default(), resolver(), bot);
        assert!(matches!(result, Err(RuntimeError::MissingRootRoutes)));
    }

    #[test]
    fn test_from_config_validates_limits() {
        let mut stalled = config();
        stalled.dispatch.max_concurrency = Some(0);
        let bot = Arc::new(MockBot::default());
        let result = TeleVoltaic::from_config(stalled, resolver(), bot);
        assert!(matches!(result, Err(RuntimeError::Settings(_))));

        let mut instant = config();
        instant.dispatch.handler_timeout_ms = Some(0);
        let bot = Arc::new(MockBot::default());
        let result = TeleVoltaic::from_config(instant, resolver(), bot);
        assert!(matches!(result, Err(RuntimeError::Settings(_))));
    }

    #[test]
    fn test_unresolved_root_routes() {
        let mut config = TeleVoltaicConfig::default();
        config.settings.root_routes = Some("nowhere.routes".into());
        let bot = Arc::new(MockBot::default());
        let result = TeleVoltaic::from_config(config, resolver(), bot);
        assert!(matches!(result, Err(RuntimeError::Route(_))));
    }

    #[test]
    fn test_from_config_compiles_routes() {
        let (runtime, _) = runtime(config());
        let table = runtime.routes().load();
        assert_eq!(table.len(), 4);
        assert_eq!(table.names(), ["echo", "explode", "stall", "start"]);
        assert!(!runtime.is_shutting_down());
    }

    #[test]
    fn test_builder_requires_components() {
        let result = TeleVoltaic::builder().without_env().resolver(resolver()).build();
        assert!(matches!(result, Err(RuntimeError::MissingComponent("bot"))));

        let bot = Arc::new(MockBot::default());
        let result = TeleVoltaic::builder().without_env().bot(bot).build();
        assert!(matches!(result, Err(RuntimeError::MissingComponent("resolver"))));
    }

    #[test]
    fn test_builder_with_overrides() {
        let bot = Arc::new(MockBot::default());
        let runtime = TeleVoltaic::builder()
            .config_loader(ConfigLoader::new().without_env())
            .set("root_routes", "project.routes")
            .set("debug", true)
            .resolver(resolver())
            .bot(bot)
            .build()
            .unwrap();

        assert!(runtime.settings().debug);
        assert_eq!(runtime.routes().load().len(), 4);
    }

    #[test]
    fn test_reload_keeps_table_on_failure() {
        let broken = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&broken);
        let resolver = Resolver::new()
            .handler("core.start", start)
            .routes_with("project.routes", move || {
                let handler = if flag.load(Ordering::SeqCst) {
                    "core.missing"
                } else {
                    "core.start"
                };
                patterns(None, [command("start", handler, Some("start"))])
            });

        let bot = Arc::new(MockBot::default());
        let runtime = TeleVoltaic::from_config(config(), resolver, bot).unwrap();
        let before = runtime.routes().load();

        let reloaded = runtime.reload().unwrap();
        assert_eq!(*reloaded, *before);
        assert!(!Arc::ptr_eq(&reloaded, &before));

        broken.store(true, Ordering::SeqCst);
        assert!(matches!(runtime.reload(), Err(RuntimeError::Route(_))));
        assert!(Arc::ptr_eq(&runtime.routes().load(), &reloaded));
    }

    #[tokio::test]
    async fn test_spawn_update_replies() {
        let (runtime, bot) = runtime(config());

        runtime
            .spawn_update(Update::text_message(1, 42, "/start"))
            .await
            .unwrap();
        runtime
            .spawn_update(Update::text_message(2, 42, "hi there"))
            .await
            .unwrap();

        assert_eq!(bot.texts(), ["welcome", "hi there"]);
        assert_eq!(bot.sent.lock()[0].0, 42);
    }

    #[tokio::test]
    async fn test_spawn_update_contains_panics() {
        let (runtime, bot) = runtime(config());

        let handle = runtime.spawn_update(Update::text_message(1, 42, "/explode"));
        assert!(handle.await.is_ok());

        runtime
            .spawn_update(Update::text_message(2, 42, "/start"))
            .await
            .unwrap();
        assert_eq!(bot.texts(), ["welcome"]);
    }

    #[tokio::test]
    async fn test_handler_timeout() {
        let mut config = config();
        config.dispatch.handler_timeout_ms = Some(20);
        let (runtime, bot) = runtime(config);

        let handle = runtime.spawn_update(Update::text_message(1, 42, "/stall"));
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("timed-out handler should finish its task")
            .unwrap();
        assert!(bot.texts().is_empty());
    }

    #[tokio::test]
    async fn test_run_stream_until_end() {
        let (runtime, bot) = runtime(config());
        let updates = futures::stream::iter(vec![
            Update::text_message(1, 1, "/start"),
            Update::text_message(2, 1, "ping"),
            Update::text_message(3, 1, "/unknown"),
        ]);

        runtime.run_stream(updates).await.unwrap();

        let mut texts = bot.texts();
        texts.sort();
        assert_eq!(texts, ["ping", "welcome"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run_stream() {
        let (runtime, bot) = runtime(config());
        let runtime = Arc::new(runtime);

        let task = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move {
                let updates = futures::stream::iter(vec![Update::text_message(1, 1, "/stall")])
                    .chain(futures::stream::pending());
                runtime.run_stream(updates).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        runtime.shutdown();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("run_stream should return after shutdown")
            .unwrap()
            .unwrap();
        assert!(runtime.is_shutting_down());
        assert!(bot.texts().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_max_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let slow = {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            move |_update: Arc<Update>, _ctx: HandlerContext| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            }
        };
        let resolver = Resolver::new()
            .handler("core.slow", slow)
            .routes_with("project.routes", || {
                patterns(None, [message(".*", "core.slow", None)])
            });

        let mut config = config();
        config.dispatch.max_concurrency = Some(1);
        let bot = Arc::new(MockBot::default());
        let runtime = TeleVoltaic::from_config(config, resolver, bot).unwrap();

        let updates = futures::stream::iter((0..5).map(|i| Update::text_message(i, 1, "go")));
        runtime.run_stream(updates).await.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}
