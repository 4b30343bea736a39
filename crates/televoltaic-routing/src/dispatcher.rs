//! Update dispatcher.
//!
//! The [`Dispatcher`] classifies each incoming update, picks the matching
//! partition of the current [`RouteTable`] and tries its routes in
//! declaration order. The first match wins; there is no backtracking and no
//! specificity scoring.
//!
//! Classification follows a fixed priority and yields exactly one kind:
//!
//! 1. text starting with the command marker → [`UpdateKind::Command`]
//! 2. a callback payload → [`UpdateKind::Callback`]
//! 3. any other text → [`UpdateKind::Message`]
//! 4. anything else → [`UpdateKind::Unhandled`]
//!
//! An unmatched command does not fall through to message routes.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(routes, bot, settings);
//!
//! match dispatcher.dispatch(Arc::new(update)).await? {
//!     DispatchOutcome::Handled { route, .. } => debug!(?route, "handled"),
//!     DispatchOutcome::NoMatch { .. } => { /* caller decides */ }
//!     DispatchOutcome::Cancelled { .. } => {}
//! }
//! ```
//!
//! `Dispatcher` is also a `tower::Service<Update>`, so timeouts, retries and
//! other middleware can be layered around it.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{Instrument, Level, debug, span, trace};

use crate::context::HandlerContext;
use crate::extension::{MetricsHook, StateBackend};
use crate::handler::HandlerError;
use crate::matcher::{Captures, MatchResult, Matcher, RouteKind};
use crate::registry::{CompiledRoute, RouteTable, SharedRouteTable};
use televoltaic_core::{BoxedBot, COMMAND_MARKER, Settings, Update};

/// How an update was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Command,
    Callback,
    Message,
    /// Nothing to route: no text and no callback payload, or a command
    /// addressed to another bot.
    Unhandled,
}

impl UpdateKind {
    /// The route partition consulted for this kind.
    pub fn route_kind(&self) -> Option<RouteKind> {
        match self {
            Self::Command => Some(RouteKind::Command),
            Self::Callback => Some(RouteKind::Callback),
            Self::Message => Some(RouteKind::Message),
            Self::Unhandled => None,
        }
    }
}

/// Classifies `update`.
///
/// When `bot_username` is known, commands explicitly addressed to a
/// different bot (`/start@other_bot`) are [`UpdateKind::Unhandled`].
pub fn classify(update: &Update, bot_username: Option<&str>) -> UpdateKind {
    if let Some(text) = update.text()
        && text.starts_with(COMMAND_MARKER)
    {
        let addressed_elsewhere = match (update.command(), bot_username) {
            (Some(command), Some(username)) => !command.is_addressed_to(username),
            _ => false,
        };
        return if addressed_elsewhere {
            UpdateKind::Unhandled
        } else {
            UpdateKind::Command
        };
    }

    if update.callback_data().is_some() {
        UpdateKind::Callback
    } else if update.text().is_some() {
        UpdateKind::Message
    } else {
        UpdateKind::Unhandled
    }
}

/// Per-dispatch state, reported in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Idle,
    Resolving,
    Invoking,
}

/// Result of a dispatch that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran to completion.
    Handled { kind: RouteKind, route: Option<String> },
    /// No route matched; nothing was invoked.
    NoMatch { kind: UpdateKind },
    /// The handler was started but cancelled before completing.
    Cancelled { kind: RouteKind, route: Option<String> },
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

/// A route selected for an update, with the match captures.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub route: Arc<CompiledRoute>,
    pub captures: Captures,
}

/// Finds the first route of `kind` in `table` matching `update`.
fn find_route(table: &RouteTable, kind: RouteKind, update: &Update) -> Option<ResolvedRoute> {
    let routes = table.routes(kind);
    let result = match kind {
        RouteKind::Command => {
            let command = update.command()?;
            routes.iter().find_map(|route| match route.matcher() {
                Matcher::Command(m) => m.match_command(&command).into_captures().map(|c| (route, c)),
                _ => None,
            })
        }
        RouteKind::Callback => first_match(routes, update.callback_data()?),
        RouteKind::Message => first_match(routes, update.text()?),
    };

    result.map(|(route, captures)| ResolvedRoute {
        route: Arc::clone(route),
        captures,
    })
}

fn first_match<'a>(
    routes: &'a [Arc<CompiledRoute>],
    input: &str,
) -> Option<(&'a Arc<CompiledRoute>, Captures)> {
    routes.iter().find_map(|route| match route.matcher().match_input(input) {
        MatchResult::Matched(captures) => Some((route, captures)),
        MatchResult::NoMatch => None,
    })
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes updates to handlers.
///
/// Cheap to clone; clones share the route table, bot and extension slots.
#[derive(Clone)]
pub struct Dispatcher {
    routes: SharedRouteTable,
    bot: BoxedBot,
    settings: Arc<Settings>,
    state: Option<Arc<dyn StateBackend>>,
    metrics: Option<Arc<dyn MetricsHook>>,
}

impl Dispatcher {
    pub fn new(routes: SharedRouteTable, bot: BoxedBot, settings: Arc<Settings>) -> Self {
        Self {
            routes,
            bot,
            settings,
            state: None,
            metrics: None,
        }
    }

    /// Attaches a state backend, exposed to handlers via
    /// [`HandlerContext::state`].
    pub fn with_state_backend(mut self, state: Arc<dyn StateBackend>) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a metrics hook.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsHook>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn routes(&self) -> &SharedRouteTable {
        &self.routes
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// Classifies `update` using the configured bot username.
    pub fn classify(&self, update: &Update) -> UpdateKind {
        classify(update, self.settings.bot_username())
    }

    /// Finds the route that would handle `update`, without invoking it.
    pub fn resolve(&self, update: &Update) -> Option<ResolvedRoute> {
        let kind = self.classify(update).route_kind()?;
        find_route(&self.routes.load(), kind, update)
    }

    /// Dispatches `update` to its handler.
    ///
    /// # Errors
    ///
    /// Returns the handler's error unchanged. No-match is not an error.
    pub async fn dispatch(&self, update: Arc<Update>) -> Result<DispatchOutcome, HandlerError> {
        self.dispatch_with_cancel(update, CancellationToken::new()).await
    }

    /// Like [`dispatch`](Self::dispatch), but abandons the handler when
    /// `cancel` fires. The handler's context carries the same token.
    pub async fn dispatch_with_cancel(
        &self,
        update: Arc<Update>,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome, HandlerError> {
        let kind = self.classify(&update);
        let span = span!(Level::DEBUG, "dispatch", update_id = update.update_id, kind = ?kind);

        self.run(update, kind, cancel).instrument(span).await
    }

    async fn run(
        &self,
        update: Arc<Update>,
        kind: UpdateKind,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome, HandlerError> {
        let Some(route_kind) = kind.route_kind() else {
            trace!(phase = ?DispatchPhase::Idle, "Update is not routable");
            return Ok(DispatchOutcome::NoMatch { kind });
        };

        trace!(phase = ?DispatchPhase::Resolving, "Resolving route");
        let table = self.routes.load();
        let Some(ResolvedRoute { route, captures }) = find_route(&table, route_kind, &update) else {
            debug!("No route matched");
            if let Some(metrics) = &self.metrics {
                metrics.route_unmatched(route_kind);
            }
            return Ok(DispatchOutcome::NoMatch { kind });
        };
        drop(table);

        let name = route.full_name().map(str::to_string);
        trace!(
            phase = ?DispatchPhase::Invoking,
            route = ?name,
            handler = route.handler_ref().describe(),
            "Invoking handler"
        );
        if let Some(metrics) = &self.metrics {
            metrics.route_matched(route_kind, name.as_deref());
        }

        let ctx = HandlerContext::new(
            Arc::clone(&update),
            captures,
            route_kind,
            Arc::clone(&self.settings),
            Arc::clone(&self.bot),
        )
        .with_route_name(name.as_deref())
        .with_state_backend(self.state.clone())
        .with_metrics(self.metrics.clone())
        .with_cancellation(cancel.clone());

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = (route.handler())(update, ctx) => Some(result),
        };

        let ok = matches!(result, Some(Ok(())));
        if let Some(metrics) = &self.metrics {
            metrics.handler_completed(route_kind, name.as_deref(), started.elapsed(), ok);
        }

        match result {
            Some(Ok(())) => {
                debug!(route = ?name, "Update handled");
                Ok(DispatchOutcome::Handled { kind: route_kind, route: name })
            }
            Some(Err(e)) => {
                debug!(route = ?name, error = %e, "Handler failed");
                Err(e)
            }
            None => {
                debug!(route = ?name, "Handler cancelled");
                Ok(DispatchOutcome::Cancelled { kind: route_kind, route: name })
            }
        }
    }
}

impl Service<Update> for Dispatcher {
    type Response = DispatchOutcome;
    type Error = HandlerError;
    type Future = BoxFuture<'static, Result<DispatchOutcome, HandlerError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, update: Update) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.dispatch(Arc::new(update)).await })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .field("bot", &self.bot.id())
            .field("has_state", &self.state.is_some())
            .field("has_metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use tower::ServiceExt;

    use super::*;
    use crate::error::RouteResult;
    use crate::handler::HandlerRef;
    use crate::patterns::{RouteCollection, callback, command, include, message, patterns};
    use crate::resolver::Resolver;
    use crate::test_support::{MockBot, Sent};
    use televoltaic_core::TelegramSettings;

    async fn h1(_u: Arc<Update>, _c: HandlerContext) -> &'static str {
        "h1"
    }

    async fn h2(_u: Arc<Update>, _c: HandlerContext) -> &'static str {
        "h2"
    }

    async fn start(_u: Arc<Update>, ctx: HandlerContext) -> String {
        format!("start {}", ctx.captures().positional().len())
    }

    async fn profile(_u: Arc<Update>, ctx: HandlerContext) -> String {
        format!("profile via {}", ctx.route_name().unwrap_or("-"))
    }

    async fn vote(_u: Arc<Update>, ctx: HandlerContext) -> Option<String> {
        ctx.named("dir").map(|dir| format!("voted {dir}"))
    }

    async fn failing(_u: Arc<Update>, _c: HandlerContext) -> Result<(), std::io::Error> {
        Err(std::io::Error::other("boom"))
    }

    async fn forever(_u: Arc<Update>, _c: HandlerContext) {
        std::future::pending::<()>().await
    }

    fn resolver() -> Resolver {
        Resolver::new()
            .handler("app.h1", h1)
            .handler("app.h2", h2)
            .handler("app.start", start)
            .handler("app.profile", profile)
            .handler("app.vote", vote)
            .handler("app.failing", failing)
            .handler("app.forever", forever)
            .routes_with("app.routes", || {
                patterns(None, [command("profile", "app.profile", Some("profile"))])
            })
    }

    fn root() -> RouteResult<RouteCollection> {
        patterns(
            None,
            [
                command("start", "app.start", Some("start")),
                command("fail", "app.failing", None),
                command("wait", "app.forever", None),
                include("app.routes", Some("users")),
                callback("^vote:(?P<dir>up|down)$", "app.vote", Some("vote")),
                message("^hello$", "app.h1", Some("hello")),
                message(".*", "app.h2", Some("any")),
            ],
        )
    }

    fn dispatcher_with(settings: Settings) -> (Dispatcher, Arc<MockBot>) {
        let table = RouteTable::compile(&root().unwrap(), &resolver()).unwrap();
        let bot = MockBot::new();
        let dispatcher = Dispatcher::new(SharedRouteTable::new(table), bot.clone(), Arc::new(settings));
        (dispatcher, bot)
    }

    fn dispatcher() -> (Dispatcher, Arc<MockBot>) {
        dispatcher_with(Settings::default())
    }

    fn text(s: &str) -> Arc<Update> {
        Arc::new(Update::text_message(1, 10, s))
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify(&Update::text_message(1, 1, "/start"), None), UpdateKind::Command);
        assert_eq!(classify(&Update::text_message(1, 1, "hi /start"), None), UpdateKind::Message);
        assert_eq!(classify(&Update::callback(1, "q", None, "x"), None), UpdateKind::Callback);
        assert_eq!(classify(&Update::default(), None), UpdateKind::Unhandled);

        let mut both = Update::callback(1, "q", Some(1), "x");
        both.message = Update::text_message(1, 1, "/start").message;
        assert_eq!(classify(&both, None), UpdateKind::Command);

        let mut bare = Update::callback(1, "q", None, "x");
        bare.callback_query.as_mut().unwrap().data = None;
        assert_eq!(classify(&bare, None), UpdateKind::Unhandled);
    }

    #[test]
    fn test_classify_mentions() {
        let update = Update::text_message(1, 1, "/start@other_bot");
        assert_eq!(classify(&update, None), UpdateKind::Command);
        assert_eq!(classify(&update, Some("my_bot")), UpdateKind::Unhandled);
        assert_eq!(classify(&update, Some("Other_Bot")), UpdateKind::Command);
    }

    #[tokio::test]
    async fn test_command_with_empty_captures() {
        let (dispatcher, bot) = dispatcher();
        let resolved = dispatcher.resolve(&text("/start")).unwrap();
        assert_eq!(resolved.route.full_name(), Some("start"));
        assert!(resolved.captures.is_empty());

        let outcome = dispatcher.dispatch(text("/start")).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Handled { kind: RouteKind::Command, route: Some("start".into()) }
        );
        assert_eq!(bot.texts(), ["start 0"]);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let (dispatcher, bot) = dispatcher();
        dispatcher.dispatch(text("hello")).await.unwrap();
        dispatcher.dispatch(text("hello there")).await.unwrap();
        assert_eq!(bot.texts(), ["h1", "h2"]);
    }

    #[tokio::test]
    async fn test_namespaced_include() {
        let (dispatcher, bot) = dispatcher();
        let outcome = dispatcher.dispatch(text("/profile")).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Handled { kind: RouteKind::Command, route: Some("users:profile".into()) }
        );
        assert_eq!(bot.texts(), ["profile via users:profile"]);
    }

    #[tokio::test]
    async fn test_unmatched_command_does_not_fall_through() {
        let (dispatcher, bot) = dispatcher();
        let outcome = dispatcher.dispatch(text("/unknown")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoMatch { kind: UpdateKind::Command });
        assert!(bot.sent().is_empty());
    }

    #[tokio::test]
    async fn test_callback_captures_and_reply() {
        let (dispatcher, bot) = dispatcher();
        let update = Arc::new(Update::callback(3, "q9", None, "vote:up"));
        dispatcher.dispatch(update).await.unwrap();

        let update = Arc::new(Update::callback(4, "q10", None, "vote:sideways"));
        let outcome = dispatcher.dispatch(update).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoMatch { kind: UpdateKind::Callback });

        assert_eq!(
            bot.sent(),
            vec![Sent::Answer { id: "q9".into(), text: Some("voted up".into()) }]
        );
    }

    #[tokio::test]
    async fn test_unhandled_updates() {
        let settings = Settings {
            telegram: TelegramSettings { token: None, username: Some("my_bot".into()) },
            ..Default::default()
        };
        let (dispatcher, bot) = dispatcher_with(settings);

        let outcome = dispatcher.dispatch(text("/start@other_bot")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoMatch { kind: UpdateKind::Unhandled });
        let outcome = dispatcher.dispatch(Arc::new(Update::default())).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoMatch { kind: UpdateKind::Unhandled });
        assert!(dispatcher.dispatch(text("/start@my_bot")).await.unwrap().is_handled());
        assert_eq!(bot.texts(), ["start 0"]);
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let (dispatcher, _bot) = dispatcher();
        let err = dispatcher.dispatch(text("/fail")).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_cancelled_dispatch() {
        let (dispatcher, _bot) = dispatcher();
        let cancel = CancellationToken::new();
        let task = {
            let dispatcher = dispatcher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { dispatcher.dispatch_with_cancel(text("/wait"), cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, DispatchOutcome::Cancelled { kind: RouteKind::Command, route: None });

        // The table is untouched and later dispatches still work.
        assert!(dispatcher.dispatch(text("/start")).await.unwrap().is_handled());
    }

    #[tokio::test]
    async fn test_direct_handlers_and_state_slot() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler = HandlerRef::direct("count", move |_u: Arc<Update>, ctx: HandlerContext| {
            let counter = Arc::clone(&counter);
            async move {
                assert!(ctx.state().is_none());
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let root = patterns(None, [message(".*", handler, None)]).unwrap();
        let table = RouteTable::compile(&root, &Resolver::new()).unwrap();
        let dispatcher =
            Dispatcher::new(SharedRouteTable::new(table), MockBot::new(), Arc::default());

        dispatcher.dispatch(text("a")).await.unwrap();
        dispatcher.dispatch(text("b")).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[derive(Default)]
    struct RecordingMetrics {
        events: Mutex<Vec<String>>,
    }

    impl MetricsHook for RecordingMetrics {
        fn route_matched(&self, kind: RouteKind, route: Option<&str>) {
            self.events.lock().push(format!("matched {kind} {}", route.unwrap_or("-")));
        }

        fn route_unmatched(&self, kind: RouteKind) {
            self.events.lock().push(format!("unmatched {kind}"));
        }

        fn handler_completed(&self, kind: RouteKind, _route: Option<&str>, _elapsed: Duration, ok: bool) {
            self.events.lock().push(format!("completed {kind} {ok}"));
        }
    }

    #[tokio::test]
    async fn test_metrics_hook() {
        let metrics = Arc::new(RecordingMetrics::default());
        let (dispatcher, _bot) = dispatcher();
        let dispatcher = dispatcher.with_metrics(metrics.clone());

        dispatcher.dispatch(text("/start")).await.unwrap();
        dispatcher.dispatch(text("/nope")).await.unwrap();
        let _ = dispatcher.dispatch(text("/fail")).await;

        assert_eq!(
            *metrics.events.lock(),
            [
                "matched command start",
                "completed command true",
                "unmatched command",
                "matched command -",
                "completed command false",
            ]
        );
    }

    #[tokio::test]
    async fn test_tower_service() {
        let (dispatcher, bot) = dispatcher();
        let outcome = dispatcher
            .clone()
            .oneshot(Update::text_message(5, 10, "hello"))
            .await
            .unwrap();
        assert!(outcome.is_handled());
        assert_eq!(bot.texts(), ["h1"]);
    }

    #[test]
    fn test_dispatch_blocking() {
        let (dispatcher, bot) = dispatcher();
        let outcome = tokio_test::block_on(dispatcher.dispatch(text("/start a b"))).unwrap();
        assert!(outcome.is_handled());
        assert_eq!(bot.texts(), ["start 2"]);
    }

    #[tokio::test]
    async fn test_resolved_snapshot_survives_reload() {
        let (dispatcher, _bot) = dispatcher();
        let before = dispatcher.resolve(&text("hello")).unwrap();

        dispatcher.routes().store(RouteTable::default());
        assert!(dispatcher.resolve(&text("hello")).is_none());
        assert_eq!(before.route.full_name(), Some("hello"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reload_during_dispatch_sees_whole_tables() {
        // Version A routes "/ping" and "a" messages; version B routes "/pong" and "b".
        let a = patterns(None, [command("ping", "app.h1", None), message("^a$", "app.h1", None)]).unwrap();
        let b = patterns(None, [command("pong", "app.h2", None), message("^b$", "app.h2", None)]).unwrap();
        let table_a = RouteTable::compile(&a, &resolver()).unwrap();
        let table_b = RouteTable::compile(&b, &resolver()).unwrap();

        let bot = MockBot::new();
        let shared = SharedRouteTable::new(table_a.clone());
        let dispatcher = Dispatcher::new(shared.clone(), bot.clone(), Arc::default());

        let reloader = tokio::spawn(async move {
            for i in 0..200 {
                let next = if i % 2 == 0 { table_b.clone() } else { table_a.clone() };
                shared.reload(|| Ok(next)).unwrap();
                tokio::task::yield_now().await;
            }
        });

        let mut tasks = Vec::new();
        for i in 0..200 {
            let dispatcher = dispatcher.clone();
            let input = ["/ping", "/pong", "a", "b"][i % 4];
            tasks.push(tokio::spawn(async move {
                (input, dispatcher.dispatch(text(input)).await.unwrap())
            }));
        }

        let mut handled = 0;
        for task in tasks {
            let (input, outcome) = task.await.unwrap();
            match outcome {
                DispatchOutcome::Handled { .. } => handled += 1,
                DispatchOutcome::NoMatch { kind } => {
                    let expected = if input.starts_with('/') { UpdateKind::Command } else { UpdateKind::Message };
                    assert_eq!(kind, expected);
                }
                DispatchOutcome::Cancelled { .. } => panic!("nothing cancels these dispatches"),
            }
        }
        reloader.await.unwrap();

        assert_eq!(bot.sent().len(), handled);
    }

    #[tokio::test]
    async fn test_suspended_handler_keeps_its_table_across_reload() {
        let started = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let gate = {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            move |_u: Arc<Update>, _c: HandlerContext| {
                let started = Arc::clone(&started);
                let release = Arc::clone(&release);
                async move {
                    started.notify_one();
                    release.notified().await;
                    "old"
                }
            }
        };
        let resolver = resolver().handler("app.gate", gate);

        let old = patterns(None, [message(".*", "app.gate", Some("old"))]).unwrap();
        let new = patterns(None, [message(".*", "app.h2", Some("new"))]).unwrap();
        let table_new = RouteTable::compile(&new, &resolver).unwrap();

        let bot = MockBot::new();
        let shared = SharedRouteTable::new(RouteTable::compile(&old, &resolver).unwrap());
        let dispatcher = Dispatcher::new(shared.clone(), bot.clone(), Arc::default());

        let first = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(text("one")).await.unwrap() }
        });
        started.notified().await;

        shared.reload(|| Ok(table_new)).unwrap();
        let second = dispatcher.dispatch(text("two")).await.unwrap();
        assert_eq!(
            second,
            DispatchOutcome::Handled { kind: RouteKind::Message, route: Some("new".into()) }
        );
        assert_eq!(bot.texts(), ["h2"]);

        release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(
            first,
            DispatchOutcome::Handled { kind: RouteKind::Message, route: Some("old".into()) }
        );
        assert_eq!(bot.texts(), ["h2", "old"]);
    }
}
