//! Echo Bot Example
//!
//! A console bot demonstrating TeleVoltaic routing. Each line typed on stdin
//! becomes an update from chat `1`; replies are printed to stdout.
//!
//! # Route tree
//!
//! ```text
//! project.routes
//! ├── /start, /help            → start, help
//! ├── include echo.routes      (namespace "echo")
//! │   ├── /echo <text>         → echo:command
//! │   └── any other text       → echo:text
//! └── include menu.routes      (namespace "menu")
//!     └── callback pick:<item> → menu:pick
//! ```
//!
//! Lines starting with `cb:` are sent as callback payloads, e.g.
//! `cb:pick:coffee`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot
//! ```

use std::any::Any;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use futures::Stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use televoltaic::core::{ApiResult, ChatId};
use televoltaic::prelude::*;

const CONSOLE_CHAT: ChatId = 1;

// ============================================================================
// Console transport
// ============================================================================

/// Prints outbound messages instead of calling a chat API.
#[derive(Default)]
struct ConsoleBot {
    next_message_id: AtomicI64,
}

#[async_trait]
impl Bot for ConsoleBot {
    fn id(&self) -> &str {
        "console"
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> ApiResult<i64> {
        println!("[chat {chat_id}] {text}");
        Ok(self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ApiResult<()> {
        println!("[callback {callback_id}] {}", text.unwrap_or("(answered)"));
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Turns stdin lines into updates.
fn stdin_updates() -> impl Stream<Item = Update> + Send {
    let lines = BufReader::new(tokio::io::stdin()).lines();

    futures::stream::unfold((lines, 0i64), |(mut lines, id)| async move {
        let line = lines.next_line().await.ok().flatten()?;
        let id = id + 1;
        let update = match line.strip_prefix("cb:") {
            Some(data) => Update::callback(id, format!("q{id}"), Some(CONSOLE_CHAT), data),
            None => Update::text_message(id, CONSOLE_CHAT, line),
        };
        Some((update, (lines, id)))
    })
}

// ============================================================================
// Handler Functions
// ============================================================================

async fn start(_update: Arc<Update>, _ctx: HandlerContext) -> &'static str {
    "Hi! Type anything and I will echo it. /help lists commands."
}

async fn help(_update: Arc<Update>, _ctx: HandlerContext) -> &'static str {
    "/start        - Greeting\n\
     /echo <text>  - Echo text\n\
     cb:pick:<x>   - Press the \"pick\" button with <x>"
}

/// `/echo` with no arguments replies with a usage hint.
async fn echo_command(update: Arc<Update>, _ctx: HandlerContext) -> String {
    match update.command() {
        Some(command) if !command.args.is_empty() => command.args.join(" "),
        _ => "Usage: /echo <text>".to_string(),
    }
}

async fn echo_text(update: Arc<Update>, ctx: HandlerContext) -> Option<String> {
    info!(route = ?ctx.route_name(), "Echoing plain text");
    update.text().map(str::to_string)
}

async fn pick(_update: Arc<Update>, ctx: HandlerContext) -> HandlerResult {
    let item = ctx.named("item").unwrap_or("nothing");
    ctx.answer_callback(Some("Noted")).await?;
    ctx.reply(&format!("You picked {item}.")).await?;
    Ok(())
}

// ============================================================================
// Route declarations
// ============================================================================

fn resolver() -> Resolver {
    Resolver::new()
        .handler("core.start", start)
        .handler("core.help", help)
        .handler("echo.command", echo_command)
        .handler("echo.text", echo_text)
        .handler("menu.pick", pick)
        .routes_with("echo.routes", || {
            patterns(
                None,
                [
                    command("echo", "echo.command", Some("command")),
                    message(".+", "echo.text", Some("text")),
                ],
            )
        })
        .routes_with("menu.routes", || {
            patterns(
                None,
                [callback(r"^pick:(?P<item>\w+)$", "menu.pick", Some("pick"))],
            )
        })
        .routes_with("project.routes", || {
            patterns(
                None,
                [
                    command("start", "core.start", Some("start")),
                    command("help", "core.help", Some("help")),
                    include("echo.routes", Some("echo")),
                    include("menu.routes", Some("menu")),
                ],
            )
        })
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Settings files and TELEVOLTAIC_* variables still apply; this only
    // provides a default when nothing else names the root collection.
    let loader = ConfigLoader::new().with_current_dir();
    let mut config = loader.load()?;
    config
        .settings
        .root_routes
        .get_or_insert_with(|| "project.routes".to_string());

    let runtime = TeleVoltaic::from_config(config, resolver(), Arc::new(ConsoleBot::default()))?;
    info!(routes = ?runtime.routes().load().names(), "Routes compiled");

    runtime.run(stdin_updates()).await?;
    Ok(())
}
