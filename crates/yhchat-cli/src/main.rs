mod theme;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use theme as t;
use tokio::sync::broadcast;
use tracing::info;
use yhchat_core::args::CommonArgs;
use yhchat_core::config::Config;
use yhchat_core::logging;
use yhchat_core::realtime::router::next_event;
use yhchat_core::realtime::{
    ConnectionState, FileTokenProvider, MessageEvent, SessionConfig, StaticTokenProvider,
    TokenProvider, WsConnector,
};
use yhchat_core::store::{ConversationStore, MessageStore, SqliteStore};
use yhchat_core::sync::preview;
use yhchat_core::{ChatMessage, ConversationSummary, RealtimePipeline};

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "yhchat",
    version,
    about = "Headless Yhchat client: realtime connection plus a local message cache"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect and mirror realtime events into the cache until Ctrl+C
    Run,
    /// List cached conversations, most recent first
    Conversations {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached messages of one chat, oldest first
    Messages {
        /// Conversation id: group or bot id, or the peer's user id for a private chat
        chat_id: String,
        /// Maximum number of messages
        #[arg(long, short = 'n', default_value_t = 50)]
        limit: usize,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    t::init_color(cli.no_color);
    logging::init(cli.common.log_config());

    let mut config = Config::load(cli.common.config_path())?;
    cli.common.apply_overrides(&mut config);

    match cli.command {
        Command::Run => run(config).await,
        Command::Conversations { json } => conversations(&config, json).await,
        Command::Messages {
            chat_id,
            limit,
            json,
        } => messages(&config, &chat_id, limit, json).await,
        Command::Config => {
            if config.token.is_some() {
                config.token = Some("<redacted>".into());
            }
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

// ── run ─────────────────────────────────────────────────────────────────────

fn token_provider(config: &Config) -> Arc<dyn TokenProvider> {
    match (&config.token, &config.token_file) {
        (Some(token), _) => Arc::new(StaticTokenProvider::new(Some(token.clone()))),
        (None, Some(path)) => Arc::new(FileTokenProvider::new(path.clone())),
        (None, None) => Arc::new(StaticTokenProvider::new(None)),
    }
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let path = config.db_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open cache at {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn run(config: Config) -> Result<()> {
    let Some(user_id) = config.user_id.clone() else {
        bail!("No user id configured (set user_id in config.toml, --user-id or YHCHAT_USER_ID)");
    };

    let store = open_store(&config)?;
    let session_config = SessionConfig::from_realtime(&config.realtime);
    let connector = Arc::new(WsConnector::new(config.realtime.connect_timeout()));

    println!("{}", t::label_value("Endpoint", &config.realtime.ws_url));
    println!("{}", t::label_value("Cache", &config.db_path().display().to_string()));

    let pipeline = RealtimePipeline::start(
        session_config,
        connector,
        token_provider(&config),
        store,
        Some(user_id.clone()),
    );
    println!("{}", t::label_value("Device", pipeline.session().device_id()));
    let mut states = pipeline.subscribe_state();
    let mut events = pipeline.subscribe_events();

    info!(user_id = %user_id, platform = %config.realtime.platform, "Starting realtime client");
    if let Err(err) = pipeline.connect(&user_id, &config.realtime.platform).await {
        pipeline.shutdown().await;
        return Err(err).context("Could not start the realtime session");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("{}", t::muted("Shutting down…"));
                break;
            }
            state = states.recv() => match state {
                Ok(state) => print_state(&state),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            event = next_event(&mut events, "cli") => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    pipeline.shutdown().await;
    Ok(())
}

fn print_state(state: &ConnectionState) {
    let line = match state {
        ConnectionState::Connected => t::success("● connected"),
        ConnectionState::Connecting => t::warn("◌ connecting"),
        ConnectionState::Disconnected => t::muted("○ disconnected"),
        ConnectionState::Error(reason) => t::error(&format!("✗ error: {reason}")),
    };
    println!("{line}");
}

fn print_event(event: &MessageEvent) {
    match event {
        MessageEvent::NewMessage(message) => {
            println!("{} {}", t::accent("new"), message_line(message));
        }
        MessageEvent::MessageEdited(message) => {
            println!("{} {}", t::warn("edit"), message_line(message));
        }
        MessageEvent::MessageDeleted {
            msg_id,
            chat_id,
            chat_type,
        } => {
            println!(
                "{} {} in {chat_id}/{chat_type}",
                t::error("recall"),
                t::muted(msg_id)
            );
        }
        MessageEvent::DraftUpdated { chat_id, input } => {
            println!("{} {chat_id}: {}", t::muted("draft"), input);
        }
        MessageEvent::BotBoardMessage(board) => {
            println!(
                "{} {} in {}/{}",
                t::muted("board"),
                board.bot_name,
                board.chat_id,
                board.chat_type
            );
        }
        MessageEvent::StreamMessage {
            msg_id, content, ..
        } => {
            println!("{} {} {}", t::muted("stream"), t::muted(msg_id), content);
        }
    }
}

fn message_line(message: &ChatMessage) -> String {
    format!(
        "{} {} {}: {}",
        t::muted(&format_time(message.send_time)),
        t::muted(&message.key().to_string()),
        t::bold(&message.sender.name),
        preview(message)
    )
}

fn format_time(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

// ── cache queries ───────────────────────────────────────────────────────────

async fn conversations(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let list = store.list_conversations().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    if list.is_empty() {
        println!("{}", t::muted("No cached conversations"));
    }
    for summary in &list {
        println!("{}", conversation_line(summary));
    }
    Ok(())
}

fn conversation_line(summary: &ConversationSummary) -> String {
    let unread = if summary.unread > 0 {
        t::accent(&format!("({})", summary.unread))
    } else {
        String::new()
    };
    let muted_marker = if summary.do_not_disturb { " 🔕" } else { "" };
    format!(
        "{} {} {}{} {}\n    {}",
        t::muted(&format_time(summary.last_message_time)),
        t::bold(&summary.name),
        t::muted(&summary.key().to_string()),
        muted_marker,
        unread,
        summary.preview
    )
}

async fn messages(config: &Config, chat_id: &str, limit: usize, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let list = store.messages_for_chat(chat_id, limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    if list.is_empty() {
        println!("{}", t::muted(&format!("No cached messages for {chat_id}")));
    }
    for message in &list {
        println!("{}", message_line(message));
    }
    Ok(())
}
