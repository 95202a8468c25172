//! Libris application binary - composition root.
//!
//! Ties the workspace crates into a single executable:
//! 1. Load configuration from TOML and validate collaborator bindings
//! 2. Build the HTTP collaborator clients (classifier, knowledge, search)
//! 3. Wire the turn dispatcher with a console reply sink
//! 4. Run an interactive loop feeding stdin lines as message events

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use libris_bot::services::BotServices;
use libris_bot::state::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use libris_bot::types::{CancelToken, TurnEvent};
use libris_bot::TurnDispatcher;
use libris_connect::{ClassifierClient, KnowledgeClient, SiteSearchClient};
use libris_core::LibrisConfig;

mod cli;
mod console;

use cli::CliArgs;
use console::ConsoleSink;

/// The assistant's own member id on the console transport.
const BOT_ID: &str = "libris";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let config = LibrisConfig::load_or_default(&config_path);

    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    config.validate()?;

    // Collaborator clients fail fast on missing endpoints or credentials.
    let classifier = Arc::new(ClassifierClient::from_config(&config.classifier)?);
    let knowledge = Arc::new(KnowledgeClient::from_config(&config.knowledge)?);
    let search = Arc::new(SiteSearchClient::from_config(&config.search)?);

    let sessions: Arc<dyn SessionStore> = match args.session_db {
        Some(ref path) => Arc::new(SqliteSessionStore::open(path)?),
        None => Arc::new(InMemorySessionStore::new()),
    };

    let services = BotServices::builder()
        .classifier(classifier)
        .knowledge(knowledge)
        .search(search)
        .sink(Arc::new(ConsoleSink))
        .sessions(sessions)
        .build()?;
    let dispatcher = TurnDispatcher::new(services, &config);

    tracing::info!("Libris assistant ready; type a question, Ctrl-C to exit");
    run_console(&dispatcher).await;
    Ok(())
}

/// Feed stdin lines through the dispatcher until EOF or Ctrl-C.
async fn run_console(dispatcher: &TurnDispatcher) {
    let conversation_id = uuid::Uuid::new_v4().to_string();
    let user_id = format!("console-{}", std::process::id());
    let cancel = CancelToken::new();

    // Opening the console counts as adding the assistant to the conversation.
    let joined = TurnEvent::ConversationUpdate {
        conversation_id: conversation_id.clone(),
        members_added: vec![user_id.clone(), BOT_ID.to_string()],
        recipient_id: BOT_ID.to_string(),
    };
    if let Err(e) = dispatcher.handle_event(joined, &cancel).await {
        tracing::error!(error = %e, "welcome turn failed");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                // Stop mid-turn output; a cancelled turn sends nothing more.
                cancel.cancel();
                tracing::info!("interrupted, shutting down");
                break;
            }
        };

        let text = match line {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };

        let event = TurnEvent::Message {
            conversation_id: conversation_id.clone(),
            sender_id: user_id.clone(),
            text,
        };
        if let Err(e) = dispatcher.handle_event(event, &cancel).await {
            tracing::warn!(error = %e, "turn failed");
        }
    }
}
