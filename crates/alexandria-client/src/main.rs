//! Command-line chat for the Alexandria research assistant.
//!
//! Reads questions from stdin, streams each answer through the session
//! task, and prints the finalized answer with normalized citations plus the
//! deduplicated source list.

use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};

use tracing_subscriber::{fmt, EnvFilter};

use alexandria_client::config::ClientConfig;
use alexandria_client::session::{spawn_session, SessionCommand, SessionNotification};
use alexandria_client::state::AppState;
use alexandria_net::ApiClient;
use alexandria_shared::citation::render;
use alexandria_shared::message::{ChatMessage, Role};
use alexandria_shared::sources::dedupe_refs;
use alexandria_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("alexandria_client=info,alexandria_net=info,alexandria_store=warn,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ClientConfig::from_env();
    let organization = config
        .organization
        .ok_or_else(|| anyhow::anyhow!("ALEXANDRIA_ORG must be set to an organization UUID"))?;

    let api = ApiClient::new(config.api_url.clone(), config.auth_token.clone());

    let mut app_state = AppState::new();
    match Database::new() {
        Ok(db) => app_state.database = Some(db),
        Err(e) => tracing::warn!(error = %e, "running without persistent history"),
    }
    app_state.set_organization(organization);
    let state = Arc::new(Mutex::new(app_state));

    let (cmd_tx, mut notif_rx) = spawn_session(api, state, organization);

    println!("Alexandria research assistant -- ask a question (Ctrl-D to quit).");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let question = line?;
        let question = question.trim();
        if question.is_empty() {
            continue;
        }

        cmd_tx.send(SessionCommand::Ask(question.to_string())).await?;

        while let Some(notification) = notif_rx.recv().await {
            match notification {
                SessionNotification::MessageUpdated(message) if message.thinking => {
                    eprintln!("  [{}]", message.display_text());
                }
                SessionNotification::MessageFinalized(message) => {
                    print_answer(&message);
                    break;
                }
                SessionNotification::QueryFailed { message } => {
                    eprintln!("error: {message}");
                    break;
                }
                _ => {}
            }
        }
    }

    cmd_tx.send(SessionCommand::Shutdown).await.ok();
    Ok(())
}

fn print_answer(message: &ChatMessage) {
    debug_assert_eq!(message.role, Role::Assistant);

    println!("\n{}\n", render(&message.text));

    let unique = dedupe_refs(message.candidate_sources().iter().cloned());
    if !unique.is_empty() && !message.insufficient_info {
        println!("Sources ({}):", unique.len());
        for (i, source) in unique.iter().enumerate() {
            let title = source.title.as_deref().unwrap_or("Document");
            println!("  {}. {} -- {}", i + 1, title, source.url);
        }
        println!();
    }
}
