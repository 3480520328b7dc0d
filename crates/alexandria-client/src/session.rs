//! Chat session task: one organization's timeline of questions and
//! streamed answers.
//!
//! The session runs in a dedicated tokio task driven by typed commands and
//! reports back through a notification channel, keeping the UI layer fully
//! decoupled.  At most one query is in flight at a time; asking again
//! cancels the previous stream before the new request is opened, so no two
//! streams can ever interleave their deltas.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

use alexandria_net::{ApiClient, QueryStream};
use alexandria_shared::message::ChatMessage;
use alexandria_shared::protocol::AnswerEvent;
use alexandria_shared::resolve::resolve;
use alexandria_shared::sources::SourceRef;
use alexandria_shared::types::OrganizationId;

use crate::state::{refresh_source_details, AppState};

/// Commands sent *into* the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Submit a question, cancelling any in-flight query first.
    Ask(String),
    /// Cancel the in-flight query, discarding its partial answer.
    CancelQuery,
    /// Map a raw citation span from a message to one of its sources.
    ResolveCitation {
        message_id: Uuid,
        raw: String,
        reply: oneshot::Sender<Option<SourceRef>>,
    },
    /// Request a snapshot of the transcript.
    GetHistory(oneshot::Sender<Vec<ChatMessage>>),
    /// Wipe the transcript, in memory and on disk.
    ClearHistory,
    /// Gracefully shut down the session.
    Shutdown,
}

/// Notifications sent *from* the session task to the UI layer.
#[derive(Debug, Clone)]
pub enum SessionNotification {
    /// A message was added to the transcript.
    MessageAppended(ChatMessage),
    /// The streaming assistant message changed.
    MessageUpdated(ChatMessage),
    /// The assistant message was sealed and persisted.
    MessageFinalized(ChatMessage),
    /// An unfinished assistant message was removed from the transcript.
    MessageDiscarded { id: Uuid },
    /// The query failed; the transcript holds no trace of the answer.
    QueryFailed { message: String },
}

/// Spawn the session task for one organization.
///
/// Returns channels for sending commands and receiving notifications.
pub fn spawn_session(
    api: ApiClient,
    state: Arc<Mutex<AppState>>,
    organization: OrganizationId,
) -> (
    mpsc::Sender<SessionCommand>,
    mpsc::Receiver<SessionNotification>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (notif_tx, notif_rx) = mpsc::channel(256);

    tokio::spawn(session_loop(api, state, organization, cmd_rx, notif_tx));

    (cmd_tx, notif_rx)
}

async fn session_loop(
    api: ApiClient,
    state: Arc<Mutex<AppState>>,
    organization: OrganizationId,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    notif_tx: mpsc::Sender<SessionNotification>,
) {
    let mut history = load_history(&state, &organization);
    let mut active: Option<QueryStream> = None;

    info!(org = %organization, messages = history.len(), "chat session started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(SessionCommand::Ask(question)) => {
                    // Cancel the previous stream before opening a new one.
                    if let Some(prev) = active.take() {
                        prev.abort();
                        discard_placeholder(&mut history, &notif_tx).await;
                    }
                    active = start_query(&api, &organization, question, &mut history, &state, &notif_tx).await;
                }

                Some(SessionCommand::CancelQuery) => {
                    if let Some(prev) = active.take() {
                        prev.abort();
                        discard_placeholder(&mut history, &notif_tx).await;
                    }
                }

                Some(SessionCommand::ResolveCitation { message_id, raw, reply }) => {
                    let details = state
                        .lock()
                        .map(|guard| guard.source_details.clone())
                        .unwrap_or_default();
                    let found = history
                        .iter()
                        .find(|m| m.id == message_id)
                        .and_then(|m| resolve(&raw, m.candidate_sources(), &details))
                        .cloned();
                    let _ = reply.send(found);
                }

                Some(SessionCommand::GetHistory(reply)) => {
                    let _ = reply.send(history.clone());
                }

                Some(SessionCommand::ClearHistory) => {
                    history.clear();
                    if let Ok(guard) = state.lock() {
                        if let Some(db) = guard.database.as_ref() {
                            if let Err(e) = db.clear_history(&organization) {
                                warn!(error = %e, "failed to clear stored history");
                            }
                        }
                    }
                }

                Some(SessionCommand::Shutdown) | None => {
                    if let Some(prev) = active.take() {
                        prev.abort();
                    }
                    break;
                }
            },

            event = next_stream_event(&mut active), if active.is_some() => match event {
                Some(AnswerEvent::Completed) => {
                    active = None;
                    if let Some(message) = history.last_mut().filter(|m| m.streaming) {
                        message.finalize();
                        persist(&state, &organization, message);
                        let _ = notif_tx
                            .send(SessionNotification::MessageFinalized(message.clone()))
                            .await;
                    }
                }

                Some(AnswerEvent::Error(message)) => {
                    active = None;
                    warn!(error = %message, "query stream failed");
                    discard_placeholder(&mut history, &notif_tx).await;
                    let _ = notif_tx
                        .send(SessionNotification::QueryFailed { message })
                        .await;
                }

                Some(event) => {
                    if let AnswerEvent::Sources(refs) | AnswerEvent::EnhancedSources(refs) = &event {
                        let api = api.clone();
                        let state = state.clone();
                        let refs = refs.clone();
                        tokio::spawn(async move {
                            refresh_source_details(&api, &state, organization, refs).await;
                        });
                    }
                    if let Some(message) = history.last_mut().filter(|m| m.streaming) {
                        message.apply(&event);
                        let _ = notif_tx
                            .send(SessionNotification::MessageUpdated(message.clone()))
                            .await;
                    }
                }

                None => {
                    // Reader ended without a completion marker.
                    active = None;
                    discard_placeholder(&mut history, &notif_tx).await;
                    let _ = notif_tx
                        .send(SessionNotification::QueryFailed {
                            message: "stream closed unexpectedly".to_string(),
                        })
                        .await;
                }
            },
        }
    }

    info!(org = %organization, "chat session ended");
}

async fn next_stream_event(active: &mut Option<QueryStream>) -> Option<AnswerEvent> {
    match active {
        Some(stream) => stream.next_event().await,
        None => std::future::pending().await,
    }
}

/// Append the user message and an assistant placeholder, then open the
/// stream.  On a transport failure the placeholder is removed again and the
/// failure is reported; the user message stays.
async fn start_query(
    api: &ApiClient,
    organization: &OrganizationId,
    question: String,
    history: &mut Vec<ChatMessage>,
    state: &Arc<Mutex<AppState>>,
    notif_tx: &mpsc::Sender<SessionNotification>,
) -> Option<QueryStream> {
    let user = ChatMessage::user(question.clone());
    persist(state, organization, &user);
    let _ = notif_tx
        .send(SessionNotification::MessageAppended(user.clone()))
        .await;
    history.push(user);

    let placeholder = ChatMessage::assistant_placeholder();
    let _ = notif_tx
        .send(SessionNotification::MessageAppended(placeholder.clone()))
        .await;
    history.push(placeholder);

    match api.streaming_query(&question, organization).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(error = %e, "failed to open query stream");
            discard_placeholder(history, notif_tx).await;
            let _ = notif_tx
                .send(SessionNotification::QueryFailed {
                    message: e.to_string(),
                })
                .await;
            None
        }
    }
}

/// Remove a trailing unfinished assistant message, if any.
async fn discard_placeholder(
    history: &mut Vec<ChatMessage>,
    notif_tx: &mpsc::Sender<SessionNotification>,
) {
    if history.last().is_some_and(|m| m.streaming) {
        if let Some(message) = history.pop() {
            let _ = notif_tx
                .send(SessionNotification::MessageDiscarded { id: message.id })
                .await;
        }
    }
}

fn persist(state: &Arc<Mutex<AppState>>, organization: &OrganizationId, message: &ChatMessage) {
    let Ok(guard) = state.lock() else { return };
    if let Some(db) = guard.database.as_ref() {
        if let Err(e) = db.insert_message(organization, message) {
            warn!(error = %e, "failed to persist message");
        }
    }
}

fn load_history(state: &Arc<Mutex<AppState>>, organization: &OrganizationId) -> Vec<ChatMessage> {
    let Ok(guard) = state.lock() else {
        return Vec::new();
    };
    match guard.database.as_ref() {
        Some(db) => db.history_for_organization(organization).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load stored history");
            Vec::new()
        }),
        None => Vec::new(),
    }
}
