//! Wire protocol of the streaming query endpoint.
//!
//! The backend answers a query with newline-delimited event lines, each
//! `data: `-prefixed and carrying one JSON [`StreamChunk`].  Every field is
//! optional: absence means "no change this event", not "reset to default".
//! A chunk expands into zero or more ordered [`AnswerEvent`]s, which is what
//! the rest of the client consumes.

use serde::Deserialize;

use crate::sources::{SourceEntry, SourceRef};

/// One decoded event payload from the streaming query transport.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    /// Partial answer text (a delta, or a thinking-status snapshot).
    pub answer: Option<String>,
    /// When set, `answer` is a thinking-status snapshot, not a delta.
    pub thinking: Option<bool>,
    /// The corpus did not contain enough information to answer.
    pub insufficient_info: Option<bool>,
    /// Candidate source documents (URL strings or structured refs).
    pub sources: Option<Vec<SourceEntry>>,
    /// Richer source refs that supersede `sources` when present.
    pub enhanced_sources: Option<Vec<SourceEntry>>,
    /// Application-level failure; always fatal for the stream.
    pub error: Option<String>,
}

/// A typed event delivered to the chat session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    /// Append `text` to the assembled answer.
    TextDelta { text: String, insufficient_info: bool },
    /// Display `text` as a transient thinking status; not part of the answer.
    Thinking { text: String },
    /// Replace the message's candidate source list.
    Sources(Vec<SourceRef>),
    /// Replace the message's enhanced candidate source list.
    EnhancedSources(Vec<SourceRef>),
    /// The transport reached end-of-stream; the answer is complete.
    Completed,
    /// Fatal stream failure; no further events follow.
    Error(String),
}

impl StreamChunk {
    /// Expand the chunk into its ordered events.
    ///
    /// An `error` field preempts everything else.  Source lists travelling
    /// on a chunk that flags `insufficient_info` are suppressed.
    pub fn into_events(self) -> Vec<AnswerEvent> {
        let mut events = Vec::new();

        if let Some(error) = self.error {
            events.push(AnswerEvent::Error(error));
            return events;
        }

        let insufficient = self.insufficient_info.unwrap_or(false);

        if let Some(text) = self.answer {
            if self.thinking.unwrap_or(false) {
                events.push(AnswerEvent::Thinking { text });
            } else {
                events.push(AnswerEvent::TextDelta {
                    text,
                    insufficient_info: insufficient,
                });
            }
        }

        if !insufficient {
            if let Some(entries) = self.sources {
                events.push(AnswerEvent::Sources(normalize(entries)));
            }
            if let Some(entries) = self.enhanced_sources {
                events.push(AnswerEvent::EnhancedSources(normalize(entries)));
            }
        }

        events
    }
}

fn normalize(entries: Vec<SourceEntry>) -> Vec<SourceRef> {
    entries.into_iter().map(SourceEntry::into_ref).collect()
}
