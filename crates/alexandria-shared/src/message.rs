//! Chat message model and the event reducer that assembles an answer.
//!
//! While a query streams, the assistant message is mutated in place by
//! [`ChatMessage::apply`]; once [`ChatMessage::finalize`] runs the message
//! is immutable.  The reducer is deliberately free of any I/O so the
//! accumulation rules can be tested event-by-event.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::AnswerEvent;
use crate::sources::SourceRef;

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message of the chat transcript.
///
/// The answer text accumulates monotonically: deltas are appended in arrival
/// order, never reordered or overwritten.  A thinking snapshot replaces the
/// *displayed* text only; the accumulated answer is untouched by it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    /// Accumulated answer text (or the user's question).
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Still receiving stream events.
    pub streaming: bool,
    /// The last event was a thinking status.
    pub thinking: bool,
    /// The backend flagged that the corpus cannot answer the question.
    pub insufficient_info: bool,
    pub sources: Vec<SourceRef>,
    pub enhanced_sources: Vec<SourceRef>,
    /// Transient thinking snapshot, display-only.
    #[serde(skip)]
    pub thinking_text: Option<String>,
}

impl ChatMessage {
    /// A finalized user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            text: text.into(),
            created_at: Utc::now(),
            streaming: false,
            thinking: false,
            insufficient_info: false,
            sources: Vec::new(),
            enhanced_sources: Vec::new(),
            thinking_text: None,
        }
    }

    /// An empty assistant placeholder, mutated while the query streams.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            text: String::new(),
            created_at: Utc::now(),
            streaming: true,
            thinking: false,
            insufficient_info: false,
            sources: Vec::new(),
            enhanced_sources: Vec::new(),
            thinking_text: None,
        }
    }

    /// Apply one stream event.  No-op once the message is finalized.
    pub fn apply(&mut self, event: &AnswerEvent) {
        if !self.streaming {
            return;
        }

        match event {
            AnswerEvent::TextDelta {
                text,
                insufficient_info,
            } => {
                self.text.push_str(text);
                self.thinking = false;
                self.thinking_text = None;
                self.insufficient_info = *insufficient_info;
            }
            AnswerEvent::Thinking { text } => {
                self.thinking = true;
                self.thinking_text = Some(text.clone());
            }
            AnswerEvent::Sources(refs) => {
                self.sources = refs.clone();
            }
            AnswerEvent::EnhancedSources(refs) => {
                self.enhanced_sources = refs.clone();
            }
            AnswerEvent::Completed | AnswerEvent::Error(_) => {}
        }
    }

    /// Seal the message: strip any trailing references section from the
    /// accumulated text and stop accepting events.  Idempotent.
    pub fn finalize(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        self.thinking = false;
        self.thinking_text = None;
        self.text = strip_references(&self.text).to_string();
    }

    /// Text to show right now: the thinking snapshot while one is active,
    /// the accumulated answer otherwise.
    pub fn display_text(&self) -> &str {
        match (self.thinking, &self.thinking_text) {
            (true, Some(snapshot)) => snapshot,
            _ => &self.text,
        }
    }

    /// The candidate set for citation resolution: enhanced sources when
    /// non-empty, plain sources otherwise.
    pub fn candidate_sources(&self) -> &[SourceRef] {
        if !self.enhanced_sources.is_empty() {
            &self.enhanced_sources
        } else {
            &self.sources
        }
    }
}

static REFERENCES_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)references").expect("valid regex"));

// Numbered trailing reference like `1. (horisberger2025...):`
static NUMBERED_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\s*\([^)]+\):").expect("valid regex"));

/// Truncate answer text at a trailing references section.
///
/// Cuts at whichever comes first: a case-insensitive `references` heading or
/// a numbered-reference pattern.  Trailing whitespace is trimmed.  The
/// citation parser must only ever see text that went through this.
pub fn strip_references(text: &str) -> &str {
    let mut cut = text.len();
    if let Some(m) = REFERENCES_HEADING.find(text) {
        cut = cut.min(m.start());
    }
    if let Some(m) = NUMBERED_REFERENCE.find(text) {
        cut = cut.min(m.start());
    }
    text[..cut].trim_end()
}
