//! Source references attached to an answer, and their deduplication.
//!
//! The backend reports sources in two shapes on the same wire field: a bare
//! URL string, or an object carrying `url` plus optional display metadata.
//! Both normalize into a [`SourceRef`], whose identity is the `url` alone.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A reference to one source document backing an answer.
///
/// Two refs with the same `url` are the same source regardless of the other
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub url: String,
    pub title: Option<String>,
    pub citation: Option<String>,
}

/// One entry of a wire-level source list, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceEntry {
    Url(String),
    Ref(SourceRef),
}

impl SourceEntry {
    /// Normalize into a [`SourceRef`].  A bare URL gets its final path
    /// segment as the title and a synthesized citation string.
    pub fn into_ref(self) -> SourceRef {
        match self {
            SourceEntry::Ref(r) => r,
            SourceEntry::Url(url) => {
                let name = final_path_segment(&url).to_string();
                SourceRef {
                    citation: Some(format!("Document: {name}")),
                    title: Some(name),
                    url,
                }
            }
        }
    }
}

impl From<SourceRef> for SourceEntry {
    fn from(r: SourceRef) -> Self {
        SourceEntry::Ref(r)
    }
}

/// Supplementary per-source metadata fetched from the backend, cached by URL
/// for the lifetime of the current organization context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDetail {
    pub title: String,
    pub citation_format: String,
    #[serde(default)]
    pub vector_info: serde_json::Value,
}

impl SourceDetail {
    /// Synthesized stand-in used whenever the metadata lookup fails, so the
    /// caller can proceed without special-casing the miss.
    pub fn fallback(filename: &str) -> Self {
        Self {
            title: filename.to_string(),
            citation_format: format!("Document: {filename}"),
            vector_info: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Final path segment of a URL (the filename part).
pub fn final_path_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Collapse a heterogeneous source list into unique refs, keyed by URL.
/// The first occurrence of a URL wins; first-seen order is preserved.
pub fn dedupe_sources(entries: impl IntoIterator<Item = SourceEntry>) -> Vec<SourceRef> {
    dedupe_refs(entries.into_iter().map(SourceEntry::into_ref))
}

/// Same as [`dedupe_sources`] over already-normalized refs.
pub fn dedupe_refs(refs: impl IntoIterator<Item = SourceRef>) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for r in refs {
        if seen.insert(r.url.clone()) {
            unique.push(r);
        }
    }
    unique
}
