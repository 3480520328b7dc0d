//! Citation-to-source matching.
//!
//! Maps a raw citation span to one of a message's candidate sources with an
//! ordered chain of fuzzy strategies.  The chain is a heuristic contract
//! inherited from the product: matches are best-effort and a miss is a
//! silent no-op, never an error.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::sources::{final_path_segment, SourceDetail, SourceRef};

static AUTHOR_BEFORE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z]+)\d{4}").expect("valid regex"));

/// Leading author token of a raw citation (`smith` from `smith2021...`),
/// lower-cased.
pub fn author_token(raw: &str) -> Option<String> {
    AUTHOR_BEFORE_YEAR
        .captures(raw)
        .map(|caps| caps[1].to_lowercase())
}

/// Resolve a raw citation against a candidate set.
///
/// `details` is the per-URL metadata cache; cached titles participate in the
/// first strategy alongside the candidates' own title/citation fields.
/// Strategies, first match wins:
///
/// 1. title or citation text (or cached detail title) contains the author
///    token;
/// 2. title matches `author (YYYY)`;
/// 3. the URL's final path segment contains the author token;
/// 4. first candidate, when the set is non-empty.
pub fn resolve<'a>(
    raw: &str,
    candidates: &'a [SourceRef],
    details: &HashMap<String, SourceDetail>,
) -> Option<&'a SourceRef> {
    let author = author_token(raw);
    debug!(citation = raw, author = ?author, candidates = candidates.len(), "resolving citation");

    if let Some(author) = &author {
        if let Some(found) = candidates.iter().find(|s| {
            display_title(s).contains(author.as_str())
                || details
                    .get(&s.url)
                    .is_some_and(|d| d.title.to_lowercase().contains(author.as_str()))
        }) {
            return Some(found);
        }

        if let Ok(pattern) = Regex::new(&format!(r"(?i){author}\s*\(\d{{4}}\)")) {
            if let Some(found) = candidates.iter().find(|s| pattern.is_match(&display_title(s))) {
                return Some(found);
            }
        }

        if let Some(found) = candidates
            .iter()
            .find(|s| final_path_segment(&s.url).to_lowercase().contains(author.as_str()))
        {
            return Some(found);
        }
    }

    if !candidates.is_empty() {
        debug!(citation = raw, "no specific match, falling back to first candidate");
    }
    candidates.first()
}

fn display_title(source: &SourceRef) -> String {
    source
        .title
        .as_deref()
        .or(source.citation.as_deref())
        .unwrap_or("")
        .to_lowercase()
}
