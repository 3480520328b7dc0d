//! Citation grammar: detecting citation-shaped spans inside answer prose
//! and rendering them in a normalized display form.
//!
//! A citation span is a parenthesized run of at least ten characters that
//! contains a 4-digit year later followed by `page`/`pages` and a number,
//! e.g. `(horisberger2025bloodimmunophenotyping pages 11-13)`.  Short
//! uppercase abbreviations like `(DNA)` stay literal text.

use once_cell::sync::Lazy;
use regex::Regex;

static CANDIDATE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]{10,})\)").expect("valid regex"));

static ABBREVIATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,4}$").expect("valid regex"));

static YEAR_THEN_PAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d{4}.*pages?\s*\d+").expect("valid regex"));

static AUTHOR_BEFORE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z]+)\d{4}").expect("valid regex"));

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid regex"));

static PAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pages?\s*(\d+(?:-\d+)?)").expect("valid regex"));

/// A parsed citation span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    /// The raw matched text (without parentheses); the resolver's lookup key.
    pub raw: String,
    /// Leading author token, when the span starts `<letters><year>`.
    pub author: Option<String>,
    /// First 4-digit run.
    pub year: Option<String>,
    /// Page token: start page and optional range end.
    pub pages: Option<(String, Option<String>)>,
}

impl Citation {
    pub fn from_raw(raw: &str) -> Self {
        let author = AUTHOR_BEFORE_YEAR
            .captures(raw)
            .map(|caps| caps[1].to_string());
        let year = YEAR.find(raw).map(|m| m.as_str().to_string());
        let pages = PAGES.captures(raw).map(|caps| match caps[1].split_once('-') {
            Some((start, end)) => (start.to_string(), Some(end.to_string())),
            None => (caps[1].to_string(), None),
        });

        Self {
            raw: raw.to_string(),
            author,
            year,
            pages,
        }
    }

    /// Normalized display form: `Author (YYYY, p. N)`, `Author (YYYY,
    /// p. N1-N2)`, or `Author (YYYY)`.  A range with equal endpoints
    /// collapses to the single-page form.  Spans whose author or year could
    /// not be extracted render as their raw text.
    pub fn display(&self) -> String {
        let (author, year) = match (&self.author, &self.year) {
            (Some(author), Some(year)) => (capitalize(author), year),
            _ => return self.raw.clone(),
        };

        match &self.pages {
            Some((start, Some(end))) if start == end => format!("{author} ({year}, p. {start})"),
            Some((start, Some(end))) => format!("{author} ({year}, p. {start}-{end})"),
            Some((start, None)) => format!("{author} ({year}, p. {start})"),
            None => format!("{author} ({year})"),
        }
    }
}

/// One piece of parsed answer text, in original order.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Citation(Citation),
}

/// Split answer text into literal runs and citation spans.
///
/// Parenthesized runs that fail the citation grammar stay inside the
/// surrounding literal text.  The caller is expected to hand in
/// reference-stripped text (see [`crate::message::strip_references`]).
pub fn parse_citations(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in CANDIDATE_SPAN.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let raw = inner.as_str();

        if ABBREVIATION.is_match(raw) || !YEAR_THEN_PAGES.is_match(raw) {
            continue;
        }

        if whole.start() > last {
            segments.push(Segment::Literal(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Citation(Citation::from_raw(raw)));
        last = whole.end();
    }

    if last < text.len() {
        segments.push(Segment::Literal(text[last..].to_string()));
    }

    segments
}

/// Render answer text with every citation span replaced by its display form.
pub fn render(text: &str) -> String {
    parse_citations(text)
        .iter()
        .map(|segment| match segment {
            Segment::Literal(s) => s.clone(),
            Segment::Citation(c) => c.display(),
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
