//! # alexandria-shared
//!
//! Domain logic for the Alexandria research-assistant client: the wire
//! protocol of the streaming query endpoint, the chat message model and its
//! event reducer, the citation grammar, and the citation-to-source matching
//! heuristics.  Everything in this crate is pure -- no I/O, no clocks --
//! so it can be exercised directly in tests.

pub mod citation;
pub mod message;
pub mod protocol;
pub mod resolve;
pub mod sources;
pub mod types;

pub use citation::{parse_citations, Citation, Segment};
pub use message::{strip_references, ChatMessage, Role};
pub use protocol::{AnswerEvent, StreamChunk};
pub use resolve::{author_token, resolve};
pub use sources::{dedupe_refs, dedupe_sources, final_path_segment, SourceDetail, SourceEntry, SourceRef};
pub use types::OrganizationId;
