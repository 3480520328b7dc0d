//! Application state shared across the session task and callers.
//!
//! The [`AppState`] struct is wrapped in `Arc<Mutex<>>` so the session loop,
//! concurrent metadata fetches, and preview operations can all reach it.
//! The lock is never held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use alexandria_net::ApiClient;
use alexandria_shared::sources::{final_path_segment, SourceDetail, SourceRef};
use alexandria_shared::types::OrganizationId;
use alexandria_store::Database;

use crate::preview::PreviewStore;

/// Central application state.
pub struct AppState {
    /// The organization whose corpus the session is scoped to.
    /// `None` until one is selected.
    pub organization: Option<OrganizationId>,

    /// Handle to the local SQLite database.
    /// `None` when running without persistent history.
    pub database: Option<Database>,

    /// Per-source metadata, keyed by source URL.  Scoped to the current
    /// organization context: switching organizations clears it.
    pub source_details: HashMap<String, SourceDetail>,

    /// Per-document viewer state and the active preview handle.
    pub preview: PreviewStore,
}

impl AppState {
    /// Create a new, uninitialised application state.
    pub fn new() -> Self {
        Self {
            organization: None,
            database: None,
            source_details: HashMap::new(),
            preview: PreviewStore::default(),
        }
    }

    /// Switch the active organization, invalidating the metadata cache when
    /// the organization actually changes.
    pub fn set_organization(&mut self, organization: OrganizationId) {
        if self.organization != Some(organization) {
            self.source_details.clear();
        }
        self.organization = Some(organization);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch metadata for every given source concurrently and populate the
/// cache as results arrive.
///
/// Fetches are independent and may complete out of order; insertion is
/// last-writer-wins per URL.  Results are dropped wholesale if the active
/// organization changed while a fetch was in flight.
pub async fn refresh_source_details(
    api: &ApiClient,
    state: &Arc<Mutex<AppState>>,
    organization: OrganizationId,
    sources: Vec<SourceRef>,
) {
    let mut fetches: FuturesUnordered<_> = sources
        .into_iter()
        .map(|source| {
            let api = api.clone();
            async move {
                let filename = final_path_segment(&source.url).to_string();
                let detail = api.source_info(&organization, &filename).await;
                (source.url, detail)
            }
        })
        .collect();

    while let Some((url, detail)) = fetches.next().await {
        let Ok(mut guard) = state.lock() else { return };
        if guard.organization != Some(organization) {
            debug!("organization changed mid-fetch, discarding source details");
            return;
        }
        guard.source_details.insert(url, detail);
    }
}
