//! Per-document preview state and the active preview's binary handle.
//!
//! Viewer state (page, zoom, fullscreen) is keyed by a content-addressed
//! [`DocumentKey`] derived from organization and filename, so entries are
//! stable across repeated fetches of the same document.  At most one key is
//! actively previewed at a time; its fetched bytes live inside the store
//! and are dropped as soon as another key takes over.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{debug, warn};

use alexandria_net::ApiClient;
use alexandria_shared::sources::final_path_segment;
use alexandria_shared::types::OrganizationId;

use crate::error::{ClientError, Result};
use crate::state::AppState;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;

/// Stable identity of a previewable document: BLAKE3 of organization id and
/// filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentKey([u8; 32]);

impl DocumentKey {
    pub fn derive(organization: &OrganizationId, filename: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(organization.to_string().as_bytes());
        hasher.update(b"/");
        hasher.update(filename.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Viewer state for one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewState {
    /// Page count, known once the viewer has parsed the document.
    pub num_pages: Option<u32>,
    pub current_page: u32,
    pub zoom: f32,
    pub fullscreen: bool,
}

impl Default for PreviewState {
    fn default() -> Self {
        Self {
            num_pages: None,
            current_page: 1,
            zoom: 1.0,
            fullscreen: false,
        }
    }
}

struct ActivePreview {
    key: DocumentKey,
    data: Bytes,
}

/// Keyed store of per-document viewer state.
///
/// Entries are created lazily and never implicitly destroyed; only the
/// transient binary handle of the active preview is released when the
/// active key changes.
#[derive(Default)]
pub struct PreviewStore {
    states: HashMap<DocumentKey, PreviewState>,
    active: Option<ActivePreview>,
    pending: Option<DocumentKey>,
}

impl PreviewStore {
    /// Current state for a key, or the default when none exists yet.
    pub fn state(&self, key: &DocumentKey) -> PreviewState {
        self.states.get(key).copied().unwrap_or_default()
    }

    fn entry(&mut self, key: DocumentKey) -> &mut PreviewState {
        self.states.entry(key).or_default()
    }

    /// Record the parsed page count and rewind to the first page.
    pub fn set_num_pages(&mut self, key: DocumentKey, num_pages: u32) {
        let state = self.entry(key);
        state.num_pages = Some(num_pages);
        state.current_page = 1;
    }

    /// Jump to a page, clamped to `[1, num_pages]` (or page 1 while the
    /// page count is unknown).
    pub fn set_page(&mut self, key: DocumentKey, page: u32) {
        let state = self.entry(key);
        let last = state.num_pages.unwrap_or(1).max(1);
        state.current_page = page.clamp(1, last);
    }

    pub fn next_page(&mut self, key: DocumentKey) {
        let page = self.entry(key).current_page;
        self.set_page(key, page.saturating_add(1));
    }

    pub fn prev_page(&mut self, key: DocumentKey) {
        let page = self.entry(key).current_page;
        self.set_page(key, page.saturating_sub(1));
    }

    /// Adjust zoom by `delta` (the caller picks the step), clamped to
    /// `[0.5, 3.0]`.
    pub fn zoom_by(&mut self, key: DocumentKey, delta: f32) {
        let state = self.entry(key);
        state.zoom = (state.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn toggle_fullscreen(&mut self, key: DocumentKey) -> bool {
        let state = self.entry(key);
        state.fullscreen = !state.fullscreen;
        state.fullscreen
    }

    /// Mark a key as the one whose fetch is in flight.  A later
    /// [`PreviewStore::activate`] for any other key is discarded.
    pub fn begin_fetch(&mut self, key: DocumentKey) {
        self.pending = Some(key);
    }

    /// Install fetched bytes as the active preview.  Returns `false` (and
    /// drops the bytes) when the key is no longer the pending one.
    pub fn activate(&mut self, key: DocumentKey, data: Bytes) -> bool {
        if self.pending != Some(key) {
            return false;
        }
        self.pending = None;
        // Replacing `active` drops the previous preview's handle.
        self.active = Some(ActivePreview { key, data });
        self.states.entry(key).or_default();
        true
    }

    /// Close the active preview, releasing its binary handle.
    pub fn close(&mut self) -> Option<DocumentKey> {
        self.pending = None;
        self.active.take().map(|active| active.key)
    }

    pub fn active_key(&self) -> Option<DocumentKey> {
        self.active.as_ref().map(|active| active.key)
    }

    pub fn active_data(&self) -> Option<&Bytes> {
        self.active.as_ref().map(|active| &active.data)
    }
}

/// Outcome of a preview toggle.
#[derive(Debug, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// The key was already active and has been closed.
    Hidden,
    /// The document is now actively previewed.
    Shown(DocumentKey),
    /// The fetch completed but another key took over meanwhile.
    Superseded,
    /// The preview fetch failed; the document was downloaded instead.
    Downloaded(PathBuf),
}

/// Toggle the preview for a source URL.
///
/// Fetches the document when it is not the active preview, closes it when
/// it is.  A failed fetch falls back to downloading the same resource into
/// `download_dir`; only when the fallback also fails does the caller see an
/// error.
pub async fn toggle_preview(
    api: &ApiClient,
    state: &Arc<Mutex<AppState>>,
    organization: OrganizationId,
    source_url: &str,
    download_dir: &Path,
) -> Result<PreviewOutcome> {
    let filename = match final_path_segment(source_url) {
        "" => "document.pdf".to_string(),
        name => name.to_string(),
    };
    let key = DocumentKey::derive(&organization, &filename);

    {
        let mut guard = state.lock().map_err(|_| ClientError::LockPoisoned)?;
        if guard.preview.active_key() == Some(key) {
            guard.preview.close();
            return Ok(PreviewOutcome::Hidden);
        }
        guard.preview.begin_fetch(key);
    }

    match api.fetch_document(source_url).await {
        Ok(data) => {
            let mut guard = state.lock().map_err(|_| ClientError::LockPoisoned)?;
            if guard.preview.activate(key, data) {
                debug!(key = %key.to_hex(), "preview activated");
                Ok(PreviewOutcome::Shown(key))
            } else {
                debug!(key = %key.to_hex(), "preview fetch superseded, discarding");
                Ok(PreviewOutcome::Superseded)
            }
        }
        Err(e) => {
            warn!(url = source_url, error = %e, "preview fetch failed, falling back to download");
            let dest = download_dir.join(&filename);
            api.download_document(source_url, &dest).await?;

            let mut guard = state.lock().map_err(|_| ClientError::LockPoisoned)?;
            if guard.preview.pending == Some(key) {
                guard.preview.pending = None;
            }
            Ok(PreviewOutcome::Downloaded(dest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> DocumentKey {
        DocumentKey::derive(&OrganizationId::new(), &format!("doc-{n}.pdf"))
    }

    #[test]
    fn derived_keys_are_stable_and_distinct() {
        let org = OrganizationId::new();
        let a = DocumentKey::derive(&org, "paper.pdf");
        let b = DocumentKey::derive(&org, "paper.pdf");
        let c = DocumentKey::derive(&org, "other.pdf");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn pagination_clamps_to_bounds() {
        let mut store = PreviewStore::default();
        let k = key(1);
        store.set_num_pages(k, 10);

        store.set_page(k, 15);
        assert_eq!(store.state(&k).current_page, 10);

        store.set_page(k, 0);
        assert_eq!(store.state(&k).current_page, 1);

        store.prev_page(k);
        assert_eq!(store.state(&k).current_page, 1);

        store.set_page(k, 10);
        store.next_page(k);
        assert_eq!(store.state(&k).current_page, 10);
    }

    #[test]
    fn pagination_without_known_page_count_stays_on_first_page() {
        let mut store = PreviewStore::default();
        let k = key(2);
        store.next_page(k);
        assert_eq!(store.state(&k).current_page, 1);
    }

    #[test]
    fn zoom_clamps_to_range() {
        let mut store = PreviewStore::default();
        let k = key(3);

        for _ in 0..20 {
            store.zoom_by(k, 0.25);
        }
        assert_eq!(store.state(&k).zoom, MAX_ZOOM);

        for _ in 0..20 {
            store.zoom_by(k, -0.25);
        }
        assert_eq!(store.state(&k).zoom, MIN_ZOOM);
    }

    #[test]
    fn activating_a_new_key_releases_the_previous_handle() {
        let mut store = PreviewStore::default();
        let (a, b) = (key(4), key(5));

        store.begin_fetch(a);
        assert!(store.activate(a, Bytes::from_static(b"pdf-a")));
        assert_eq!(store.active_key(), Some(a));

        store.begin_fetch(b);
        assert!(store.activate(b, Bytes::from_static(b"pdf-b")));
        assert_eq!(store.active_key(), Some(b));
        assert_eq!(store.active_data().map(|d| d.as_ref()), Some(&b"pdf-b"[..]));

        // State for the replaced key survives; only the handle is gone.
        assert_eq!(store.state(&a).current_page, 1);
    }

    #[test]
    fn stale_fetch_result_is_discarded() {
        let mut store = PreviewStore::default();
        let (a, b) = (key(6), key(7));

        store.begin_fetch(a);
        // The user asks for a different document before the first fetch
        // lands.
        store.begin_fetch(b);

        assert!(!store.activate(a, Bytes::from_static(b"stale")));
        assert!(store.active_key().is_none());
        assert!(store.activate(b, Bytes::from_static(b"fresh")));
        assert_eq!(store.active_key(), Some(b));
    }

    #[test]
    fn close_clears_active_and_pending() {
        let mut store = PreviewStore::default();
        let k = key(8);
        store.begin_fetch(k);
        assert!(store.activate(k, Bytes::from_static(b"pdf")));
        assert_eq!(store.close(), Some(k));
        assert!(store.active_key().is_none());
        assert!(store.active_data().is_none());
    }

    #[tokio::test]
    async fn failed_fetch_and_failed_download_surface_terminal_error() {
        let api = ApiClient::new("http://127.0.0.1:1", "token");
        let state = Arc::new(Mutex::new(AppState::new()));
        let org = OrganizationId::new();
        let dir = tempfile::tempdir().unwrap();

        let outcome = toggle_preview(
            &api,
            &state,
            org,
            "http://127.0.0.1:1/papers/a.pdf",
            dir.path(),
        )
        .await;

        assert!(matches!(outcome, Err(ClientError::Net(_))));
    }
}
