//! Authenticated HTTP client for the Alexandria backend.
//!
//! Everything except the streaming query (see [`crate::stream`]) is plain
//! request/response: per-source metadata lookup and binary document
//! retrieval.  Source URLs reported by the backend may be relative; they are
//! joined against the configured base URL before fetching.

use std::path::Path;

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

use alexandria_shared::sources::SourceDetail;
use alexandria_shared::types::OrganizationId;

use crate::error::{NetError, Result};

/// HTTP client carrying the API base URL and the caller's bearer token.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) auth_token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            auth_token: auth_token.into(),
        }
    }

    /// Join a possibly-relative path or source URL against the API base.
    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Look up supplementary metadata for one source document.
    ///
    /// Never fails: any transport or decode problem produces a synthesized
    /// fallback detail so callers can proceed.
    pub async fn source_info(
        &self,
        organization: &OrganizationId,
        filename: &str,
    ) -> SourceDetail {
        match self.try_source_info(organization, filename).await {
            Ok(detail) => detail,
            Err(e) => {
                debug!(filename, error = %e, "source info lookup failed, using fallback");
                SourceDetail::fallback(filename)
            }
        }
    }

    async fn try_source_info(
        &self,
        organization: &OrganizationId,
        filename: &str,
    ) -> Result<SourceDetail> {
        let url = self.url(&format!("/papers/{organization}/sources/{filename}/info"));
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Fetch a source document's bytes (for the preview viewer).
    pub async fn fetch_document(&self, source_url: &str) -> Result<Bytes> {
        let url = self.url(source_url);
        debug!(url = %url, "fetching document");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(NetError::EmptyDocument);
        }
        Ok(bytes)
    }

    /// Download a source document to disk.  Used as the fallback when an
    /// in-app preview fetch fails.
    pub async fn download_document(&self, source_url: &str, dest: &Path) -> Result<u64> {
        let bytes = self.fetch_document(source_url).await?;
        tokio::fs::write(dest, &bytes).await?;

        info!(dest = %dest.display(), size = bytes.len(), "document downloaded");
        Ok(bytes.len() as u64)
    }
}

/// Build a [`NetError::Status`] from a non-success response, pulling the
/// backend's `detail` field out of the body when present.
pub(crate) async fn status_error(response: reqwest::Response) -> NetError {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Option<String>,
    }

    let status = response.status().as_u16();
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .unwrap_or_else(|| "request failed".to_string());

    NetError::Status { status, detail }
}
