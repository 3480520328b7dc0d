//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client can start against a local
//! backend with zero configuration.

use std::path::PathBuf;

use alexandria_shared::types::OrganizationId;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Alexandria backend.
    /// Env: `ALEXANDRIA_API_URL`
    /// Default: `http://localhost:8000`
    pub api_url: String,

    /// Bearer token presented on every request.
    /// Env: `ALEXANDRIA_TOKEN`
    /// Default: empty (anonymous; the backend will reject protected routes).
    pub auth_token: String,

    /// UUID of the organization whose corpus is queried.
    /// Env: `ALEXANDRIA_ORG`
    /// Default: none (the CLI refuses to start without one).
    pub organization: Option<OrganizationId>,

    /// Directory where preview-fallback downloads are written.
    /// Env: `ALEXANDRIA_DOWNLOAD_DIR`
    /// Default: the system temp directory.
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            auth_token: String::new(),
            organization: None,
            download_dir: std::env::temp_dir(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ALEXANDRIA_API_URL") {
            config.api_url = url;
        }

        if let Ok(token) = std::env::var("ALEXANDRIA_TOKEN") {
            config.auth_token = token;
        }

        if let Ok(org) = std::env::var("ALEXANDRIA_ORG") {
            match OrganizationId::parse(org.trim()) {
                Ok(id) => config.organization = Some(id),
                Err(e) => {
                    tracing::warn!(value = %org, error = %e, "Invalid ALEXANDRIA_ORG, ignoring");
                }
            }
        }

        if let Ok(dir) = std::env::var("ALEXANDRIA_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(config.organization.is_none());
    }
}
