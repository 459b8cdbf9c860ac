//! Application configuration.
//!
//! Loaded from `{config_dir}/graphlink/config.json` when present; every field
//! has a default so a partial file is fine.

use crate::error::{Error, Result};
use crate::graph::GRAPH_BASE_URL;
use graphlink_oauth::InteractiveMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the configured client id.
pub const CLIENT_ID_ENV: &str = "GRAPHLINK_CLIENT_ID";

/// Placeholder shipped in the default config; must be replaced by a real
/// app registration.
pub const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID";

/// How the user signs in when silent acquisition is not possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInMethod {
    /// System browser with a loopback redirect.
    #[default]
    Browser,
    /// Device code.
    DeviceCode,
}

impl From<SignInMethod> for InteractiveMethod {
    fn from(method: SignInMethod) -> Self {
        match method {
            SignInMethod::Browser => Self::Browser,
            SignInMethod::DeviceCode => Self::DeviceCode,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application (client) id of the app registration.
    pub client_id: String,
    /// Directory tenant: `common`, `organizations`, `consumers` or a tenant id.
    pub tenant: String,
    /// Scopes requested for every token.
    pub scopes: Vec<String>,
    /// Graph endpoint.
    pub graph_base_url: String,
    /// Per-request timeout for Graph calls, in seconds.
    pub request_timeout_secs: u64,
    /// How long to wait for interactive sign-in, in seconds.
    pub interactive_timeout_secs: u64,
    /// Interactive sign-in method.
    pub sign_in_method: SignInMethod,
    /// Reserved for a persistent token cache. Tokens are currently kept in
    /// memory only.
    pub token_cache_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: PLACEHOLDER_CLIENT_ID.to_string(),
            tenant: "common".to_string(),
            scopes: ["User.Read", "Mail.Send", "Files.ReadWrite", "offline_access"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            graph_base_url: GRAPH_BASE_URL.to_string(),
            request_timeout_secs: 30,
            interactive_timeout_secs: 300,
            sign_in_method: SignInMethod::Browser,
            token_cache_path: PathBuf::from("token.cache"),
        }
    }
}

impl Config {
    /// Default location of the config file.
    #[must_use]
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("graphlink")
            .join("config.json")
    }

    /// Loads the config from [`Config::path`], applying the environment
    /// override, and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// the resulting config is invalid.
    pub async fn load() -> Result<Self> {
        let config = Self::load_from(&Self::path())
            .await?
            .with_client_id_override(std::env::var(CLIENT_ID_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads the config from `path`, or defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Replaces the client id when `client_id` is a non-blank value.
    #[must_use]
    pub fn with_client_id_override(mut self, client_id: Option<String>) -> Self {
        if let Some(id) = client_id.filter(|id| !id.trim().is_empty()) {
            self.client_id = id.trim().to_string();
        }
        self
    }

    /// Checks that the config can be used to build the app.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("client_id is empty".into()));
        }
        graphlink_oauth::provider::validate_tenant(&self.tenant).map_err(|e| match e {
            graphlink_oauth::Error::InvalidConfig(reason) => Error::Config(reason),
            other => Error::Config(other.to_string()),
        })?;
        if self.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(Error::Config("no scopes configured".into()));
        }
        url::Url::parse(&self.graph_base_url)
            .map_err(|e| Error::Config(format!("graph_base_url: {e}")))?;
        if self.request_timeout_secs == 0 || self.interactive_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }

    /// Whether the client id is still the shipped placeholder.
    #[must_use]
    pub fn is_placeholder_client_id(&self) -> bool {
        self.client_id == PLACEHOLDER_CLIENT_ID
    }

    /// Graph request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Interactive sign-in timeout.
    #[must_use]
    pub const fn interactive_timeout(&self) -> Duration {
        Duration::from_secs(self.interactive_timeout_secs)
    }
}
