//! `OAuth2` provider configurations.

use crate::error::{Error, Result};
use url::Url;

/// Microsoft identity platform host.
const MICROSOFT_LOGIN_HOST: &str = "https://login.microsoftonline.com";

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Microsoft").
    pub name: String,
    /// Authorization endpoint URL.
    pub auth_url: Url,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Device authorization endpoint (if supported).
    pub device_auth_url: Option<Url>,
    /// Default scopes.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if URLs are invalid.
    pub fn new(
        name: impl Into<String>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            auth_url: Url::parse(auth_url.as_ref())?,
            token_url: Url::parse(token_url.as_ref())?,
            device_auth_url: None,
            default_scopes: Vec::new(),
        })
    }

    /// Sets the device authorization URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_device_auth_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.device_auth_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Microsoft identity platform (v2 endpoints) for the `common` tenant.
    ///
    /// Scopes:
    /// - `User.Read` - Read the signed-in user's profile
    /// - `Mail.Send` - Send mail as the user
    /// - `Files.ReadWrite` - Read and write the user's `OneDrive` files
    /// - `offline_access` - Refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft() -> Result<Self> {
        Self::microsoft_tenant("common")
    }

    /// Microsoft identity platform for a specific tenant (`common`,
    /// `organizations`, `consumers` or a directory id).
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant is empty, contains anything other than
    /// ASCII letters, digits, `.` and `-`, or URL parsing fails.
    pub fn microsoft_tenant(tenant: &str) -> Result<Self> {
        validate_tenant(tenant)?;

        let base = format!("{MICROSOFT_LOGIN_HOST}/{tenant}/oauth2/v2.0");
        Ok(Self::new(
            "Microsoft",
            format!("{base}/authorize"),
            format!("{base}/token"),
        )?
        .with_device_auth_url(format!("{base}/devicecode"))?
        .with_default_scopes(vec![
            "User.Read".to_string(),
            "Mail.Send".to_string(),
            "Files.ReadWrite".to_string(),
            "offline_access".to_string(),
        ]))
    }

    /// Validates that required URLs are set.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.auth_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("auth_url is empty".into()));
        }
        if self.token_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("token_url is empty".into()));
        }
        Ok(())
    }
}

/// Checks that `tenant` is a bare path segment: a tenant alias, domain
/// name or directory id.
///
/// # Errors
///
/// Returns `Error::InvalidConfig` otherwise.
pub fn validate_tenant(tenant: &str) -> Result<()> {
    if tenant.trim().is_empty() {
        return Err(Error::InvalidConfig("tenant is empty".into()));
    }
    if !tenant
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(Error::InvalidConfig(format!(
            "tenant {tenant:?} may only contain letters, digits, '.' and '-'"
        )));
    }
    Ok(())
}
