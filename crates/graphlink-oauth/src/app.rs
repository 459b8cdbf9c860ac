//! Public client application: silent and interactive token acquisition.
//!
//! [`PublicClientApp`] owns the account cache. Callers list accounts, try a
//! silent acquisition, and decide themselves what to do when it reports
//! [`SilentAcquisition::InteractionRequired`].

use crate::cache::{Account, TokenCache};
use crate::error::{Error, Result};
use crate::flow::{
    AuthorizationCodeFlow, DeviceAuthorization, DeviceFlow, LoopbackListener, OAuthClient,
    random_urlsafe,
};
use crate::provider::Provider;
use crate::token::Token;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Scopes added to interactive requests so the provider issues an ID token.
const IDENTITY_SCOPES: &[&str] = &["openid", "profile"];

/// Opens the authorization URL for the user.
pub type BrowserLauncher = Arc<dyn Fn(&Url) -> Result<()> + Send + Sync>;

/// Shows device-code instructions to the user.
pub type DevicePrompt = Arc<dyn Fn(&DeviceAuthorization) + Send + Sync>;

/// How interactive sign-in talks to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractiveMethod {
    /// System browser with a loopback redirect.
    #[default]
    Browser,
    /// Device code shown to the user, entered on any device.
    DeviceCode,
}

/// A token together with the account it was issued for.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    /// The access token.
    pub token: Token,
    /// The signed-in account.
    pub account: Account,
}

/// Outcome of a silent acquisition attempt.
#[derive(Debug)]
pub enum SilentAcquisition {
    /// A token was served from the cache or a refresh.
    Silent(AuthenticationResult),
    /// Only an interactive sign-in can produce a token.
    InteractionRequired(String),
    /// Any other failure; not recoverable by prompting.
    Failed(Error),
}

/// Builder for [`PublicClientApp`].
pub struct PublicClientAppBuilder {
    client: OAuthClient,
    redirect_host: String,
    method: InteractiveMethod,
    interactive_timeout: Duration,
    browser: BrowserLauncher,
    device_prompt: DevicePrompt,
}

impl PublicClientAppBuilder {
    /// Host part of the loopback redirect URI (default `localhost`).
    #[must_use]
    pub fn with_redirect_host(mut self, host: impl Into<String>) -> Self {
        self.redirect_host = host.into();
        self
    }

    /// Interactive sign-in method.
    #[must_use]
    pub const fn with_interactive_method(mut self, method: InteractiveMethod) -> Self {
        self.method = method;
        self
    }

    /// How long to wait for the browser redirect.
    #[must_use]
    pub const fn with_interactive_timeout(mut self, timeout: Duration) -> Self {
        self.interactive_timeout = timeout;
        self
    }

    /// Replaces the system browser launcher.
    #[must_use]
    pub fn with_browser_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&Url) -> Result<()> + Send + Sync + 'static,
    {
        self.browser = Arc::new(launcher);
        self
    }

    /// Replaces the device-code prompt (default logs the instructions).
    #[must_use]
    pub fn with_device_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&DeviceAuthorization) + Send + Sync + 'static,
    {
        self.device_prompt = Arc::new(prompt);
        self
    }

    /// Replaces the HTTP client used for token endpoint calls.
    #[must_use]
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.client = self.client.with_http_client(http_client);
        self
    }

    /// Builds the application.
    ///
    /// # Errors
    ///
    /// Returns an error if the client id is empty or the provider is invalid.
    pub fn build(self) -> Result<PublicClientApp> {
        if self.client.client_id.trim().is_empty() {
            return Err(Error::InvalidConfig("client_id is empty".into()));
        }
        if self.redirect_host.trim().is_empty() {
            return Err(Error::InvalidConfig("redirect host is empty".into()));
        }
        self.client.provider.validate()?;

        Ok(PublicClientApp {
            client: self.client,
            cache: TokenCache::new(),
            redirect_host: self.redirect_host,
            method: self.method,
            interactive_timeout: self.interactive_timeout,
            browser: self.browser,
            device_prompt: self.device_prompt,
        })
    }
}

/// Identity client for a public (secretless) application.
pub struct PublicClientApp {
    client: OAuthClient,
    cache: TokenCache,
    redirect_host: String,
    method: InteractiveMethod,
    interactive_timeout: Duration,
    browser: BrowserLauncher,
    device_prompt: DevicePrompt,
}

impl fmt::Debug for PublicClientApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicClientApp")
            .field("client_id", &self.client.client_id)
            .field("provider", &self.client.provider.name)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl PublicClientApp {
    /// Starts building an application for `client_id`.
    #[must_use]
    pub fn builder(client_id: impl Into<String>, provider: Provider) -> PublicClientAppBuilder {
        PublicClientAppBuilder {
            client: OAuthClient::new(client_id, provider),
            redirect_host: "localhost".to_string(),
            method: InteractiveMethod::default(),
            interactive_timeout: Duration::from_secs(300),
            browser: Arc::new(open_system_browser),
            device_prompt: Arc::new(|auth: &DeviceAuthorization| info!("{}", auth.instructions())),
        }
    }

    /// Accounts known to the cache, oldest sign-in first.
    pub async fn accounts(&self) -> Vec<Account> {
        self.cache.accounts().await
    }

    /// Forgets an account. Returns false if it was unknown.
    pub async fn remove_account(&self, account: &Account) -> bool {
        let removed = self.cache.remove(account).await;
        if removed {
            info!(username = %account.username, "account removed");
        }
        removed
    }

    /// Tries to get a token without user interaction.
    ///
    /// Serves a cached token when it is still valid and covers `scopes`,
    /// otherwise redeems the account's refresh token.
    pub async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: Option<&Account>,
    ) -> SilentAcquisition {
        let Some(account) = account else {
            return SilentAcquisition::InteractionRequired("no account signed in".into());
        };

        if let Some(token) = self.cache.valid_token(account, scopes).await {
            debug!(username = %account.username, "serving cached token");
            return SilentAcquisition::Silent(AuthenticationResult {
                token,
                account: account.clone(),
            });
        }

        let Some(cached) = self.cache.token(account).await else {
            return SilentAcquisition::InteractionRequired("account not in cache".into());
        };
        if cached.refresh_token.is_none() {
            return SilentAcquisition::InteractionRequired("no refresh token".into());
        }

        match self.client.refresh_token(&cached, Some(scopes)).await {
            Ok(token) => {
                self.cache.store(account.clone(), token.clone(), scopes).await;
                SilentAcquisition::Silent(AuthenticationResult {
                    token,
                    account: account.clone(),
                })
            }
            Err(e) if e.requires_interaction() => {
                debug!("silent refresh needs interaction: {e}");
                SilentAcquisition::InteractionRequired(e.to_string())
            }
            Err(e) => {
                warn!("silent refresh failed: {e}");
                SilentAcquisition::Failed(e)
            }
        }
    }

    /// Signs the user in interactively and caches the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be opened, the user cancels,
    /// the redirect times out, or the token exchange fails.
    pub async fn acquire_token_interactive(&self, scopes: &[String]) -> Result<AuthenticationResult> {
        let request_scopes = with_identity_scopes(scopes);

        let token = match self.method {
            InteractiveMethod::Browser => self.browser_sign_in(&request_scopes).await?,
            InteractiveMethod::DeviceCode => {
                let prompt = Arc::clone(&self.device_prompt);
                DeviceFlow::new(self.client.clone())
                    .authorize(Some(&request_scopes), |auth| prompt(auth))
                    .await?
            }
        };

        let account = Account::from_token(&token);
        self.cache.store(account.clone(), token.clone(), scopes).await;
        info!(username = %account.username, "interactive sign-in complete");

        Ok(AuthenticationResult { token, account })
    }

    async fn browser_sign_in(&self, scopes: &[String]) -> Result<Token> {
        let listener = LoopbackListener::bind(&self.redirect_host).await?;
        let client = self
            .client
            .clone()
            .with_redirect_uri(listener.redirect_uri());
        let flow = AuthorizationCodeFlow::new(client).with_pkce();

        let state = random_urlsafe(16);
        let url = flow.authorization_url(Some(scopes), Some(&state))?;

        debug!("opening browser for sign-in");
        (self.browser)(&url)?;

        let redirect = listener
            .accept_redirect(&state, self.interactive_timeout)
            .await?;
        flow.exchange_code(&redirect.code, None).await
    }
}

fn open_system_browser(url: &Url) -> Result<()> {
    opener::open_browser(url.as_str()).map_err(|e| Error::Browser(e.to_string()))
}

fn with_identity_scopes(scopes: &[String]) -> Vec<String> {
    let mut all = scopes.to_vec();
    for scope in IDENTITY_SCOPES {
        if !all.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
            all.push((*scope).to_string());
        }
    }
    all
}
