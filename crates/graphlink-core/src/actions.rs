//! User-facing actions: sign in, send mail, upload a file.
//!
//! Each handler makes one Graph call and turns the result into an
//! [`ActionOutcome`] carrying the status line to display. Handlers never
//! return errors; failures are reported through the outcome.

use crate::auth::{IdentityClient, InteractiveFallbackProvider, RequestAuthenticator};
use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::graph::{GraphClient, OutgoingMail};
use graphlink_oauth::{DeviceAuthorization, Provider, PublicClientApp, PublicClientAppBuilder};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Status shown when an action runs before the context was built.
pub const NOT_INITIALIZED: &str = "Error: client not initialized.";

/// Everything the actions need, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    identity: Arc<dyn IdentityClient>,
    graph: GraphClient,
}

impl AppContext {
    /// Builds the identity app and Graph client described by `config`.
    ///
    /// Device-code instructions, if that sign-in method is configured, are
    /// only logged; use [`AppContext::from_config_with_device_prompt`] to
    /// show them to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let app = Self::app_builder(config)?.build()?;
        Self::with_identity(Arc::new(app), config)
    }

    /// Like [`AppContext::from_config`], with `prompt` receiving the
    /// verification URL and user code during a device-code sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn from_config_with_device_prompt<F>(config: &Config, prompt: F) -> Result<Self>
    where
        F: Fn(&DeviceAuthorization) + Send + Sync + 'static,
    {
        let app = Self::app_builder(config)?.with_device_prompt(prompt).build()?;
        Self::with_identity(Arc::new(app), config)
    }

    fn app_builder(config: &Config) -> Result<PublicClientAppBuilder> {
        config.validate()?;
        if config.is_placeholder_client_id() {
            warn!("client_id is still the placeholder; sign-in will fail until it is set");
        }

        let provider = Provider::microsoft_tenant(&config.tenant)?;
        Ok(PublicClientApp::builder(config.client_id.clone(), provider)
            .with_interactive_method(config.sign_in_method.into())
            .with_interactive_timeout(config.interactive_timeout()))
    }

    /// Builds the context around an existing identity client.
    ///
    /// # Errors
    ///
    /// Returns an error if the Graph client cannot be built.
    pub fn with_identity(identity: Arc<dyn IdentityClient>, config: &Config) -> Result<Self> {
        let provider = InteractiveFallbackProvider::new(Arc::clone(&identity), config.scopes.clone());
        let authenticator = RequestAuthenticator::new(Arc::new(provider));
        let graph = GraphClient::new(&config.graph_base_url, config.request_timeout(), authenticator)?;

        Ok(Self { identity, graph })
    }

    /// The Graph client.
    #[must_use]
    pub const fn graph(&self) -> &GraphClient {
        &self.graph
    }

    /// The identity client.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityClient {
        self.identity.as_ref()
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

/// Result of an action, with the status line to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action completed.
    Success(String),
    /// Sign-in or token acquisition failed.
    AuthError(String),
    /// The API call failed or could not be made.
    ApiError(String),
}

impl ActionOutcome {
    fn failure(prefix: &str, err: &Error) -> Self {
        let message = format!("{prefix}: {err}");
        match err.kind() {
            ErrorKind::Auth => Self::AuthError(message),
            ErrorKind::Api => Self::ApiError(message),
        }
    }

    /// The status line.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::AuthError(m) | Self::ApiError(m) => m,
        }
    }

    /// Whether the action completed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

fn not_initialized() -> ActionOutcome {
    warn!("action invoked before the client was initialized");
    ActionOutcome::ApiError(NOT_INITIALIZED.to_string())
}

/// Signs in interactively and greets the user.
///
/// Cached accounts are forgotten first so the user always gets to pick an
/// account.
pub async fn sign_in(ctx: Option<&AppContext>) -> ActionOutcome {
    let Some(ctx) = ctx else {
        return not_initialized();
    };

    for account in ctx.identity.accounts().await {
        ctx.identity.remove_account(&account).await;
    }

    match ctx.graph.me().await {
        Ok(user) => {
            info!(user = %user.label(), "signed in");
            ActionOutcome::Success(format!("Signed in as {}.", user.label()))
        }
        Err(e) => {
            warn!("sign-in failed: {e}");
            ActionOutcome::failure("Error signing in", &e)
        }
    }
}

/// Sends a plain-text mail to `to`.
///
/// The recipient is passed through as entered; Graph rejects invalid ones.
pub async fn send_mail(
    ctx: Option<&AppContext>,
    subject: &str,
    body: &str,
    to: &str,
) -> ActionOutcome {
    let Some(ctx) = ctx else {
        return not_initialized();
    };

    let mail = OutgoingMail::new(subject, body, to);
    match ctx.graph.send_mail(&mail).await {
        Ok(()) => ActionOutcome::Success("Email sent successfully.".to_string()),
        Err(e) => {
            warn!("send mail failed: {e}");
            ActionOutcome::failure("Error sending email", &e)
        }
    }
}

/// Uploads the file at `path` to the root of the user's OneDrive.
pub async fn upload_file(ctx: Option<&AppContext>, path: &Path) -> ActionOutcome {
    let Some(ctx) = ctx else {
        return not_initialized();
    };

    match ctx.graph.upload_path(path).await {
        Ok(item) => {
            let name = if item.name.is_empty() {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                item.name
            };
            ActionOutcome::Success(format!("File uploaded to OneDrive: {name}"))
        }
        Err(e) => {
            warn!(path = %path.display(), "upload failed: {e}");
            ActionOutcome::failure("Error uploading file", &e)
        }
    }
}
