//! Token acquisition: silent first, one interactive attempt as fallback.

use crate::error::{Error, Result};
use async_trait::async_trait;
use graphlink_oauth::{
    Account, AuthenticationResult, PublicClientApp, SilentAcquisition, Token,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The identity library as seen by the token provider.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Accounts known to the identity cache.
    async fn accounts(&self) -> Vec<Account>;

    /// Tries to get a token without prompting.
    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: Option<&Account>,
    ) -> SilentAcquisition;

    /// Prompts the user to sign in.
    async fn acquire_token_interactive(
        &self,
        scopes: &[String],
    ) -> graphlink_oauth::Result<AuthenticationResult>;

    /// Forgets an account.
    async fn remove_account(&self, account: &Account) -> bool;
}

#[async_trait]
impl IdentityClient for PublicClientApp {
    async fn accounts(&self) -> Vec<Account> {
        PublicClientApp::accounts(self).await
    }

    async fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: Option<&Account>,
    ) -> SilentAcquisition {
        PublicClientApp::acquire_token_silent(self, scopes, account).await
    }

    async fn acquire_token_interactive(
        &self,
        scopes: &[String],
    ) -> graphlink_oauth::Result<AuthenticationResult> {
        PublicClientApp::acquire_token_interactive(self, scopes).await
    }

    async fn remove_account(&self, account: &Account) -> bool {
        PublicClientApp::remove_account(self, account).await
    }
}

/// Source of access tokens for outbound requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token for the configured scopes.
    async fn acquire(&self) -> Result<Token>;
}

/// Silent acquisition for the first cached account, then at most one
/// interactive prompt. Never retries.
pub struct InteractiveFallbackProvider {
    identity: Arc<dyn IdentityClient>,
    scopes: Vec<String>,
}

impl InteractiveFallbackProvider {
    /// Creates a provider requesting `scopes` from `identity`.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityClient>, scopes: Vec<String>) -> Self {
        Self { identity, scopes }
    }

    /// Scopes requested on every acquisition.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

#[async_trait]
impl TokenProvider for InteractiveFallbackProvider {
    async fn acquire(&self) -> Result<Token> {
        let accounts = self.identity.accounts().await;

        match self
            .identity
            .acquire_token_silent(&self.scopes, accounts.first())
            .await
        {
            SilentAcquisition::Silent(result) => {
                debug!(username = %result.account.username, "token acquired silently");
                Ok(result.token)
            }
            SilentAcquisition::InteractionRequired(reason) => {
                info!(%reason, "silent acquisition needs interaction, prompting user");
                let result = self
                    .identity
                    .acquire_token_interactive(&self.scopes)
                    .await?;
                Ok(result.token)
            }
            SilentAcquisition::Failed(e) => {
                warn!("silent acquisition failed: {e}");
                Err(Error::Auth(e))
            }
        }
    }
}
