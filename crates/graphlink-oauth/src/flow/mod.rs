//! `OAuth2` authorization flows.

mod code;
mod device;
mod loopback;
mod pkce;

pub use code::AuthorizationCodeFlow;
pub use device::{DeviceAuthorization, DeviceFlow};
pub use loopback::{LoopbackListener, Redirect};
pub use pkce::PkceChallenge;
pub(crate) use pkce::random_urlsafe;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

/// Common `OAuth2` client configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Redirect URI for authorization code flow.
    pub redirect_uri: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Replaces the HTTP client used for token endpoint calls.
    #[must_use]
    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Refreshes an access token using a refresh token.
    ///
    /// `scopes` narrows the new access token; the provider defaults are used
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or if the token has no refresh token.
    pub async fn refresh_token(&self, token: &Token, scopes: Option<&[String]>) -> Result<Token> {
        let refresh_token = token.refresh_token()?;
        let scope_str = self.scope_string(scopes);

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if !scope_str.is_empty() {
            params.insert("scope", &scope_str);
        }

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        debug!(provider = %self.provider.name, "refreshing access token");
        let mut new_token = self.post_token_request(&params).await?;

        // Preserve refresh token if not returned
        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }
        // Same for the ID token, it identifies the account
        if new_token.id_token.is_none() {
            new_token.id_token.clone_from(&token.id_token);
        }

        Ok(new_token)
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub(crate) async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("client_id", &self.client_id);

        if let Some(uri) = redirect_uri.or(self.redirect_uri.as_deref()) {
            params.insert("redirect_uri", uri);
        }

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        if let Some(verifier) = code_verifier {
            params.insert("code_verifier", verifier);
        }

        debug!(provider = %self.provider.name, "exchanging authorization code");
        self.post_token_request(&params).await
    }

    /// Joins the requested scopes, falling back to the provider defaults.
    pub(crate) fn scope_string(&self, scopes: Option<&[String]>) -> String {
        scopes.map_or_else(|| self.provider.default_scopes.join(" "), |s| s.join(" "))
    }

    /// Posts a form to the token endpoint and parses the token response.
    async fn post_token_request(&self, params: &HashMap<&str, &str>) -> Result<Token> {
        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let token_response: TokenResponse = response.json().await?;
        Token::from_response(token_response)
    }
}

/// Converts a non-success token endpoint response into an [`Error`].
pub(crate) async fn error_from_response(response: reqwest::Response) -> Error {
    let status = response.status();
    match response.text().await {
        Ok(body) => serde_json::from_str::<ErrorResponse>(&body).map_or_else(
            |_| Error::InvalidResponse(format!("HTTP {status}: {body}")),
            ErrorResponse::into_error,
        ),
        Err(e) => Error::Http(e),
    }
}
