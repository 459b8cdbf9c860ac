//! Device Authorization Flow implementation (RFC 8628).

use super::{OAuthClient, error_from_response};
use crate::error::{Error, Result};
use crate::token::{Token, TokenResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Device authorization response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceAuthorization {
    /// Device code for polling.
    pub device_code: String,
    /// User code to display to the user.
    pub user_code: String,
    /// Verification URI where user should go.
    pub verification_uri: String,
    /// Complete verification URI (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    /// Expiration time in seconds.
    pub expires_in: u32,
    /// Polling interval in seconds (minimum 5 seconds).
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Ready-made instructions for the user (Microsoft sends one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DeviceAuthorization {
    /// Text to show the user: the provider's message, or one built from the
    /// verification URI and user code.
    #[must_use]
    pub fn instructions(&self) -> String {
        self.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, open {} and enter the code {}",
                self.verification_uri, self.user_code
            )
        })
    }

    /// Number of polls that fit into the code's lifetime.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        (self.expires_in / self.interval.max(1)) as usize + 1
    }
}

const fn default_interval() -> u32 {
    5
}

/// Device Authorization Flow for `OAuth2`.
///
/// For hosts without a usable browser: the user signs in on another device
/// with a short code.
#[derive(Debug)]
pub struct DeviceFlow {
    client: OAuthClient,
}

impl DeviceFlow {
    /// Creates a new device flow.
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self { client }
    }

    /// Requests device authorization from the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider has no device endpoint or the request fails.
    pub async fn request_device_authorization(
        &self,
        scopes: Option<&[String]>,
    ) -> Result<DeviceAuthorization> {
        let device_auth_url = self
            .client
            .provider
            .device_auth_url
            .as_ref()
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "Provider {} does not support device flow",
                    self.client.provider.name
                ))
            })?;

        let scope_str = self.client.scope_string(scopes);

        let mut params = HashMap::new();
        params.insert("client_id", self.client.client_id.as_str());
        if !scope_str.is_empty() {
            params.insert("scope", &scope_str);
        }

        let response = self
            .client
            .http_client
            .post(device_auth_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response.json().await.map_err(Into::into)
    }

    /// Waits `interval`, then polls the token endpoint once.
    ///
    /// # Errors
    ///
    /// Returns `Error::AccessDenied` if the user declined, `Error::TokenExpired`
    /// if the device code expired, and an `OAuth` error with code
    /// `authorization_pending` or `slow_down` when polling should continue.
    pub async fn poll_for_token(&self, device_code: &str, interval: Duration) -> Result<Token> {
        tokio::time::sleep(interval).await;

        let mut params = HashMap::new();
        params.insert("grant_type", "urn:ietf:params:oauth:grant-type:device_code");
        params.insert("device_code", device_code);
        params.insert("client_id", &self.client.client_id);

        let response = self
            .client
            .http_client
            .post(self.client.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return match error_from_response(response).await {
                Error::OAuth { error, .. } if error == "access_denied" => Err(Error::AccessDenied),
                Error::OAuth { error, .. } if error == "expired_token" => Err(Error::TokenExpired),
                other => Err(other),
            };
        }

        let token_response: TokenResponse = response.json().await?;
        Token::from_response(token_response)
    }

    /// Requests a device code, hands it to `prompt`, then polls until the
    /// user completes sign-in or the code expires.
    ///
    /// # Errors
    ///
    /// Returns an error if authorization fails, is denied, or times out.
    pub async fn authorize<F>(&self, scopes: Option<&[String]>, prompt: F) -> Result<Token>
    where
        F: FnOnce(&DeviceAuthorization),
    {
        let auth = self.request_device_authorization(scopes).await?;
        prompt(&auth);

        let mut interval = Duration::from_secs(u64::from(auth.interval));
        let max_attempts = auth.max_attempts();

        for attempt in 1..=max_attempts {
            match self.poll_for_token(&auth.device_code, interval).await {
                Ok(token) => return Ok(token),
                Err(Error::OAuth { ref error, .. }) if error == "authorization_pending" => {
                    debug!(attempt, "device authorization pending");
                }
                Err(Error::OAuth { ref error, .. }) if error == "slow_down" => {
                    // RFC 8628 section 3.5
                    interval += Duration::from_secs(5);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Timeout(Duration::from_secs(auth.expires_in.into())))
    }
}
