//! Browser sign-in: the authorization request URL and the code exchange.

use super::{OAuthClient, PkceChallenge};
use crate::error::Result;
use crate::token::Token;
use url::Url;

/// One authorization-code sign-in, optionally bound to a PKCE pair.
///
/// Build the URL, send the user there, then hand the code that comes back
/// on the redirect to [`AuthorizationCodeFlow::exchange_code`]. Use a new
/// value per sign-in so each gets its own verifier.
#[derive(Debug)]
pub struct AuthorizationCodeFlow {
    client: OAuthClient,
    pkce: Option<PkceChallenge>,
}

impl AuthorizationCodeFlow {
    /// Without PKCE; see [`AuthorizationCodeFlow::with_pkce`].
    #[must_use]
    pub const fn new(client: OAuthClient) -> Self {
        Self { client, pkce: None }
    }

    /// Attaches a fresh PKCE pair. Microsoft rejects public-client code
    /// redemptions without one.
    #[must_use]
    pub fn with_pkce(mut self) -> Self {
        self.pkce = Some(PkceChallenge::generate());
        self
    }

    /// URL the user opens to sign in.
    ///
    /// `scopes` falls back to the provider defaults. `state` is echoed back on
    /// the redirect and should be checked there.
    ///
    /// # Errors
    ///
    /// Does not currently fail.
    pub fn authorization_url(&self, scopes: Option<&[String]>, state: Option<&str>) -> Result<Url> {
        let client = &self.client;
        let scope = client.scope_string(scopes);

        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", client.client_id.as_str()),
            ("response_type", "code"),
        ];
        params.extend(client.redirect_uri.as_deref().map(|uri| ("redirect_uri", uri)));
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }
        params.extend(state.map(|s| ("state", s)));
        if let Some(pkce) = &self.pkce {
            params.push(("code_challenge", pkce.challenge()));
            params.push(("code_challenge_method", PkceChallenge::METHOD));
        }
        if client.provider.name == "Microsoft" {
            // Code in the query string; always show the account picker.
            params.push(("response_mode", "query"));
            params.push(("prompt", "select_account"));
        }

        let mut url = client.provider.auth_url.clone();
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Redeems the code from the redirect, sending the PKCE verifier if set.
    ///
    /// # Errors
    ///
    /// Returns the provider's `OAuth` error or a transport error.
    pub async fn exchange_code(&self, code: &str, redirect_uri: Option<&str>) -> Result<Token> {
        self.client
            .exchange_code(code, redirect_uri, self.pkce_verifier())
            .await
    }

    /// `None` unless PKCE is attached.
    #[must_use]
    pub fn pkce_verifier(&self) -> Option<&str> {
        self.pkce.as_ref().map(PkceChallenge::verifier)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_authorization_url() {
        let provider = Provider::microsoft().unwrap();
        let client =
            OAuthClient::new("test_client", provider).with_redirect_uri("http://localhost:8400");

        let flow = AuthorizationCodeFlow::new(client);
        let url = flow.authorization_url(None, Some("random_state")).unwrap();

        assert!(url.as_str().contains("client_id=test_client"));
        assert!(url.as_str().contains("response_type=code"));
        assert!(url.as_str().contains("state=random_state"));
        assert!(
            url.as_str()
                .contains("redirect_uri=http%3A%2F%2Flocalhost%3A8400")
        );
        assert!(url.as_str().contains("prompt=select_account"));
    }

    #[test]
    fn test_authorization_url_with_pkce() {
        let provider = Provider::microsoft().unwrap();
        let client = OAuthClient::new("test_client", provider);

        let flow = AuthorizationCodeFlow::new(client).with_pkce();
        let url = flow.authorization_url(None, None).unwrap();

        assert!(url.as_str().contains("code_challenge="));
        assert!(url.as_str().contains("code_challenge_method=S256"));
        assert!(flow.pkce_verifier().is_some());
    }

    #[test]
    fn test_authorization_url_custom_scopes() {
        let provider = Provider::microsoft().unwrap();
        let client = OAuthClient::new("test_client", provider);

        let flow = AuthorizationCodeFlow::new(client);
        let scopes = vec!["User.Read".to_string(), "openid".to_string()];
        let url = flow.authorization_url(Some(&scopes), None).unwrap();

        assert!(url.as_str().contains("scope=User.Read+openid"));
    }

    #[test]
    fn test_other_providers_get_no_microsoft_parameters() {
        let provider = Provider::new(
            "Test",
            "https://auth.example.com/authorize?tenant=x",
            "https://auth.example.com/token",
        )
        .unwrap();
        let flow = AuthorizationCodeFlow::new(OAuthClient::new("id", provider)).with_pkce();
        let url = flow.authorization_url(None, Some("s")).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("tenant".to_string(), "x".to_string()));
        assert!(pairs.iter().all(|(k, _)| k != "prompt" && k != "response_mode"));
        assert!(
            pairs
                .iter()
                .any(|(k, v)| k == "code_challenge" && v == flow.pkce.as_ref().unwrap().challenge())
        );
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "rt"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Provider::new(
            "Test",
            format!("{}/authorize", server.uri()),
            format!("{}/token", server.uri()),
        )
        .unwrap();
        let flow =
            AuthorizationCodeFlow::new(OAuthClient::new("id", provider).with_redirect_uri("http://localhost:1"))
                .with_pkce();

        let token = flow.exchange_code("the-code", None).await.unwrap();
        assert_eq!(token.access_token, "at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
    }
}
