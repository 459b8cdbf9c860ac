//! Attaches bearer tokens to outgoing requests.

use super::provider::TokenProvider;
use crate::error::{Error, Result};
use graphlink_oauth::Token;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds the `Authorization` header value for `token`.
///
/// # Errors
///
/// Returns [`Error::MissingToken`] if the token is blank, expired, or not a
/// valid header value.
pub fn bearer_header(token: &Token) -> Result<HeaderValue> {
    let access = token.access_token.trim();
    if access.is_empty() {
        return Err(Error::MissingToken("access token is empty".into()));
    }
    if token.is_expired() {
        return Err(Error::MissingToken("access token is expired".into()));
    }

    let mut value = HeaderValue::from_str(&format!("Bearer {access}"))
        .map_err(|_| Error::MissingToken("access token is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Decorates requests with a bearer token before they are sent.
///
/// A request is never sent without a token: any acquisition failure aborts
/// the request.
#[derive(Clone)]
pub struct RequestAuthenticator {
    provider: Arc<dyn TokenProvider>,
}

impl RequestAuthenticator {
    /// Creates an authenticator backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }

    /// Acquires a token and sets the `Authorization` header on `request`.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error, or [`Error::MissingToken`] if the
    /// token cannot be used. The request is left untouched in both cases.
    pub async fn authenticate_request(&self, request: &mut reqwest::Request) -> Result<()> {
        let token = self.provider.acquire().await.inspect_err(|e| {
            warn!(url = %request.url(), "token acquisition failed: {e}");
        })?;
        let header = bearer_header(&token)?;

        request.headers_mut().insert(AUTHORIZATION, header);
        debug!(method = %request.method(), url = %request.url(), "request authenticated");
        Ok(())
    }
}

impl std::fmt::Debug for RequestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthenticator").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedProvider {
        token: Option<Token>,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn ok(token: Token) -> Arc<Self> {
            Arc::new(Self {
                token: Some(token),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                token: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenProvider for FixedProvider {
        async fn acquire(&self) -> Result<Token> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.token
                .clone()
                .ok_or(Error::Auth(graphlink_oauth::Error::AccessDenied))
        }
    }

    fn request(url: &str) -> reqwest::Request {
        reqwest::Client::new().get(url).build().unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_sets_bearer_header() {
        let provider = FixedProvider::ok(Token::new("abc.def", "Bearer"));
        let authenticator = RequestAuthenticator::new(provider.clone());
        let mut req = request("https://graph.microsoft.com/v1.0/me");

        authenticator.authenticate_request(&mut req).await.unwrap();

        let header = req.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer abc.def");
        assert!(header.is_sensitive());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquisition_failure_leaves_request_untouched() {
        let authenticator = RequestAuthenticator::new(FixedProvider::failing());
        let mut req = request("https://graph.microsoft.com/v1.0/me");

        let err = authenticator.authenticate_request(&mut req).await.unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_failed_authentication_never_reaches_server() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let authenticator = RequestAuthenticator::new(FixedProvider::failing());
        let client = reqwest::Client::new();
        let mut req = client.get(format!("{}/me", server.uri())).build().unwrap();

        if authenticator.authenticate_request(&mut req).await.is_ok() {
            client.execute(req).await.unwrap();
        }
        // `expect(0)` is verified when the server drops.
    }

    #[test]
    fn test_bearer_header_rejects_unusable_tokens() {
        assert!(matches!(
            bearer_header(&Token::new("   ", "Bearer")),
            Err(Error::MissingToken(_))
        ));

        let expired =
            Token::new("abc", "Bearer").with_expires_at(Utc::now() - Duration::minutes(5));
        assert!(matches!(bearer_header(&expired), Err(Error::MissingToken(_))));

        assert!(matches!(
            bearer_header(&Token::new("abc\ndef", "Bearer")),
            Err(Error::MissingToken(_))
        ));
    }

    #[test]
    fn test_bearer_header_trims_whitespace() {
        let header = bearer_header(&Token::new("  abc  ", "Bearer")).unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer abc");
    }

    proptest! {
        #[test]
        fn prop_bearer_header_wraps_token(token in "[A-Za-z0-9._~+/=-]{1,200}") {
            let valid = Token::new(token.clone(), "Bearer")
                .with_expires_at(Utc::now() + Duration::hours(1));
            let header = bearer_header(&valid).unwrap();
            prop_assert_eq!(header.to_str().unwrap(), format!("Bearer {token}"));
        }
    }
}
