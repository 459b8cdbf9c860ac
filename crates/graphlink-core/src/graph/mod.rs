//! Authenticated Microsoft Graph client.
//!
//! Every request passes through [`RequestAuthenticator`] before it is sent;
//! if no token can be attached the request is dropped and the error returned.

mod model;

pub use model::{DriveItem, OutgoingMail, User};

use crate::auth::RequestAuthenticator;
use crate::error::{Error, Result};
use model::{ErrorEnvelope, SendMailRequest};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Request, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Graph v1.0 endpoint.
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Client for the handful of Graph calls the app makes.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: Url,
    authenticator: RequestAuthenticator,
}

impl GraphClient {
    /// Creates a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        authenticator: RequestAuthenticator,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid Graph base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Graph base URL {base_url} cannot be a base")));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url,
            authenticator,
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("Graph base URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Authenticates and sends `request`, mapping non-success statuses to
    /// [`Error::Api`].
    async fn send(&self, mut request: Request) -> Result<Response> {
        self.authenticator.authenticate_request(&mut request).await?;

        let method = request.method().clone();
        let url = request.url().clone();
        let response = self.http.execute(request).await?;
        let status = response.status();
        debug!(%method, %url, %status, "graph response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => (
                status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            ),
        };
        error!(%method, %url, %status, %code, "graph request failed: {message}");

        Err(Error::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetches the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication or the request fails.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<User> {
        let request = self.http.get(self.endpoint(&["me"])?).build()?;
        self.send_json(request).await
    }

    /// Sends `mail` from the signed-in user's mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or Graph rejects the message
    /// (for example an empty or malformed recipient).
    #[instrument(skip(self, mail), fields(to = %mail.to))]
    pub async fn send_mail(&self, mail: &OutgoingMail) -> Result<()> {
        let request = self
            .http
            .post(self.endpoint(&["me", "sendMail"])?)
            .json(&SendMailRequest::from(mail))
            .build()?;
        self.send(request).await?;
        info!("mail accepted for delivery");
        Ok(())
    }

    /// Uploads `content` to the root of the user's OneDrive as `name`,
    /// replacing any existing file. Simple upload, suited to small files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty name, otherwise an error
    /// if authentication or the upload fails.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn upload_file(&self, name: &str, content: Vec<u8>) -> Result<DriveItem> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("file name is empty".into()));
        }

        let item_path = format!("{name}:");
        let request = self
            .http
            .put(self.endpoint(&["me", "drive", "root:", &item_path, "content"])?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .build()?;

        let item: DriveItem = self.send_json(request).await?;
        info!(id = %item.id, "file uploaded");
        Ok(item)
    }

    /// Reads the file at `path` and uploads it under its file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no usable file name, the file cannot
    /// be read, or the upload fails.
    pub async fn upload_path(&self, path: &Path) -> Result<DriveItem> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", path.display())))?;
        let content = tokio::fs::read(path).await?;
        self.upload_file(name, content).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::{RequestAuthenticator, TokenProvider};
    use async_trait::async_trait;
    use graphlink_oauth::Token;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken(Option<&'static str>);

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn acquire(&self) -> Result<Token> {
            self.0
                .map(|t| Token::new(t, "Bearer"))
                .ok_or(Error::Auth(graphlink_oauth::Error::AccessDenied))
        }
    }

    fn client(base: &str, token: Option<&'static str>) -> GraphClient {
        let authenticator = RequestAuthenticator::new(Arc::new(StaticToken(token)));
        GraphClient::new(base, Duration::from_secs(5), authenticator).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let graph = client(GRAPH_BASE_URL, Some("t"));
        let url = graph
            .endpoint(&["me", "drive", "root:", "report.pdf:", "content"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/me/drive/root:/report.pdf:/content"
        );

        let graph = client("https://graph.microsoft.com/v1.0/", Some("t"));
        assert_eq!(
            graph.endpoint(&["me"]).unwrap().as_str(),
            "https://graph.microsoft.com/v1.0/me"
        );
    }

    #[test]
    fn test_endpoint_encodes_names() {
        let graph = client(GRAPH_BASE_URL, Some("t"));
        let url = graph
            .endpoint(&["me", "drive", "root:", "Q3 plan#2.pdf:", "content"])
            .unwrap();
        assert!(url.as_str().ends_with("/root:/Q3%20plan%232.pdf:/content"));
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        let authenticator = RequestAuthenticator::new(Arc::new(StaticToken(Some("t"))));
        let err = GraphClient::new("not a url", Duration::from_secs(1), authenticator).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_me_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "1",
                "displayName": "Ana Diaz",
                "userPrincipalName": "ana@contoso.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client(&server.uri(), Some("secret")).me().await.unwrap();
        assert_eq!(user.label(), "Ana Diaz");
    }

    #[tokio::test]
    async fn test_send_mail_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/sendMail"))
            .and(body_json(json!({
                "message": {
                    "subject": "Test",
                    "body": { "contentType": "Text", "content": "Hello" },
                    "toRecipients": [{ "emailAddress": { "address": "a@b.com" } }]
                }
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri(), Some("secret"))
            .send_mail(&OutgoingMail::new("Test", "Hello", "a@b.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_graph_error_envelope_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/sendMail"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "ErrorInvalidRecipients",
                    "message": "At least one recipient is not valid."
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri(), Some("secret"))
            .send_mail(&OutgoingMail::new("Test", "Hello", ""))
            .await
            .unwrap_err();

        match err {
            Error::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "ErrorInvalidRecipients");
                assert_eq!(message, "At least one recipient is not valid.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let err = client(&server.uri(), Some("secret")).me().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Api { status: 503, ref message, .. } if message == "try later"
        ));
    }

    #[tokio::test]
    async fn test_upload_puts_octet_stream() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/drive/root:/report.pdf:/content"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "item-1",
                "name": "report.pdf",
                "size": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let item = client(&server.uri(), Some("secret"))
            .upload_file("report.pdf", b"pdf".to_vec())
            .await
            .unwrap();
        assert_eq!(item.name, "report.pdf");
        assert_eq!(item.size, Some(3));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].body, b"pdf");
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_name() {
        let err = client(GRAPH_BASE_URL, Some("secret"))
            .upload_file("  ", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unauthenticated_request_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server.uri(), None).me().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
