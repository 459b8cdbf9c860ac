//! Integration tests for the action handlers.
//!
//! Graph and the identity provider are played by `wiremock` servers; the
//! identity library is either a scripted fake or a real `PublicClientApp`
//! whose browser step follows the loopback redirect directly.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use graphlink_core::actions::{self, ActionOutcome};
use graphlink_core::{AppContext, Config, IdentityClient};
use graphlink_oauth::{
    Account, AuthenticationResult, Provider, PublicClientApp, SilentAcquisition, Token,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, header_exists, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Identity client with one signed-in account and a fixed token.
struct SignedIn {
    token: Option<&'static str>,
    interactive_calls: AtomicUsize,
    removed: Mutex<Vec<Account>>,
}

impl SignedIn {
    fn with_token(token: &'static str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(token),
            interactive_calls: AtomicUsize::new(0),
            removed: Mutex::new(Vec::new()),
        })
    }

    fn signed_out() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            interactive_calls: AtomicUsize::new(0),
            removed: Mutex::new(Vec::new()),
        })
    }

    fn result(&self) -> Option<AuthenticationResult> {
        self.token.map(|t| AuthenticationResult {
            token: Token::new(t, "Bearer"),
            account: account(),
        })
    }
}

fn account() -> Account {
    Account {
        home_account_id: "o-1.t-1".into(),
        username: "ana@contoso.com".into(),
        tenant_id: Some("t-1".into()),
    }
}

#[async_trait]
impl IdentityClient for SignedIn {
    async fn accounts(&self) -> Vec<Account> {
        vec![account()]
    }

    async fn acquire_token_silent(
        &self,
        _scopes: &[String],
        _account: Option<&Account>,
    ) -> SilentAcquisition {
        self.result().map_or_else(
            || SilentAcquisition::InteractionRequired("signed out".into()),
            SilentAcquisition::Silent,
        )
    }

    async fn acquire_token_interactive(
        &self,
        _scopes: &[String],
    ) -> graphlink_oauth::Result<AuthenticationResult> {
        self.interactive_calls.fetch_add(1, Ordering::SeqCst);
        self.result().ok_or(graphlink_oauth::Error::AccessDenied)
    }

    async fn remove_account(&self, account: &Account) -> bool {
        self.removed.lock().unwrap().push(account.clone());
        true
    }
}

fn config(graph: &MockServer) -> Config {
    Config {
        client_id: "test-client".into(),
        graph_base_url: graph.uri(),
        ..Config::default()
    }
}

fn context(graph: &MockServer, identity: Arc<SignedIn>) -> AppContext {
    AppContext::with_identity(identity, &config(graph)).unwrap()
}

#[tokio::test]
async fn test_send_mail_payload_shape() {
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/sendMail"))
        .and(header("authorization", "Bearer graph-token"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "message": {
                "subject": "Test",
                "body": { "contentType": "Text", "content": "Hello" },
                "toRecipients": [{ "emailAddress": { "address": "a@b.com" } }]
            }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&graph)
        .await;

    let ctx = context(&graph, SignedIn::with_token("graph-token"));
    let outcome = actions::send_mail(Some(&ctx), "Test", "Hello", "a@b.com").await;

    assert_eq!(outcome, ActionOutcome::Success("Email sent successfully.".into()));
}

#[tokio::test]
async fn test_empty_recipient_is_rejected_by_api() {
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/sendMail"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "ErrorInvalidRecipients",
                "message": "At least one recipient is not valid., Recipient '' is not resolved."
            }
        })))
        .expect(1)
        .mount(&graph)
        .await;

    let ctx = context(&graph, SignedIn::with_token("graph-token"));
    let outcome = actions::send_mail(Some(&ctx), "Test", "Hello", "").await;

    assert!(!outcome.is_success());
    assert!(outcome.message().contains("Error"));
}

#[tokio::test]
async fn test_upload_path_ends_with_content_segment() {
    let graph = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"/report\.pdf:/content$"))
        .and(header("content-type", "application/octet-stream"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "01ABC",
            "name": "report.pdf",
            "size": 8
        })))
        .expect(1)
        .mount(&graph)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.pdf");
    tokio::fs::write(&file, b"%PDF-1.7").await.unwrap();

    let ctx = context(&graph, SignedIn::with_token("graph-token"));
    let outcome = actions::upload_file(Some(&ctx), &file).await;

    assert_eq!(outcome.message(), "File uploaded to OneDrive: report.pdf");

    let requests = graph.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.path().ends_with("/report.pdf:/content"));
    assert_eq!(requests[0].body, b"%PDF-1.7");
}

#[tokio::test]
async fn test_signed_out_request_never_reaches_graph() {
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&graph)
        .await;

    let identity = SignedIn::signed_out();
    let ctx = context(&graph, Arc::clone(&identity));
    let outcome = actions::send_mail(Some(&ctx), "Test", "Hello", "a@b.com").await;

    assert!(matches!(outcome, ActionOutcome::AuthError(_)));
    assert!(outcome.message().starts_with("Error sending email: "));
    assert_eq!(identity.interactive_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sign_in_clears_cached_accounts() {
    let graph = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "o-1",
            "displayName": "Ana Diaz",
            "userPrincipalName": "ana@contoso.com"
        })))
        .expect(1)
        .mount(&graph)
        .await;

    let identity = SignedIn::with_token("graph-token");
    let ctx = context(&graph, Arc::clone(&identity));
    let outcome = actions::sign_in(Some(&ctx)).await;

    assert_eq!(outcome.message(), "Signed in as Ana Diaz.");
    assert_eq!(*identity.removed.lock().unwrap(), vec![account()]);
}

fn id_token() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
        URL_SAFE_NO_PAD.encode(
            r#"{"oid":"o-1","tid":"t-1","preferred_username":"ana@contoso.com","name":"Ana Diaz"}"#
        )
    )
}

/// Follows the authorization redirect the way a browser would after the
/// user signs in.
fn redirecting_browser(opened: Arc<AtomicUsize>) -> impl Fn(&Url) -> graphlink_oauth::Result<()> {
    move |url: &Url| {
        opened.fetch_add(1, Ordering::SeqCst);
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        let target = format!(
            "{}/?code=the-code&state={}",
            query["redirect_uri"], query["state"]
        );
        tokio::spawn(async move {
            reqwest::get(target).await.expect("redirect");
        });
        Ok(())
    }
}

#[tokio::test]
async fn test_public_client_signs_in_once_then_stays_silent() {
    let idp = MockServer::start().await;
    let graph = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "graph-token",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "User.Read Mail.Send Files.ReadWrite",
            "refresh_token": "refresh",
            "id_token": id_token()
        })))
        .expect(1)
        .mount(&idp)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "o-1",
            "displayName": "Ana Diaz"
        })))
        .expect(1)
        .mount(&graph)
        .await;
    Mock::given(method("POST"))
        .and(path("/me/sendMail"))
        .and(header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&graph)
        .await;

    let opened = Arc::new(AtomicUsize::new(0));
    let provider = Provider::new(
        "Test",
        format!("{}/authorize", idp.uri()),
        format!("{}/token", idp.uri()),
    )
    .unwrap();
    let app = PublicClientApp::builder("test-client", provider)
        .with_redirect_host("127.0.0.1")
        .with_browser_launcher(redirecting_browser(Arc::clone(&opened)))
        .build()
        .unwrap();
    let ctx = AppContext::with_identity(Arc::new(app), &config(&graph)).unwrap();

    let signed_in = actions::sign_in(Some(&ctx)).await;
    assert_eq!(signed_in.message(), "Signed in as Ana Diaz.");

    let sent = actions::send_mail(Some(&ctx), "Test", "Hello", "a@b.com").await;
    assert!(sent.is_success(), "{sent}");

    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.identity().accounts().await.len(), 1);
}
