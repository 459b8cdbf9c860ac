//! Loopback redirect capture for interactive sign-in (RFC 8252 section 7.3).
//!
//! Binds an ephemeral port on `127.0.0.1`, waits for the browser to follow
//! the provider's redirect, and answers it with a short HTML page.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

const SUCCESS_PAGE: &str = "<html><body><h3>Sign-in complete.</h3>\
<p>You can close this window and return to the application.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Sign-in failed.</h3>\
<p>Return to the application for details.</p></body></html>";

/// How long a single connection may take to deliver its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Authorization response delivered to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Authorization code to exchange for tokens.
    pub code: String,
}

/// One-shot HTTP listener for the authorization redirect.
#[derive(Debug)]
pub struct LoopbackListener {
    listener: TcpListener,
    redirect_uri: String,
}

impl LoopbackListener {
    /// Binds an ephemeral loopback port.
    ///
    /// `redirect_host` is the host part registered with the provider,
    /// usually `localhost`.
    ///
    /// # Errors
    ///
    /// Returns an error if no port can be bound.
    pub async fn bind(redirect_host: &str) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://{redirect_host}:{port}");
        debug!(%redirect_uri, "loopback listener bound");
        Ok(Self {
            listener,
            redirect_uri,
        })
    }

    /// The redirect URI to send in the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the redirect carrying `expected_state`.
    ///
    /// Each connection is served on its own task, so a browser's idle
    /// preconnect cannot hold up the real redirect. Requests without any
    /// authorization parameters (favicon fetches, prefetches) get a 404, and
    /// connections that fail to read or parse are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if nothing arrives in time,
    /// `Error::StateMismatch` for a foreign `state`, `Error::AccessDenied`
    /// or an `OAuth` error when the provider reports one. A failing
    /// `accept` ends the wait with `Error::Io`.
    pub async fn accept_redirect(self, expected_state: &str, timeout: Duration) -> Result<Redirect> {
        tokio::time::timeout(timeout, self.accept_loop(Arc::from(expected_state)))
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    async fn accept_loop(&self, expected_state: Arc<str>) -> Result<Redirect> {
        // Dropping the set aborts connections still being read.
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "redirect connection");
                    let expected_state = Arc::clone(&expected_state);
                    connections.spawn(async move {
                        let handled = tokio::time::timeout(
                            REQUEST_READ_TIMEOUT,
                            handle_connection(stream, &expected_state),
                        )
                        .await;
                        match handled {
                            Ok(Ok(outcome)) => outcome,
                            Ok(Err(e)) => {
                                debug!(%peer, "dropping redirect connection: {e}");
                                None
                            }
                            Err(_) => {
                                debug!(%peer, "redirect connection sent no request");
                                None
                            }
                        }
                    });
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    match joined {
                        Ok(Some(outcome)) => return outcome,
                        Ok(None) => {}
                        Err(e) => warn!("redirect connection task failed: {e}"),
                    }
                }
            }
        }
    }
}

/// Reads one request. `None` means the request was unrelated.
async fn handle_connection(
    mut stream: TcpStream,
    expected_state: &str,
) -> Result<Option<Result<Redirect>>> {
    let mut request_line = Vec::new();
    {
        let mut reader = BufReader::new(&mut stream);
        reader.read_until(b'\n', &mut request_line).await?;

        // Drain headers; closing with unread input would reset the connection.
        let mut header = Vec::new();
        loop {
            header.clear();
            let read = reader.read_until(b'\n', &mut header).await?;
            if read == 0 || header.trim_ascii().is_empty() {
                break;
            }
        }
    }

    let Some(params) = parse_request_line(&String::from_utf8_lossy(&request_line)) else {
        write_response(&mut stream, "404 Not Found", "").await?;
        return Ok(None);
    };

    let outcome = params.into_outcome(expected_state);
    let (status, page) = if outcome.is_ok() {
        ("200 OK", SUCCESS_PAGE)
    } else {
        ("400 Bad Request", FAILURE_PAGE)
    };
    if let Err(e) = write_response(&mut stream, status, page).await {
        // The browser may already be gone; the redirect itself still counts.
        debug!("failed to answer redirect: {e}");
    }

    if let Err(e) = &outcome {
        warn!("authorization redirect rejected: {e}");
    }
    Ok(Some(outcome))
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Query parameters the provider may send to the redirect URI.
#[derive(Debug, Default, PartialEq, Eq)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl RedirectParams {
    fn into_outcome(self, expected_state: &str) -> Result<Redirect> {
        if self.state.as_deref() != Some(expected_state) {
            return Err(Error::StateMismatch);
        }

        if let Some(error) = self.error {
            if error == "access_denied" {
                return Err(Error::AccessDenied);
            }
            return Err(Error::oauth_error(
                error,
                self.error_description.unwrap_or_default(),
            ));
        }

        self.code
            .filter(|c| !c.is_empty())
            .map(|code| Redirect { code })
            .ok_or_else(|| Error::InvalidResponse("redirect without code".into()))
    }
}

/// Parses `GET /path?query HTTP/1.1`; `None` when there is nothing to act on.
fn parse_request_line(line: &str) -> Option<RedirectParams> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" {
        return None;
    }

    let url = Url::parse(&format!("http://localhost{target}")).ok()?;
    let mut params = RedirectParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if params.code.is_none() && params.error.is_none() {
        return None;
    }
    Some(params)
}
