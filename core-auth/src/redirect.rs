//! Loopback redirect listener for the installed-app OAuth flow.
//!
//! Binds an ephemeral port on 127.0.0.1, hands its address out as the
//! OAuth redirect URI, and captures the single browser redirect carrying
//! the authorization code. The browser gets a small confirmation page and
//! can be closed.

use crate::error::{AuthError, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

const SUCCESS_PAGE: &str = "<html><body><h2>Authorization complete.</h2>\
<p>You may close this tab and return to the terminal.</p></body></html>";

const DENIED_PAGE: &str = "<html><body><h2>Authorization was not granted.</h2>\
<p>You may close this tab.</p></body></html>";

/// Query parameters captured from the OAuth redirect.
#[derive(Debug, Clone)]
pub struct AuthCallback {
    pub code: String,
    pub state: String,
}

/// One-shot localhost listener for the OAuth browser redirect.
pub struct RedirectListener {
    listener: TcpListener,
    port: u16,
}

impl RedirectListener {
    /// Bind to an ephemeral port on the loopback interface.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| AuthError::RedirectListener(format!("Failed to bind loopback: {}", e)))?;

        let port = listener
            .local_addr()
            .map_err(|e| AuthError::RedirectListener(e.to_string()))?
            .port();

        debug!(port = port, "Loopback redirect listener bound");

        Ok(Self { listener, port })
    }

    /// The redirect URI to register with the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Wait for the browser redirect and extract the authorization code.
    ///
    /// Stray requests (favicon probes, wrong paths) are answered with 404
    /// and the listener keeps waiting. The caller is expected to wrap this
    /// in a timeout.
    pub async fn accept(self) -> Result<AuthCallback> {
        loop {
            let (mut stream, peer) = self.listener.accept().await.map_err(|e| {
                AuthError::RedirectListener(format!("Failed to accept connection: {}", e))
            })?;

            debug!(peer = %peer, "Redirect listener accepted connection");

            let request_line = match read_request_line(&mut stream).await {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to read redirect request, waiting for next");
                    continue;
                }
            };

            let Some(path) = parse_request_path(&request_line) else {
                respond(&mut stream, 400, "<html><body>Bad request.</body></html>").await;
                continue;
            };

            // Browsers probe for favicons alongside the redirect
            if path.starts_with("/favicon") {
                respond(&mut stream, 404, "").await;
                continue;
            }

            let url = match Url::parse(&format!("http://127.0.0.1{}", path)) {
                Ok(url) => url,
                Err(_) => {
                    respond(&mut stream, 400, "<html><body>Bad request.</body></html>").await;
                    continue;
                }
            };

            let mut code = None;
            let mut state = None;
            let mut error = None;

            for (key, value) in url.query_pairs() {
                match key.as_ref() {
                    "code" => code = Some(value.into_owned()),
                    "state" => state = Some(value.into_owned()),
                    "error" => error = Some(value.into_owned()),
                    _ => {}
                }
            }

            if let Some(error) = error {
                respond(&mut stream, 200, DENIED_PAGE).await;
                return Err(AuthError::ConsentDenied(error));
            }

            match (code, state) {
                (Some(code), Some(state)) => {
                    respond(&mut stream, 200, SUCCESS_PAGE).await;
                    info!("Authorization redirect received");
                    return Ok(AuthCallback { code, state });
                }
                _ => {
                    respond(&mut stream, 404, "").await;
                    continue;
                }
            }
        }
    }
}

/// Read up to the end of the HTTP request line.
async fn read_request_line(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if buf.windows(2).any(|w| w == b"\r\n") || buf.len() > 8192 {
            break;
        }
    }

    let line = buf
        .split(|&b| b == b'\r' || b == b'\n')
        .next()
        .unwrap_or_default();

    Ok(String::from_utf8_lossy(line).into_owned())
}

/// Extract the path from an HTTP request line like `GET /?code=x HTTP/1.1`.
fn parse_request_path(request_line: &str) -> Option<&str> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;

    if method != "GET" {
        return None;
    }

    Some(path)
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "OK",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );

    // The browser closing early is not a failure worth surfacing
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "Failed to write redirect response");
    }
    let _ = stream.shutdown().await;
}
