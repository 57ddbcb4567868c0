//! Delegated login through an external identity provider
//!
//! The client generates a session key, opens a loopback listener and hands
//! the user an authorize URL. The provider signs a delegation for the session
//! key and redirects the browser to
//! `http://127.0.0.1:<port>/callback?user_key=..&expiration=..&signature=..`.
//! The first request on that path completes (or fails) the login.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use super::{AuthMode, IdentityProvider, SessionError};
use crate::identity::{Delegation, Identity};
use crate::rpc::envelope::now_nanos;

const CALLBACK_PATH: &str = "/callback";

/// Largest request head accepted on the callback listener
const MAX_REQUEST_HEAD: usize = 16 * 1024;

/// How long a connection may take to send its request head
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Shows the authorize URL to the user
pub type Presenter = Box<dyn Fn(&str) + Send + Sync>;

/// Query parameters carried by the provider's redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub user_key: Vec<u8>,
    pub expiration: u64,
    pub signature: Vec<u8>,
}

pub struct DelegatedProvider {
    identity_provider_url: String,
    callback_port: u16,
    login_timeout: Duration,
    max_time_to_live: Duration,
    presenter: Presenter,
}

impl DelegatedProvider {
    pub fn new(
        identity_provider_url: impl Into<String>,
        callback_port: u16,
        login_timeout: Duration,
        max_time_to_live: Duration,
        presenter: Presenter,
    ) -> Self {
        Self {
            identity_provider_url: identity_provider_url.into(),
            callback_port,
            login_timeout,
            max_time_to_live,
            presenter,
        }
    }

    /// URL the user opens to approve the session key
    pub fn authorize_url(
        &self,
        session_key_der: &[u8],
        callback: &str,
    ) -> Result<Url, SessionError> {
        let mut url = Url::parse(&self.identity_provider_url)
            .map_err(|e| SessionError::ProviderFailed(format!("invalid provider URL: {}", e)))?;
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("session_key", &hex::encode(session_key_der))
            .append_pair("callback", callback)
            .append_pair(
                "max_time_to_live",
                &self.max_time_to_live.as_nanos().to_string(),
            )
            .finish();
        url.set_fragment(Some(&format!("authorize?{}", query)));
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for DelegatedProvider {
    fn mode(&self) -> AuthMode {
        AuthMode::Delegated
    }

    async fn authenticate(&self) -> Result<Identity, SessionError> {
        let session_key = Identity::generate();
        let listener = TcpListener::bind(("127.0.0.1", self.callback_port)).await?;
        let callback = format!(
            "http://127.0.0.1:{}{}",
            listener.local_addr()?.port(),
            CALLBACK_PATH
        );

        let url = self.authorize_url(&session_key.public_key_der(), &callback)?;
        info!("Waiting for login callback on {}", callback);
        (self.presenter)(url.as_str());

        let params = timeout(self.login_timeout, accept_callback(&listener))
            .await
            .map_err(|_| SessionError::LoginTimedOut(self.login_timeout))??;

        let delegation = Delegation {
            pubkey: session_key.public_key_der(),
            expiration: params.expiration,
            user_key: params.user_key,
            signature: params.signature,
        };
        delegation.verify(now_nanos())?;

        let identity = Identity::delegated(&session_key.secret_bytes(), delegation)?;
        info!("Logged in as {}", identity.principal());
        Ok(identity)
    }
}

/// Serve the listener until a request arrives on the callback path.
///
/// Each connection is read on its own task, so an idle connection (a
/// browser preconnect, say) cannot hold up the provider's redirect.
async fn accept_callback(listener: &TcpListener) -> Result<CallbackParams, SessionError> {
    let (results, mut received) = mpsc::channel(1);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!("Login callback connection from {}", peer);
                tokio::spawn(serve_connection(stream, results.clone()));
            }
            Some(result) = received.recv() => return result,
        }
    }
}

/// Answer one connection, forwarding the outcome of a callback request
async fn serve_connection(
    mut stream: TcpStream,
    results: mpsc::Sender<Result<CallbackParams, SessionError>>,
) {
    let target = match timeout(REQUEST_READ_TIMEOUT, read_request_target(&mut stream)).await {
        Ok(Ok(target)) => target,
        Ok(Err(e)) => {
            warn!("Discarding malformed callback request: {}", e);
            respond(&mut stream, "400 Bad Request", "Malformed request").await;
            return;
        }
        Err(_) => {
            debug!("Closing idle callback connection");
            return;
        }
    };

    let url = match Url::parse("http://127.0.0.1").and_then(|base| base.join(&target)) {
        Ok(url) => url,
        Err(e) => {
            warn!("Discarding callback request with bad target: {}", e);
            respond(&mut stream, "400 Bad Request", "Malformed request").await;
            return;
        }
    };
    if url.path() != CALLBACK_PATH {
        respond(&mut stream, "404 Not Found", "Not found").await;
        return;
    }

    let result = parse_callback(&url);
    match &result {
        Ok(_) => {
            respond(
                &mut stream,
                "200 OK",
                "Login complete. You can close this window.",
            )
            .await
        }
        Err(e) => respond(&mut stream, "400 Bad Request", &e.to_string()).await,
    }
    // Only the first callback counts; later ones find the slot taken.
    let _ = results.try_send(result);
}

/// Extract the delegation fields from the callback URL
pub fn parse_callback(url: &Url) -> Result<CallbackParams, SessionError> {
    let mut user_key = None;
    let mut expiration = None;
    let mut signature = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return Err(SessionError::ProviderFailed(value.into_owned())),
            "user_key" => user_key = Some(decode_hex("user_key", &value)?),
            "signature" => signature = Some(decode_hex("signature", &value)?),
            "expiration" => {
                expiration = Some(value.parse::<u64>().map_err(|_| {
                    SessionError::CallbackInvalid(format!("expiration '{}' is not a number", value))
                })?)
            }
            _ => {}
        }
    }

    Ok(CallbackParams {
        user_key: user_key.ok_or_else(|| missing("user_key"))?,
        expiration: expiration.ok_or_else(|| missing("expiration"))?,
        signature: signature.ok_or_else(|| missing("signature"))?,
    })
}

fn decode_hex(name: &str, value: &str) -> Result<Vec<u8>, SessionError> {
    hex::decode(value).map_err(|_| SessionError::CallbackInvalid(format!("{} is not hex", name)))
}

fn missing(name: &str) -> SessionError {
    SessionError::CallbackInvalid(format!("missing {}", name))
}

/// Read the request head and return the target of a GET request line
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.len() > MAX_REQUEST_HEAD {
            return Err(invalid("request head too large"));
        }
    }

    let head = String::from_utf8_lossy(&head);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(invalid("expected a GET request")),
    }
}

fn invalid(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.to_string())
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("Failed to answer login callback: {}", e);
    }
    let _ = stream.shutdown().await;
}
