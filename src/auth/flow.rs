//! OAuth2 authorization code flow with PKCE
//!
//! This module drives the browser-based authorization code flow with PKCE
//! (RFC 7636) and dynamic client registration (RFC 7591) against a remote
//! service, and manages the persisted token lifecycle around it.
//!
//! # Flow overview
//!
//! 1. Discover OAuth endpoints, falling back to conventional paths.
//! 2. Register a client (or reuse the cached registration).
//! 3. Generate a PKCE challenge and a random `state` nonce.
//! 4. Bind a loopback TCP listener for the redirect callback.
//! 5. Print the authorization URL and attempt to open it in a browser.
//! 6. Await exactly one redirect callback, racing a fixed timeout; validate
//!    `state` and reject callbacks carrying an `error` parameter.
//! 7. Exchange the authorization code (with the verifier) for tokens and
//!    persist them.
//!
//! The listener is a scoped resource: it exists for the duration of one
//! authorization attempt and is released on every exit path (callback,
//! timeout, or transport error).
//!
//! # References
//!
//! - RFC 7636 PKCE <https://www.rfc-editor.org/rfc/rfc7636>
//! - RFC 7591 Dynamic Registration <https://www.rfc-editor.org/rfc/rfc7591>

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::auth::discovery::{discover_endpoints, OAuthEndpoints};
use crate::auth::pkce::{self, PkceChallenge};
use crate::auth::tokens::{ClientRegistration, TokenResponse, TokenSet};
use crate::error::{McplinkError, Result};
use crate::store::CredentialStore;

/// How long the loopback listener waits for the redirect callback before the
/// flow fails with [`McplinkError::CallbackTimeout`].
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Default loopback port for the redirect callback. Fixed rather than
/// OS-assigned because the redirect URI is baked into the cached client
/// registration and must match across runs.
pub const DEFAULT_CALLBACK_PORT: u16 = 8976;

// ---------------------------------------------------------------------------
// AuthorizerConfig
// ---------------------------------------------------------------------------

/// Configuration for one deployment's authorization flow.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use mcplink::auth::flow::{AuthorizerConfig, DEFAULT_CALLBACK_PORT, DEFAULT_CALLBACK_TIMEOUT};
///
/// let config = AuthorizerConfig {
///     deployment: "default".to_string(),
///     base_url: Url::parse("https://mcp.example.com").unwrap(),
///     client_name: "Local MCP Client".to_string(),
///     callback_port: DEFAULT_CALLBACK_PORT,
///     callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
/// };
/// assert_eq!(config.callback_port, 8976);
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    /// Deployment name; used as the prefix for the store keys so credentials
    /// are cached per service endpoint.
    pub deployment: String,

    /// Base URL of the remote service.
    pub base_url: Url,

    /// Human-readable name sent during dynamic client registration.
    pub client_name: String,

    /// Loopback TCP port for the redirect callback.
    pub callback_port: u16,

    /// Deadline for the redirect callback to arrive.
    pub callback_timeout: Duration,
}

// ---------------------------------------------------------------------------
// PkceAuthorizer
// ---------------------------------------------------------------------------

/// Produces valid access tokens for one deployment, performing the minimum
/// work necessary: cached tokens are reused while usable, refreshed inside
/// the safety margin, and replaced via the full interactive flow only when
/// nothing else works.
///
/// Credentials live in an explicitly injected [`CredentialStore`], never a
/// global, so tests can substitute an in-memory store.
pub struct PkceAuthorizer {
    http: Arc<reqwest::Client>,
    store: Arc<dyn CredentialStore>,
    config: AuthorizerConfig,
}

impl PkceAuthorizer {
    /// Creates an authorizer for the given deployment.
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client for all authorization requests.
    /// * `store` - Durable storage for the registration and token records.
    /// * `config` - Deployment-specific flow configuration.
    pub fn new(
        http: Arc<reqwest::Client>,
        store: Arc<dyn CredentialStore>,
        config: AuthorizerConfig,
    ) -> Self {
        Self {
            http,
            store,
            config,
        }
    }

    /// Returns a usable token set, refreshing when inside the safety margin.
    ///
    /// - No stored tokens: returns `Ok(None)`; the caller must run
    ///   [`authorize`](Self::authorize).
    /// - Stored and usable beyond the margin: returned verbatim.
    /// - Stored but inside the margin (or past expiry): a refresh is
    ///   attempted. On success the new token set is returned; on failure the
    ///   stored record has been cleared and the error propagates, so the
    ///   next attempt re-authorizes from scratch instead of looping on a
    ///   dead refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`McplinkError::TokenRefresh`] when the refresh attempt fails.
    pub async fn access_token(&self) -> Result<Option<TokenSet>> {
        let Some(tokens) = self.stored_tokens() else {
            return Ok(None);
        };

        if tokens.is_usable() {
            return Ok(Some(tokens));
        }

        tracing::info!(
            deployment = %self.config.deployment,
            "access token inside refresh margin, refreshing"
        );
        let refreshed = self.refresh(tokens).await?;
        Ok(Some(refreshed))
    }

    /// Runs the full interactive authorization flow and persists the
    /// resulting token set.
    ///
    /// # Errors
    ///
    /// Returns [`McplinkError::Registration`] when dynamic client
    /// registration is rejected, [`McplinkError::CallbackError`] when the
    /// redirect carries an `error` parameter, [`McplinkError::StateMismatch`]
    /// when the returned `state` does not match this flow's nonce,
    /// [`McplinkError::CallbackTimeout`] when no callback arrives in time,
    /// and [`McplinkError::TokenExchange`] when the code exchange fails.
    pub async fn authorize(&self) -> Result<TokenSet> {
        tracing::info!(base_url = %self.config.base_url, "starting interactive authorization");

        let endpoints = discover_endpoints(&self.http, &self.config.base_url).await;
        let registration = self.register_client(&endpoints).await?;
        let challenge = pkce::generate()?;

        self.run_authorization(&endpoints, &registration, challenge)
            .await
    }

    /// Exchanges the stored refresh token for a new token set.
    ///
    /// Any failure to complete the refresh (no refresh token stored, no
    /// cached registration, or a rejection from the token endpoint) clears
    /// the persisted token set before the error propagates.
    pub async fn refresh(&self, current: TokenSet) -> Result<TokenSet> {
        let endpoints = discover_endpoints(&self.http, &self.config.base_url).await;

        let Some(refresh_token) = current.refresh_token.clone() else {
            self.store.delete(&self.token_key())?;
            return Err(McplinkError::TokenRefresh("no refresh token stored".to_string()).into());
        };

        let Some(registration) = self.stored_registration() else {
            self.store.delete(&self.token_key())?;
            return Err(
                McplinkError::TokenRefresh("no client registration cached".to_string()).into(),
            );
        };

        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", &refresh_token);
        params.insert("client_id", &registration.client_id);

        let resp = self
            .http
            .post(&endpoints.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| McplinkError::TokenRefresh(format!("refresh request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            self.store.delete(&self.token_key())?;
            return Err(McplinkError::TokenRefresh(format!(
                "token endpoint returned {status}: {body}"
            ))
            .into());
        }

        let raw: TokenResponse = resp.json().await.map_err(|e| {
            McplinkError::TokenRefresh(format!("failed to parse refresh response: {e}"))
        })?;

        let tokens = raw.into_token_set(Some(refresh_token));
        self.persist_tokens(&tokens)?;
        Ok(tokens)
    }

    /// Returns the cached client registration, or registers a new client.
    ///
    /// A cached registration is returned as-is; registration is never
    /// re-issued unless the cache is empty (or unreadable, which reads as
    /// empty).
    pub async fn register_client(&self, endpoints: &OAuthEndpoints) -> Result<ClientRegistration> {
        if let Some(cached) = self.stored_registration() {
            tracing::debug!(client_id = %cached.client_id, "reusing cached client registration");
            return Ok(cached);
        }

        let body = serde_json::json!({
            "client_name": self.config.client_name,
            "redirect_uris": [self.redirect_uri()],
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "token_endpoint_auth_method": "none",
        });

        let resp = self
            .http
            .post(&endpoints.registration_endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| McplinkError::Registration(format!("registration request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(McplinkError::Registration(format!(
                "registration endpoint returned {status}: {text}"
            ))
            .into());
        }

        let registration: ClientRegistration = resp.json().await.map_err(|e| {
            McplinkError::Registration(format!("failed to parse registration response: {e}"))
        })?;

        self.store.set(
            &self.registration_key(),
            &serde_json::to_value(&registration)?,
        )?;
        tracing::info!(client_id = %registration.client_id, "registered new client");
        Ok(registration)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Binds the callback listener, announces the authorization URL, awaits
    /// the redirect, and exchanges the code. Split from
    /// [`authorize`](Self::authorize) so tests can drive the listener with a
    /// known challenge.
    async fn run_authorization(
        &self,
        endpoints: &OAuthEndpoints,
        registration: &ClientRegistration,
        challenge: PkceChallenge,
    ) -> Result<TokenSet> {
        let listener =
            TcpListener::bind(format!("127.0.0.1:{}", self.config.callback_port)).await?;
        let redirect_uri = self.redirect_uri();

        let auth_url = self.build_authorization_url(
            endpoints,
            &registration.client_id,
            &redirect_uri,
            &challenge,
        )?;

        eprintln!("Open the following URL in your browser to authorize access:\n{auth_url}");
        try_open_browser(&auth_url);

        let (code, mut stream) =
            tokio::time::timeout(self.config.callback_timeout, accept_callback(&listener, &challenge.state))
                .await
                .map_err(|_| McplinkError::CallbackTimeout)??;

        let result = self
            .exchange_code(
                endpoints,
                registration,
                &code,
                &challenge.verifier,
                &redirect_uri,
            )
            .await;

        match &result {
            Ok(_) => {
                respond(
                    &mut stream,
                    200,
                    "Authorization successful. You may close this tab.",
                )
                .await
            }
            Err(e) => respond(&mut stream, 500, &format!("Token exchange failed: {e}")).await,
        }

        // Listener and callback stream are released here on every path.
        result
    }

    /// Exchanges an authorization code for tokens at the token endpoint and
    /// persists the result.
    async fn exchange_code(
        &self,
        endpoints: &OAuthEndpoints,
        registration: &ClientRegistration,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet> {
        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("client_id", &registration.client_id);
        params.insert("code_verifier", code_verifier);

        let resp = self
            .http
            .post(&endpoints.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| McplinkError::TokenExchange(format!("exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(McplinkError::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            ))
            .into());
        }

        let raw: TokenResponse = resp.json().await.map_err(|e| {
            McplinkError::TokenExchange(format!("failed to parse token response: {e}"))
        })?;

        let tokens = raw.into_token_set(None);
        self.persist_tokens(&tokens)?;
        tracing::info!("token exchange complete, token set persisted");
        Ok(tokens)
    }

    /// Builds the authorization URL with all required query parameters.
    fn build_authorization_url(
        &self,
        endpoints: &OAuthEndpoints,
        client_id: &str,
        redirect_uri: &str,
        challenge: &PkceChallenge,
    ) -> Result<String> {
        let mut url = Url::parse(&endpoints.authorization_endpoint).map_err(|e| {
            McplinkError::Config(format!("invalid authorization endpoint URL: {e}"))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("state", &challenge.state);
            query.append_pair("code_challenge", &challenge.challenge);
            query.append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
        }

        Ok(url.to_string())
    }

    /// The loopback redirect URI registered for this deployment.
    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.config.callback_port)
    }

    /// Store key of the cached client registration.
    fn registration_key(&self) -> String {
        format!("{}_client", self.config.deployment)
    }

    /// Store key of the persisted token set.
    fn token_key(&self) -> String {
        format!("{}_tokens", self.config.deployment)
    }

    /// Loads the persisted token set; absent or unreadable records read as
    /// `None` per the store contract.
    fn stored_tokens(&self) -> Option<TokenSet> {
        let value = self.store.get(&self.token_key())?;
        serde_json::from_value(value).ok()
    }

    /// Loads the cached client registration, if any.
    fn stored_registration(&self) -> Option<ClientRegistration> {
        let value = self.store.get(&self.registration_key())?;
        serde_json::from_value(value).ok()
    }

    /// Persists a token set, replacing any previous record wholesale.
    fn persist_tokens(&self, tokens: &TokenSet) -> Result<()> {
        self.store
            .set(&self.token_key(), &serde_json::to_value(tokens)?)
    }
}

// ---------------------------------------------------------------------------
// Callback listener
// ---------------------------------------------------------------------------

/// Accepts connections until one carries the redirect callback, then
/// validates it and returns the authorization code together with the open
/// stream (so the caller can answer the browser after the token exchange
/// settles).
///
/// Stray requests to other paths (favicons and the like) get a 404 and do
/// not consume the flow. An `error` query parameter or a `state` value from
/// a different flow fails immediately, before any token exchange, with an
/// error page written to the browser.
async fn accept_callback(
    listener: &TcpListener,
    expected_state: &str,
) -> Result<(String, TcpStream)> {
    loop {
        let (mut stream, _peer) = listener.accept().await?;

        let request_line = read_request_line(&mut stream).await?;
        let path = request_line.split_whitespace().nth(1).unwrap_or("/");
        let (path_only, query) = match path.split_once('?') {
            Some((p, q)) => (p, q),
            None => (path, ""),
        };

        if path_only != "/callback" {
            respond(&mut stream, 404, "Not found").await;
            continue;
        }

        let params = parse_query_string(query);

        if let Some(error) = params.get("error") {
            respond(&mut stream, 400, &format!("Authorization error: {error}")).await;
            return Err(McplinkError::CallbackError(error.clone()).into());
        }

        match params.get("state") {
            Some(state) if state == expected_state => {}
            _ => {
                respond(&mut stream, 400, "State mismatch").await;
                return Err(McplinkError::StateMismatch.into());
            }
        }

        let Some(code) = params.get("code").cloned() else {
            respond(&mut stream, 400, "Authorization code missing").await;
            return Err(McplinkError::CallbackError(
                "authorization code missing from callback".to_string(),
            )
            .into());
        };

        return Ok((code, stream));
    }
}

/// Reads the HTTP request line from the callback connection, consuming the
/// headers up to the blank line.
async fn read_request_line(stream: &mut TcpStream) -> Result<String> {
    let mut reader = BufReader::new(&mut *stream);
    let mut request_line = String::new();

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        // Headers end at the first empty line (or EOF).
        if n == 0 || line.trim_end().is_empty() {
            break;
        }
        if request_line.is_empty() {
            request_line = line.trim_end().to_string();
        }
    }

    Ok(request_line)
}

/// Writes a minimal HTTP response to the browser. Best-effort: the flow
/// outcome does not depend on the browser receiving it.
async fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

// ---------------------------------------------------------------------------
// Utility functions
// ---------------------------------------------------------------------------

/// Parses a URL query string into a key-value map.
///
/// Values are percent-decoded. Duplicate keys are overwritten by the last
/// occurrence.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in query.split('&') {
        let mut iter = pair.splitn(2, '=');
        let key = iter.next().unwrap_or("").to_string();
        let value = iter.next().unwrap_or("").to_string();
        if !key.is_empty() {
            map.insert(key, percent_decode(&value));
        }
    }
    map
}

/// Performs minimal percent-decoding of a URL query parameter value.
///
/// Converts `+` to space and `%XX` sequences to the corresponding byte.
fn percent_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'+' {
            out.push(' ');
            i += 1;
        } else if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte as char);
                    i += 3;
                    continue;
                }
            }
            out.push(bytes[i] as char);
            i += 1;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

/// Attempts to open the authorization URL in the user's default browser.
///
/// Errors are intentionally ignored; if the browser does not open the user
/// can copy the URL from stderr.
fn try_open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(url).spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    }
    #[cfg(target_os = "windows")]
    {
        let _ = std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn();
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = url;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
