//! Session-oriented protocol client
//!
//! Implements the stateful request/response channel layered over plain
//! HTTPS POST. A session starts with a JSON-RPC `initialize` handshake that
//! yields an opaque session identifier (from a response header, with a
//! body-scan fallback); every subsequent call carries that identifier.
//! Responses arrive either as a single JSON document or as a server-sent
//! event stream, which [`sse`] reduces to a single result.
//!
//! # Module Layout
//!
//! - [`sse`]   -- event-stream response aggregation
//! - [`types`] -- JSON-RPC envelopes and protocol constants

pub mod sse;
pub mod types;

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::auth::flow::PkceAuthorizer;
use crate::error::{McplinkError, Result};
use crate::session::types::{
    ClientInfo, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, METHOD_INITIALIZE,
    METHOD_TOOLS_CALL, PROTOCOL_VERSION, SESSION_ID_HEADER,
};

// ---------------------------------------------------------------------------
// ProtocolSession
// ---------------------------------------------------------------------------

/// One protocol session against a remote service endpoint.
///
/// Created unconnected; [`initialize`](Self::initialize) performs the
/// handshake and records the session identifier for the lifetime of the
/// process. Calls that are made without an explicit access token pull one
/// from the injected [`PkceAuthorizer`].
pub struct ProtocolSession {
    http: Arc<reqwest::Client>,
    endpoint: Url,
    authorizer: Arc<PkceAuthorizer>,
    client_info: ClientInfo,
    session_id: Option<String>,
}

impl ProtocolSession {
    /// Creates an unconnected session targeting `endpoint`.
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client.
    /// * `endpoint` - The service message endpoint (its base URL).
    /// * `authorizer` - Token source for calls made without an explicit
    ///   access token.
    pub fn new(http: Arc<reqwest::Client>, endpoint: Url, authorizer: Arc<PkceAuthorizer>) -> Self {
        Self {
            http,
            endpoint,
            authorizer,
            client_info: ClientInfo::default(),
            session_id: None,
        }
    }

    /// The session identifier obtained by the handshake, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Performs the `initialize` handshake and records the session id.
    ///
    /// The identifier is taken from the `mcp-session-id` response header;
    /// when the header is absent the raw response body is scanned for the
    /// same field. Absence by both paths is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`McplinkError::Handshake`] on a non-2xx response or when no
    /// session identifier can be extracted.
    pub async fn initialize(&mut self, access_token: &str) -> Result<String> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: serde_json::json!(next_request_id()),
            method: METHOD_INITIALIZE.to_string(),
            params: Some(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": self.client_info,
            })),
        };

        let resp = self
            .http
            .post(self.endpoint.as_str())
            .header("Accept", "application/json, text/event-stream")
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| McplinkError::Handshake(format!("initialize request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(McplinkError::Handshake(format!(
                "initialize returned {status}: {body}"
            ))
            .into());
        }

        let header_id = resp
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let session_id = match header_id {
            Some(id) => id,
            None => {
                // Some gateways only echo the id inside the response body.
                let body = resp.text().await.unwrap_or_default();
                scan_session_id(&body).ok_or_else(|| {
                    McplinkError::Handshake("no session id returned".to_string())
                })?
            }
        };

        tracing::info!(session_id = %session_id, "session established");
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    /// Opens the server-push event stream for this session.
    ///
    /// Fire-and-forget: the GET is spawned, never awaited, and never read
    /// for content; its sole purpose is to keep the server-side subscription
    /// alive. Connection failures are invisible to the caller.
    pub fn open_event_stream(&self, access_token: &str) {
        let Some(session_id) = self.session_id.clone() else {
            tracing::debug!("no session id yet, skipping event stream");
            return;
        };

        let http = Arc::clone(&self.http);
        let endpoint = self.endpoint.clone();
        let token = access_token.to_string();

        tokio::spawn(async move {
            let outcome = http
                .get(endpoint.as_str())
                .header("Accept", "text/event-stream")
                .header(SESSION_ID_HEADER, session_id)
                .bearer_auth(token)
                .send()
                .await;
            if let Err(e) = outcome {
                tracing::debug!("event stream subscription failed: {e}");
            }
        });
    }

    /// Sends a JSON-RPC notification (no `id`) and discards the response.
    ///
    /// # Errors
    ///
    /// Propagates transport failures; the HTTP status and body are ignored.
    pub async fn notify(
        &self,
        method: &str,
        params: serde_json::Value,
        access_token: &str,
    ) -> Result<()> {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Some(params),
        };

        let mut req = self
            .http
            .post(self.endpoint.as_str())
            .header("Accept", "application/json, text/event-stream")
            .bearer_auth(access_token)
            .json(&notification);
        if let Some(ref session_id) = self.session_id {
            req = req.header(SESSION_ID_HEADER, session_id.as_str());
        }

        req.send().await?;
        Ok(())
    }

    /// Sends a JSON-RPC request and returns its `result` value.
    ///
    /// When `access_token` is `None` a token is obtained from the
    /// authorizer, failing with [`McplinkError::NotAuthorized`] when none is
    /// stored. The response is dispatched on its content type: a JSON
    /// document yields its `result` (or fails with the embedded
    /// `error.message`); an event stream is reduced by
    /// [`sse::collect_stream_result`].
    ///
    /// # Errors
    ///
    /// Returns [`McplinkError::Protocol`] for non-2xx responses, embedded
    /// error objects, and error frames in event streams.
    pub async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
        access_token: Option<&str>,
    ) -> Result<serde_json::Value> {
        let token = match access_token {
            Some(token) => token.to_string(),
            None => {
                let tokens = self
                    .authorizer
                    .access_token()
                    .await?
                    .ok_or(McplinkError::NotAuthorized)?;
                tokens.access_token
            }
        };

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: serde_json::json!(next_request_id()),
            method: method.to_string(),
            params: Some(params),
        };

        let mut req = self
            .http
            .post(self.endpoint.as_str())
            .header("Accept", "application/json, text/event-stream")
            .bearer_auth(&token)
            .json(&request);
        if let Some(ref session_id) = self.session_id {
            req = req.header(SESSION_ID_HEADER, session_id.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| McplinkError::Protocol(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(
                McplinkError::Protocol(format!("request returned {status}: {body}")).into(),
            );
        }

        let content_type = resp
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            return sse::collect_stream_result(resp.bytes_stream()).await;
        }

        let response: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| McplinkError::Protocol(format!("failed to parse response: {e}")))?;

        if let Some(error) = response.error {
            return Err(McplinkError::Protocol(error.message).into());
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    /// Invokes a named tool with the given arguments.
    ///
    /// Convenience specialization of [`request`](Self::request); the token
    /// is always resolved through the authorizer.
    pub async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.request(
            METHOD_TOOLS_CALL,
            serde_json::json!({ "name": name, "arguments": args }),
            None,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns the next request id, derived from the wall clock in milliseconds.
///
/// Collisions under rapid sequential calls are tolerated: requests are
/// issued strictly one at a time and responses are never correlated across
/// concurrent in-flight requests. Any move toward request multiplexing must
/// replace this with a genuinely unique generator.
fn next_request_id() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Scans a raw response body for the session id field.
fn scan_session_id(body: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        // Static pattern, compiled once.
        Regex::new(r#"(?i)mcp-session-id[:\s"]+([a-f0-9-]+)"#).expect("session id pattern is valid")
    });
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
