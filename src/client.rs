//! Client facade
//!
//! Composes the [`PkceAuthorizer`] and [`ProtocolSession`] into the single
//! `connect` / `call_tool` surface the CLI layer consumes.

use std::sync::Arc;

use url::Url;

use crate::auth::flow::PkceAuthorizer;
use crate::error::Result;
use crate::session::types::{ListToolsResponse, METHOD_INITIALIZED, METHOD_TOOLS_LIST};
use crate::session::ProtocolSession;

/// A connected (or connectable) client for one remote service deployment.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use url::Url;
/// use mcplink::auth::flow::{AuthorizerConfig, PkceAuthorizer};
/// use mcplink::client::McpClient;
/// use mcplink::store::MemoryStore;
///
/// # async fn example() -> mcplink::error::Result<()> {
/// let http = Arc::new(reqwest::Client::new());
/// let base_url = Url::parse("https://mcp.example.com")?;
/// let authorizer = Arc::new(PkceAuthorizer::new(
///     Arc::clone(&http),
///     Arc::new(MemoryStore::new()),
///     AuthorizerConfig {
///         deployment: "default".to_string(),
///         base_url: base_url.clone(),
///         client_name: "Local MCP Client".to_string(),
///         callback_port: 8976,
///         callback_timeout: Duration::from_secs(300),
///     },
/// ));
///
/// let mut client = McpClient::new(http, base_url, authorizer);
/// client.connect().await?;
/// let forms = client.call_tool("list_forms", serde_json::json!({})).await?;
/// println!("{forms}");
/// # Ok(())
/// # }
/// ```
pub struct McpClient {
    authorizer: Arc<PkceAuthorizer>,
    session: ProtocolSession,
    tools: Vec<serde_json::Value>,
}

impl McpClient {
    /// Creates an unconnected client for the service at `base_url`.
    pub fn new(
        http: Arc<reqwest::Client>,
        base_url: Url,
        authorizer: Arc<PkceAuthorizer>,
    ) -> Self {
        let session = ProtocolSession::new(Arc::clone(&http), base_url, Arc::clone(&authorizer));
        Self {
            authorizer,
            session,
            tools: Vec::new(),
        }
    }

    /// Obtains a token, performs the handshake, and completes the session
    /// setup.
    ///
    /// The token ladder: a stored usable token is reused; a missing token
    /// triggers the full interactive authorization; a failed refresh
    /// propagates (the store has been cleared, so the next run
    /// re-authorizes). After the handshake the event-stream subscription is
    /// spawned, the `initialized` announcement is sent, and the tool listing
    /// is fetched and cached.
    ///
    /// # Errors
    ///
    /// Propagates authorization, handshake, and protocol errors from the
    /// composed components.
    pub async fn connect(&mut self) -> Result<()> {
        let tokens = match self.authorizer.access_token().await? {
            Some(tokens) => tokens,
            None => self.authorizer.authorize().await?,
        };

        self.session.initialize(&tokens.access_token).await?;
        self.session.open_event_stream(&tokens.access_token);
        self.session
            .notify(METHOD_INITIALIZED, serde_json::json!({}), &tokens.access_token)
            .await?;

        let listing = self
            .session
            .request(METHOD_TOOLS_LIST, serde_json::json!({}), Some(&tokens.access_token))
            .await?;
        let listing: ListToolsResponse = serde_json::from_value(listing).unwrap_or_default();
        self.tools = listing.tools;

        tracing::info!(
            session_id = self.session.session_id().unwrap_or("<none>"),
            tool_count = self.tools.len(),
            "connected"
        );
        Ok(())
    }

    /// Invokes a named tool with the given arguments.
    pub async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.session.call_tool(name, args).await
    }

    /// The session identifier obtained by the handshake, if connected.
    pub fn session_id(&self) -> Option<&str> {
        self.session.session_id()
    }

    /// Tool descriptors returned by the server during `connect`.
    pub fn tools(&self) -> &[serde_json::Value] {
        &self.tools
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
