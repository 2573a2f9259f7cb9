//! mcplink - OAuth2-PKCE client for remote MCP services
//!
//! This library implements delegated access to a remote MCP-style service
//! and a stateful protocol session on top of it, with a transient loopback
//! receiver as its only server-side surface.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `store`: durable named-JSON-record storage for credentials
//! - `auth`: endpoint discovery, dynamic client registration, the PKCE
//!   authorization code flow, and token refresh
//! - `session`: the JSON-RPC session client with SSE response handling
//! - `client`: the `connect` / `call_tool` facade over auth and session
//! - `config`: configuration management and validation
//! - `output`: run report collection
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use url::Url;
//! use mcplink::auth::flow::{AuthorizerConfig, PkceAuthorizer};
//! use mcplink::store::FileStore;
//! use mcplink::McpClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http = Arc::new(reqwest::Client::new());
//!     let base_url = Url::parse("https://mcp.example.com")?;
//!     let store = Arc::new(FileStore::new("/tmp/mcplink".into()));
//!     let authorizer = Arc::new(PkceAuthorizer::new(
//!         Arc::clone(&http),
//!         store,
//!         AuthorizerConfig {
//!             deployment: "default".to_string(),
//!             base_url: base_url.clone(),
//!             client_name: "Local MCP Client".to_string(),
//!             callback_port: 8976,
//!             callback_timeout: Duration::from_secs(300),
//!         },
//!     ));
//!
//!     let mut client = McpClient::new(http, base_url, authorizer);
//!     client.connect().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use client::McpClient;
pub use config::Config;
pub use error::{McplinkError, Result};
pub use output::RunReport;
