//! Error types for mcplink
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for mcplink operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, the OAuth authorization flow, and protocol
/// session calls. Discovery failures are deliberately absent: endpoint
/// discovery falls back to conventional paths and never surfaces an error.
#[derive(Error, Debug)]
pub enum McplinkError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dynamic client registration was rejected by the authorization server
    #[error("Client registration failed: {0}")]
    Registration(String),

    /// Authorization code could not be exchanged for tokens
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Refresh token was rejected; the cached token set has been cleared
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// The protocol handshake did not produce a usable session
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The redirect callback carried a `state` value from a different flow
    #[error("State mismatch in authorization callback")]
    StateMismatch,

    /// The authorization server reported an error via the redirect callback
    #[error("Authorization callback returned error: {0}")]
    CallbackError(String),

    /// No redirect callback arrived before the listener deadline
    #[error("Timed out waiting for authorization callback")]
    CallbackTimeout,

    /// The remote service returned a protocol-level error for a request
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A call required an access token but none is stored
    #[error("Not authorized: no access token available")]
    NotAuthorized,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for mcplink operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
