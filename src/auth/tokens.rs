//! Token and client-registration records
//!
//! Defines the two JSON documents the authorizer persists through the
//! credential store, plus the raw token-endpoint response they are derived
//! from. Both persisted types are validated at the boundary: a registration
//! without `client_id` or a token response without `access_token` fails
//! deserialization instead of propagating missing values downstream.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lead time before true expiry at which a token is proactively refreshed.
pub const REFRESH_MARGIN_SECS: i64 = 300;

// ---------------------------------------------------------------------------
// TokenSet
// ---------------------------------------------------------------------------

/// A persisted OAuth token set.
///
/// Replaced wholesale on every issuance or refresh. `expires_at` is computed
/// from the token endpoint's `expires_in` at the moment the tokens are
/// received; when the server omits `expires_in` the token is treated as
/// non-expiring.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use mcplink::auth::tokens::TokenSet;
///
/// let tokens = TokenSet {
///     access_token: "tok".to_string(),
///     refresh_token: None,
///     obtained_at: Utc::now(),
///     expires_at: None,
/// };
///
/// // A token with no expiry is always usable.
/// assert!(tokens.is_usable());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// The access token string issued by the authorization server.
    pub access_token: String,

    /// Refresh token used to obtain a new access token without re-running
    /// the interactive flow. A refresh response that omits this field
    /// retains the previously stored value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// UTC timestamp at which the token set was received.
    pub obtained_at: DateTime<Utc>,

    /// UTC timestamp at which the access token expires, or `None` for a
    /// non-expiring token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Returns `true` while more than [`REFRESH_MARGIN_SECS`] remain before
    /// expiry. Tokens without an `expires_at` are always usable.
    pub fn is_usable(&self) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => Utc::now() < expires_at - Duration::seconds(REFRESH_MARGIN_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenResponse
// ---------------------------------------------------------------------------

/// Raw JSON response from the token endpoint for both the exchange and
/// refresh grants.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The issued access token. Required; a response without one fails fast.
    pub access_token: String,

    /// Optional replacement refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Optional lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    /// Converts the raw response into a [`TokenSet`] stamped with the current
    /// time.
    ///
    /// `prior_refresh_token` is the refresh token from the token set being
    /// replaced, kept when the response omits one (refresh responses commonly
    /// do).
    pub fn into_token_set(self, prior_refresh_token: Option<String>) -> TokenSet {
        let obtained_at = Utc::now();
        let expires_at = self
            .expires_in
            .map(|secs| obtained_at + Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));

        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(prior_refresh_token),
            obtained_at,
            expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientRegistration
// ---------------------------------------------------------------------------

/// A dynamic client registration response (RFC 7591), persisted verbatim.
///
/// Only `client_id` is interpreted; every other field the registration
/// endpoint returned is preserved opaquely so the stored record round-trips
/// without loss. Cached indefinitely per service endpoint and never
/// re-registered unless the cache is empty.
///
/// # Examples
///
/// ```
/// use mcplink::auth::tokens::ClientRegistration;
///
/// let json = r#"{"client_id": "abc-123", "client_name": "Local MCP Client"}"#;
/// let reg: ClientRegistration = serde_json::from_str(json).unwrap();
/// assert_eq!(reg.client_id, "abc-123");
/// assert!(reg.extra.contains_key("client_name"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// The OAuth client identifier. Required; a registration response
    /// without one is rejected at the boundary.
    pub client_id: String,

    /// All remaining registration fields, preserved for round-tripping.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
