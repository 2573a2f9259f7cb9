//! OAuth endpoint discovery
//!
//! Resolves the authorization, token, and registration endpoints for a
//! service before each authorization attempt. The well-known metadata
//! document is tried first; any failure at all (network, non-2xx status,
//! malformed or incomplete body) silently substitutes the conventional
//! fallback paths derived from the service base URL. Discovery therefore
//! never returns an error.
//!
//! # References
//!
//! - RFC 8414 <https://www.rfc-editor.org/rfc/rfc8414>

use serde::{Deserialize, Serialize};
use url::Url;

/// Well-known path of the authorization server metadata document, resolved
/// against the origin of the service base URL.
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";

// ---------------------------------------------------------------------------
// OAuthEndpoints
// ---------------------------------------------------------------------------

/// The three OAuth endpoints the authorization flow talks to.
///
/// Either parsed from the well-known metadata document or built from the
/// service base URL via [`OAuthEndpoints::fallback`]. All three fields are
/// required; a metadata document missing any of them is treated as malformed
/// and the fallback is used instead.
///
/// # Examples
///
/// ```
/// use mcplink::auth::discovery::OAuthEndpoints;
/// use url::Url;
///
/// let base = Url::parse("https://mcp.example.com/chatgpt").unwrap();
/// let eps = OAuthEndpoints::fallback(&base);
/// assert_eq!(eps.authorization_endpoint, "https://mcp.example.com/chatgpt/authorize");
/// assert_eq!(eps.token_endpoint, "https://mcp.example.com/chatgpt/token");
/// assert_eq!(eps.registration_endpoint, "https://mcp.example.com/chatgpt/register");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthEndpoints {
    /// URL of the authorization endpoint (RFC 6749 section 3.1).
    pub authorization_endpoint: String,

    /// URL of the token endpoint (RFC 6749 section 3.2).
    pub token_endpoint: String,

    /// URL of the Dynamic Client Registration endpoint (RFC 7591).
    pub registration_endpoint: String,
}

impl OAuthEndpoints {
    /// Builds the conventional fallback endpoints by appending `/authorize`,
    /// `/token`, and `/register` to the service base URL (path included).
    pub fn fallback(base_url: &Url) -> Self {
        let base = base_url.as_str().trim_end_matches('/');
        Self {
            authorization_endpoint: format!("{base}/authorize"),
            token_endpoint: format!("{base}/token"),
            registration_endpoint: format!("{base}/register"),
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Resolves OAuth endpoints for `base_url`, falling back to conventional
/// paths when the well-known document is unavailable.
///
/// The metadata URL is the well-known path resolved against the *origin* of
/// the base URL (the path component of the base URL does not participate),
/// while the fallback endpoints are appended to the full base URL.
///
/// # Arguments
///
/// * `http` - Shared HTTP client used for the metadata request.
/// * `base_url` - The service base URL.
///
/// # Examples
///
/// ```no_run
/// use url::Url;
/// use mcplink::auth::discovery::discover_endpoints;
///
/// # async fn example() {
/// let http = reqwest::Client::new();
/// let base = Url::parse("https://mcp.example.com/chatgpt").unwrap();
/// let endpoints = discover_endpoints(&http, &base).await;
/// println!("token endpoint: {}", endpoints.token_endpoint);
/// # }
/// ```
pub async fn discover_endpoints(http: &reqwest::Client, base_url: &Url) -> OAuthEndpoints {
    match fetch_metadata(http, base_url).await {
        Some(endpoints) => endpoints,
        None => {
            tracing::debug!(
                "endpoint discovery unavailable for {}, using fallback paths",
                base_url
            );
            OAuthEndpoints::fallback(base_url)
        }
    }
}

/// Attempts to fetch and parse the well-known metadata document. Any failure
/// collapses to `None`.
async fn fetch_metadata(http: &reqwest::Client, base_url: &Url) -> Option<OAuthEndpoints> {
    let metadata_url = base_url.join(WELL_KNOWN_PATH).ok()?;
    let resp = http.get(metadata_url).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    resp.json::<OAuthEndpoints>().await.ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_appends_conventional_paths() {
        let base = Url::parse("https://mcp.example.com").unwrap();
        let eps = OAuthEndpoints::fallback(&base);
        assert_eq!(
            eps.authorization_endpoint,
            "https://mcp.example.com/authorize"
        );
        assert_eq!(eps.token_endpoint, "https://mcp.example.com/token");
        assert_eq!(eps.registration_endpoint, "https://mcp.example.com/register");
    }

    #[test]
    fn test_fallback_preserves_base_path() {
        let base = Url::parse("https://mcp.example.com/chatgpt-app").unwrap();
        let eps = OAuthEndpoints::fallback(&base);
        assert_eq!(
            eps.authorization_endpoint,
            "https://mcp.example.com/chatgpt-app/authorize"
        );
    }

    #[test]
    fn test_fallback_handles_trailing_slash() {
        let base = Url::parse("https://mcp.example.com/chatgpt/").unwrap();
        let eps = OAuthEndpoints::fallback(&base);
        assert_eq!(
            eps.token_endpoint,
            "https://mcp.example.com/chatgpt/token",
            "trailing slash must not produce a double slash"
        );
    }

    #[test]
    fn test_well_known_url_is_origin_rooted() {
        let base = Url::parse("https://mcp.example.com/chatgpt").unwrap();
        let metadata_url = base.join(WELL_KNOWN_PATH).unwrap();
        assert_eq!(
            metadata_url.as_str(),
            "https://mcp.example.com/.well-known/oauth-authorization-server",
            "the base path must not participate in the well-known URL"
        );
    }

    #[test]
    fn test_endpoints_deserialize_from_metadata_document() {
        let json = r#"{
            "authorization_endpoint": "https://auth.example.com/authorize",
            "token_endpoint": "https://auth.example.com/token",
            "registration_endpoint": "https://auth.example.com/register",
            "scopes_supported": ["openid"]
        }"#;

        let eps: OAuthEndpoints = serde_json::from_str(json).unwrap();
        assert_eq!(
            eps.authorization_endpoint,
            "https://auth.example.com/authorize"
        );
        assert_eq!(eps.token_endpoint, "https://auth.example.com/token");
        assert_eq!(eps.registration_endpoint, "https://auth.example.com/register");
    }

    #[test]
    fn test_incomplete_metadata_fails_to_parse() {
        // A document missing token_endpoint is malformed; callers fall back.
        let json = r#"{
            "authorization_endpoint": "https://auth.example.com/authorize"
        }"#;
        assert!(serde_json::from_str::<OAuthEndpoints>(json).is_err());
    }

    // Network-facing behaviour (2xx metadata, non-2xx fallback, unreachable
    // host fallback) is covered by wiremock tests in
    // tests/auth_discovery_test.rs.
}
