//! OAuth endpoint discovery integration tests using wiremock
//!
//! Verifies `src/auth/discovery.rs`:
//!
//! - A well-known metadata document is parsed into the three endpoints.
//! - The metadata URL is rooted at the origin, not the service base path.
//! - Any discovery failure (non-2xx, malformed body, incomplete body,
//!   unreachable host) silently substitutes the conventional fallback
//!   paths appended to the base URL.

use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcplink::auth::discovery::{discover_endpoints, OAuthEndpoints, WELL_KNOWN_PATH};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns a complete metadata document pointing at a dedicated auth host.
fn metadata_body() -> serde_json::Value {
    serde_json::json!({
        "authorization_endpoint": "https://auth.example.com/authorize",
        "token_endpoint": "https://auth.example.com/token",
        "registration_endpoint": "https://auth.example.com/register"
    })
}

// ---------------------------------------------------------------------------
// Successful discovery
// ---------------------------------------------------------------------------

/// A 200 metadata response supplies all three endpoints.
#[tokio::test]
async fn test_discovery_uses_metadata_document_when_available() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .expect(1)
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let base = Url::parse(&server.uri()).expect("valid base URL");
    let endpoints = discover_endpoints(&http, &base).await;

    assert_eq!(
        endpoints.authorization_endpoint,
        "https://auth.example.com/authorize"
    );
    assert_eq!(endpoints.token_endpoint, "https://auth.example.com/token");
    assert_eq!(
        endpoints.registration_endpoint,
        "https://auth.example.com/register"
    );

    server.verify().await;
}

/// The metadata request must target the origin even when the base URL
/// carries a deployment path.
#[tokio::test]
async fn test_discovery_request_is_origin_rooted() {
    let server = MockServer::start().await;

    // The mock matches the origin-rooted path; a path-prefixed request
    // (/chatgpt/.well-known/...) would not match and would fall back.
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .expect(1)
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let base = Url::parse(&format!("{}/chatgpt", server.uri())).expect("valid base URL");
    let endpoints = discover_endpoints(&http, &base).await;

    assert_eq!(endpoints.token_endpoint, "https://auth.example.com/token");
    server.verify().await;
}

// ---------------------------------------------------------------------------
// Fallback paths
// ---------------------------------------------------------------------------

/// A non-2xx metadata response falls back to conventional paths under the
/// full base URL (path included).
#[tokio::test]
async fn test_discovery_falls_back_on_404() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let base = Url::parse(&format!("{}/chatgpt", server.uri())).expect("valid base URL");
    let endpoints = discover_endpoints(&http, &base).await;

    assert_eq!(
        endpoints.authorization_endpoint,
        format!("{}/chatgpt/authorize", server.uri())
    );
    assert_eq!(
        endpoints.token_endpoint,
        format!("{}/chatgpt/token", server.uri())
    );
    assert_eq!(
        endpoints.registration_endpoint,
        format!("{}/chatgpt/register", server.uri())
    );
}

/// A body that is not JSON falls back.
#[tokio::test]
async fn test_discovery_falls_back_on_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let base = Url::parse(&server.uri()).expect("valid base URL");
    let endpoints = discover_endpoints(&http, &base).await;

    assert_eq!(
        endpoints.token_endpoint,
        format!("{}/token", server.uri()),
        "malformed metadata must fall back"
    );
}

/// A document missing a required endpoint is malformed and falls back.
#[tokio::test]
async fn test_discovery_falls_back_on_incomplete_document() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WELL_KNOWN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorization_endpoint": "https://auth.example.com/authorize"
        })))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let base = Url::parse(&server.uri()).expect("valid base URL");
    let endpoints = discover_endpoints(&http, &base).await;

    assert_eq!(endpoints.registration_endpoint, format!("{}/register", server.uri()));
}

/// An unreachable host falls back without surfacing an error.
#[tokio::test]
async fn test_discovery_falls_back_when_host_is_unreachable() {
    // Bind and immediately drop a listener so the port is closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };

    let http = reqwest::Client::new();
    let base = Url::parse(&format!("http://127.0.0.1:{port}/mcp")).expect("valid base URL");
    let endpoints = discover_endpoints(&http, &base).await;

    assert_eq!(
        endpoints.authorization_endpoint,
        format!("http://127.0.0.1:{port}/mcp/authorize")
    );
}

// ---------------------------------------------------------------------------
// Fallback construction (no network)
// ---------------------------------------------------------------------------

/// `OAuthEndpoints::fallback` is pure URL construction.
#[test]
fn test_fallback_construction_matches_convention() {
    let base = Url::parse("https://mcp.example.com/chatgpt").unwrap();
    let eps = OAuthEndpoints::fallback(&base);
    assert_eq!(
        eps.authorization_endpoint,
        "https://mcp.example.com/chatgpt/authorize"
    );
    assert_eq!(eps.token_endpoint, "https://mcp.example.com/chatgpt/token");
    assert_eq!(
        eps.registration_endpoint,
        "https://mcp.example.com/chatgpt/register"
    );
}
