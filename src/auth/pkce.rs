//! PKCE S256 challenge generation
//!
//! Implements the Proof Key for Code Exchange extension to OAuth 2.0 as
//! defined in RFC 7636, using the `S256` challenge method. One
//! [`PkceChallenge`] is generated per authorization attempt and held only in
//! memory for the duration of that flow; nothing here is ever persisted.
//!
//! The challenge bundles the CSRF `state` nonce alongside the verifier pair
//! because the three values share a lifetime: all are minted together at the
//! start of a flow and all are dead once the flow settles.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::Result;

// ---------------------------------------------------------------------------
// PkceChallenge
// ---------------------------------------------------------------------------

/// The per-flow secrets of one authorization attempt.
///
/// Created by [`generate`] and consumed by the authorization flow in
/// `src/auth/flow.rs`.
///
/// # Examples
///
/// ```
/// use mcplink::auth::pkce::generate;
///
/// let challenge = generate().expect("PKCE generation must not fail");
/// assert_eq!(challenge.verifier.len(), 43);
/// assert_ne!(challenge.verifier, challenge.challenge);
/// ```
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random opaque nonce echoed back by the redirect callback. A callback
    /// carrying any other value is rejected before token exchange.
    pub state: String,

    /// The code verifier: a base64url-encoded (no padding) random string of
    /// exactly 43 characters derived from 32 random bytes. Sent to the token
    /// endpoint in the `code_verifier` parameter.
    pub verifier: String,

    /// The code challenge: the base64url-encoded (no padding) SHA-256 digest
    /// of the UTF-8 representation of [`Self::verifier`]. Sent to the
    /// authorization endpoint in the `code_challenge` parameter.
    pub challenge: String,
}

/// The challenge method sent alongside every challenge produced here.
pub const CHALLENGE_METHOD: &str = "S256";

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Generates a fresh PKCE challenge and state nonce.
///
/// The verifier is 32 cryptographically random bytes encoded as a base64url
/// string without padding (43 characters). The challenge is the
/// base64url-encoded SHA-256 digest of the verifier string's UTF-8 bytes, as
/// specified in RFC 7636 section 4.2. The state nonce is 16 random bytes,
/// base64url-encoded without padding.
///
/// # Errors
///
/// Infallible in practice; returns a `Result` so that callers can use `?`
/// uniformly.
pub fn generate() -> Result<PkceChallenge> {
    use rand::RngCore as _;

    let mut state_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut state_bytes);
    let state = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(state_bytes);

    let mut verifier_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut verifier_bytes);
    let verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifier_bytes);

    // RFC 7636 section 4.2: BASE64URL(SHA256(ASCII(code_verifier)))
    let digest = Sha256::digest(verifier.as_bytes());
    let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice());

    Ok(PkceChallenge {
        state,
        verifier,
        challenge,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
