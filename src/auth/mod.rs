//! OAuth2 authorization with PKCE
//!
//! This module implements the delegated-access side of the client: endpoint
//! discovery, dynamic client registration, the browser-based authorization
//! code flow with PKCE, and the persisted token refresh lifecycle.
//!
//! # Module Layout
//!
//! - [`discovery`] -- well-known endpoint metadata with static fallback
//! - [`flow`]      -- authorization code flow, callback listener, refresh
//! - [`pkce`]      -- PKCE `S256` challenge and state generation
//! - [`tokens`]    -- persisted token set and client registration records

pub mod discovery;
pub mod flow;
pub mod pkce;
pub mod tokens;
