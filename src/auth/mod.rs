// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Authentication primitives: API-key hashing, bearer-token extraction,
//! and Google ID-token verification for the admin surface.

pub mod google;
pub mod jwks;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use google::{AdminAuth, GoogleTokenVerifier, IdClaims, TokenVerifier};
pub use jwks::JwksManager;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),

    #[error("no matching key in JWKS")]
    NoMatchingKey,

    #[error("malformed token")]
    MalformedToken,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("internal auth error: {0}")]
    Internal(String),
}

/// Hex-encoded SHA-256 hash of the input. API keys are stored and looked
/// up by this hash; the raw secret is never persisted.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Extract a bearer token from the `Authorization` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn sha256_hex_matches_known_vector() {
        // sha256("abc")
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk_test_x"));
        assert_eq!(extract_bearer_token(&headers), Some("sk_test_x"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
