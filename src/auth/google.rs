// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Google ID-token verification for the admin surface.
//!
//! Tokens are verified against Google's JWKS, then gated on three claims:
//! `email_verified` must be true, `hd` must match the allowed hosted
//! domain, and the email must be on the allowlist. Each failed check
//! produces a 403 naming the check, so operators can tell a missing
//! domain from a missing allowlist entry.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Validation};
use serde::Deserialize;

use super::jwks::JwksManager;
use super::AuthError;
use crate::error::Error;

/// Google's JWKS endpoint.
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Accepted `iss` values for Google ID tokens.
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Clock skew tolerance in seconds.
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// The verified claims the admin gate needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdClaims {
    pub email: String,
    pub email_verified: bool,
    pub hd: String,
}

/// Verifies a raw ID token and returns its claims. A trait so the claim
/// gate can be exercised without a live identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_claims(&self, raw_token: &str) -> Result<IdClaims, AuthError>;
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    hd: String,
}

/// [`TokenVerifier`] backed by Google's JWKS.
pub struct GoogleTokenVerifier {
    jwks: JwksManager,
    client_id: String,
}

impl GoogleTokenVerifier {
    pub fn new(jwks: JwksManager, client_id: impl Into<String>) -> Self {
        Self {
            jwks,
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl TokenVerifier for GoogleTokenVerifier {
    async fn verify_claims(&self, raw_token: &str) -> Result<IdClaims, AuthError> {
        let header = decode_header(raw_token).map_err(|_| AuthError::MalformedToken)?;

        let (decoding_key, algorithm) = if let Some(kid) = &header.kid {
            self.jwks.get_decoding_key(kid).await?
        } else {
            self.jwks.get_any_decoding_key().await?
        };

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[&self.client_id]);
        validation.leeway = CLOCK_SKEW_LEEWAY;

        let token_data = decode::<GoogleClaims>(raw_token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                _ => AuthError::MalformedToken,
            })?;

        Ok(IdClaims {
            email: token_data.claims.email,
            email_verified: token_data.claims.email_verified,
            hd: token_data.claims.hd,
        })
    }
}

/// Admin authentication: token verification plus claim gating.
pub struct AdminAuth {
    verifier: Arc<dyn TokenVerifier>,
    allowed_domain: String,
    allowed_emails: HashSet<String>,
}

impl AdminAuth {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        allowed_domain: impl Into<String>,
        allowed_emails: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            verifier,
            allowed_domain: allowed_domain.into(),
            allowed_emails: allowed_emails.into_iter().collect(),
        }
    }

    /// Verify a bearer token and enforce the admin claim checks.
    /// Returns the authenticated email.
    pub async fn authenticate(&self, raw_token: &str) -> Result<String, Error> {
        let claims = self
            .verifier
            .verify_claims(raw_token)
            .await
            .map_err(|_| Error::unauthorized("unauthorized", "Invalid ID token"))?;

        if !claims.email_verified {
            return Err(Error::forbidden("forbidden", "Email not verified"));
        }

        if claims.hd != self.allowed_domain {
            return Err(Error::forbidden("forbidden", "Domain not allowed"));
        }

        if !self.allowed_emails.contains(&claims.email) {
            return Err(Error::forbidden("forbidden", "User not authorized"));
        }

        Ok(claims.email)
    }
}
