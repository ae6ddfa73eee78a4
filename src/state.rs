// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Shared application state handed to request handlers.
//!
//! Everything in here is cheap to clone: services and limiters sit behind
//! `Arc`s, and no request-scoped state is shared.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AdminAuth;
use crate::config::Config;
use crate::limits::{AuthAttemptLimiter, RateLimiter};
use crate::service::{ApiKeyService, FundingService, SigningService};
use crate::stellar::account::AccountService;
use crate::stellar::submission::SubmissionChecker;
use crate::storage::Store;

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub accounts: AccountService,
    pub signing: Arc<SigningService>,
    pub api_keys: Arc<ApiKeyService>,
    pub funding: Arc<FundingService>,
    pub checker: SubmissionChecker,
    pub rate_limiter: Arc<RateLimiter>,
    /// One limiter for both namespaces; keys are prefixed `api_key:` or
    /// `google_admin:` so data-plane and admin failures never conflate.
    pub auth_attempts: Arc<AuthAttemptLimiter>,
    pub admin_auth: Arc<AdminAuth>,
    pub start_time: Instant,
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::auth::{IdClaims, TokenVerifier};
    use crate::config::StellarNetwork;
    use crate::service::testutil::{MockStore, StubHorizon};
    use crate::stellar::builder::Builder;
    use crate::stellar::keys::Keypair;
    use crate::stellar::signer::Signer;
    use crate::stellar::TEST_NETWORK_PASSPHRASE;
    use async_trait::async_trait;

    /// Verifier that accepts the literal token "admin-token".
    struct FixedVerifier {
        email: String,
    }

    #[async_trait]
    impl TokenVerifier for FixedVerifier {
        async fn verify_claims(
            &self,
            raw_token: &str,
        ) -> Result<IdClaims, crate::auth::AuthError> {
            if raw_token == "admin-token" {
                Ok(IdClaims {
                    email: self.email.clone(),
                    email_verified: true,
                    hd: "example.com".to_string(),
                })
            } else {
                Err(crate::auth::AuthError::InvalidSignature)
            }
        }
    }

    /// Build a fully wired state over in-memory fakes for router tests.
    pub(crate) fn test_state(store: Arc<MockStore>, horizon: Arc<StubHorizon>) -> AppState {
        let master_kp = Keypair::random();
        let signing_kp = Keypair::random();

        let config = Config {
            stellar_network: StellarNetwork::Testnet,
            signing_secret_key: signing_kp.secret_seed(),
            master_funding_public_key: master_kp.public_key(),
            database_url: "postgres://unused".to_string(),
            google_client_id: "client-id".to_string(),
            google_allowed_domain: "example.com".to_string(),
            google_allowed_emails: vec!["admin@example.com".to_string()],
            port: 0,
            horizon_url: "http://horizon.invalid".to_string(),
            log_level: "info".to_string(),
            cors_origins: Vec::new(),
            read_timeout: std::time::Duration::from_secs(15),
            write_timeout: std::time::Duration::from_secs(30),
            idle_timeout: std::time::Duration::from_secs(60),
        };

        let accounts = AccountService::new(horizon.clone());
        let signer = Arc::new(
            Signer::new(&signing_kp.secret_seed(), TEST_NETWORK_PASSPHRASE)
                .expect("valid test signing key"),
        );
        let builder = Builder::new(
            horizon.clone(),
            signing_kp.public_key(),
            master_kp.public_key(),
            TEST_NETWORK_PASSPHRASE,
        );

        let admin_auth = Arc::new(AdminAuth::new(
            Arc::new(FixedVerifier {
                email: "admin@example.com".to_string(),
            }),
            "example.com",
            vec!["admin@example.com".to_string()],
        ));

        AppState {
            config: Arc::new(config),
            store: store.clone(),
            accounts: accounts.clone(),
            signing: Arc::new(SigningService::new(
                store.clone(),
                signer.clone(),
                accounts.clone(),
            )),
            api_keys: Arc::new(ApiKeyService::new(store.clone(), StellarNetwork::Testnet)),
            funding: Arc::new(FundingService::new(
                store,
                builder,
                signer,
                accounts,
                horizon.clone(),
                master_kp.public_key(),
                TEST_NETWORK_PASSPHRASE,
            )),
            checker: SubmissionChecker::new(horizon),
            rate_limiter: Arc::new(RateLimiter::new()),
            auth_attempts: Arc::new(AuthAttemptLimiter::default()),
            admin_auth,
            start_time: Instant::now(),
        }
    }
}
