// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::EnvFilter;

use sponsorship_gateway::api::router;
use sponsorship_gateway::auth::{AdminAuth, GoogleTokenVerifier, JwksManager};
use sponsorship_gateway::auth::google::GOOGLE_JWKS_URL;
use sponsorship_gateway::config::Config;
use sponsorship_gateway::limits::{AuthAttemptLimiter, RateLimiter};
use sponsorship_gateway::service::{ApiKeyService, FundingService, SigningService};
use sponsorship_gateway::state::AppState;
use sponsorship_gateway::stellar::account::AccountService;
use sponsorship_gateway::stellar::builder::Builder;
use sponsorship_gateway::stellar::horizon::HorizonClient;
use sponsorship_gateway::stellar::signer::Signer;
use sponsorship_gateway::stellar::submission::SubmissionChecker;
use sponsorship_gateway::storage::postgres::{connect, run_migrations, PgStore};

/// Timeout for the startup JWKS warm-up fetch.
const JWKS_WARMUP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();
    tracing::info!(network = config.stellar_network.as_str(), "configuration loaded");

    // Database
    let pool = connect(&config.database_url).await?;
    run_migrations(&pool).await?;
    tracing::info!("database migrations complete");
    let store = Arc::new(PgStore::new(pool));

    // Stellar services
    let horizon = Arc::new(HorizonClient::new(config.horizon_url.clone()));
    let accounts = AccountService::new(horizon.clone());
    let signer = Arc::new(Signer::new(
        &config.signing_secret_key,
        config.network_passphrase(),
    )?);
    let builder = Builder::new(
        horizon.clone(),
        signer.public_key(),
        config.master_funding_public_key.clone(),
        config.network_passphrase(),
    );

    // Admin OIDC: warm the JWKS cache so provider misconfiguration shows
    // up at startup, not on the first admin request.
    let jwks = JwksManager::new(GOOGLE_JWKS_URL);
    match tokio::time::timeout(JWKS_WARMUP_TIMEOUT, jwks.refresh()).await {
        Ok(Ok(())) => tracing::info!("JWKS cache warmed"),
        Ok(Err(err)) => tracing::warn!(error = %err, "JWKS warm-up failed; continuing"),
        Err(_) => tracing::warn!("JWKS warm-up timed out; continuing"),
    }
    let admin_auth = Arc::new(AdminAuth::new(
        Arc::new(GoogleTokenVerifier::new(jwks, config.google_client_id.clone())),
        config.google_allowed_domain.clone(),
        config.google_allowed_emails.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        accounts: accounts.clone(),
        signing: Arc::new(SigningService::new(
            store.clone(),
            signer.clone(),
            accounts.clone(),
        )),
        api_keys: Arc::new(ApiKeyService::new(store.clone(), config.stellar_network)),
        funding: Arc::new(FundingService::new(
            store,
            builder,
            signer,
            accounts,
            horizon.clone(),
            config.master_funding_public_key.clone(),
            config.network_passphrase(),
        )),
        checker: SubmissionChecker::new(horizon),
        rate_limiter: Arc::new(RateLimiter::new()),
        auth_attempts: Arc::new(AuthAttemptLimiter::default()),
        admin_auth,
        start_time: Instant::now(),
    };

    let app = router(state).layer(TimeoutLayer::new(config.write_timeout));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "sponsorship gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
