// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Runtime configuration loaded from the environment.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `STELLAR_NETWORK` | `testnet` or `mainnet` | Required |
//! | `SIGNING_SECRET_KEY` | Service signing key (`S...`) | Required |
//! | `MASTER_FUNDING_PUBLIC_KEY` | Master funding account (`G...`) | Required |
//! | `DATABASE_URL` | Postgres connection string | Required |
//! | `GOOGLE_CLIENT_ID` | Admin OIDC client id | Required |
//! | `GOOGLE_ALLOWED_DOMAIN` | Admin hosted domain (`hd` claim) | Required |
//! | `GOOGLE_ALLOWED_EMAILS` | Comma-separated admin allowlist | Required |
//! | `PORT` | Server bind port | `8080` |
//! | `HORIZON_URL` | Horizon endpoint | Derived from network |
//! | `LOG_LEVEL` | Log filter | `info` |
//! | `CORS_ORIGINS` | Comma-separated allowed origins | Permissive |
//! | `HTTP_READ_TIMEOUT` | Read timeout, seconds | `15` |
//! | `HTTP_WRITE_TIMEOUT` | Write timeout, seconds | `30` |
//! | `HTTP_IDLE_TIMEOUT` | Idle timeout, seconds | `60` |

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::stellar::keys::{is_valid_public_key, Keypair};
use crate::stellar::{PUBLIC_NETWORK_PASSPHRASE, TEST_NETWORK_PASSPHRASE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// The Stellar network the gateway operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StellarNetwork {
    Testnet,
    Mainnet,
}

impl StellarNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            StellarNetwork::Testnet => "testnet",
            StellarNetwork::Mainnet => "mainnet",
        }
    }

    pub fn passphrase(&self) -> &'static str {
        match self {
            StellarNetwork::Testnet => TEST_NETWORK_PASSPHRASE,
            StellarNetwork::Mainnet => PUBLIC_NETWORK_PASSPHRASE,
        }
    }

    fn default_horizon_url(&self) -> &'static str {
        match self {
            StellarNetwork::Testnet => "https://horizon-testnet.stellar.org",
            StellarNetwork::Mainnet => "https://horizon.stellar.org",
        }
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub stellar_network: StellarNetwork,
    pub signing_secret_key: String,
    pub master_funding_public_key: String,
    pub database_url: String,
    pub google_client_id: String,
    pub google_allowed_domain: String,
    pub google_allowed_emails: Vec<String>,
    pub port: u16,
    pub horizon_url: String,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let stellar_network = match required("STELLAR_NETWORK")?.as_str() {
            "testnet" => StellarNetwork::Testnet,
            "mainnet" => StellarNetwork::Mainnet,
            other => {
                return Err(ConfigError::Invalid {
                    var: "STELLAR_NETWORK",
                    reason: format!("must be 'testnet' or 'mainnet', got {other:?}"),
                })
            }
        };

        let signing_secret_key = required("SIGNING_SECRET_KEY")?;
        Keypair::from_secret_seed(&signing_secret_key).map_err(|e| ConfigError::Invalid {
            var: "SIGNING_SECRET_KEY",
            reason: format!("not a valid Stellar secret key: {e}"),
        })?;

        let master_funding_public_key = required("MASTER_FUNDING_PUBLIC_KEY")?;
        if !is_valid_public_key(&master_funding_public_key) {
            return Err(ConfigError::Invalid {
                var: "MASTER_FUNDING_PUBLIC_KEY",
                reason: "not a valid Stellar public key".to_string(),
            });
        }

        let port = match env::var("PORT") {
            Ok(raw) => {
                let port: u16 = raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "PORT",
                    reason: format!("must be between 1 and 65535, got {raw:?}"),
                })?;
                if port == 0 {
                    return Err(ConfigError::Invalid {
                        var: "PORT",
                        reason: "must be between 1 and 65535, got 0".to_string(),
                    });
                }
                port
            }
            Err(_) => 8080,
        };

        let horizon_url = env::var("HORIZON_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| stellar_network.default_horizon_url().to_string());

        Ok(Self {
            stellar_network,
            signing_secret_key,
            master_funding_public_key,
            database_url: required("DATABASE_URL")?,
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_allowed_domain: required("GOOGLE_ALLOWED_DOMAIN")?,
            google_allowed_emails: split_csv(&required("GOOGLE_ALLOWED_EMAILS")?),
            port,
            horizon_url,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|raw| split_csv(&raw))
                .unwrap_or_default(),
            read_timeout: duration_env("HTTP_READ_TIMEOUT", 15)?,
            write_timeout: duration_env("HTTP_WRITE_TIMEOUT", 30)?,
            idle_timeout: duration_env("HTTP_IDLE_TIMEOUT", 60)?,
        })
    }

    pub fn network_passphrase(&self) -> &'static str {
        self.stellar_network.passphrase()
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn duration_env(var: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                var,
                reason: format!("must be a duration in seconds, got {raw:?}"),
            })?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}
