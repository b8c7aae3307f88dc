use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Authenticator, DenyAllVerifier, JwtVerifier, TokenVerifier};
use crate::cache::DEFAULT_TTL;
use crate::storage::StorageConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Everything the server reads from its environment at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind_address: SocketAddr,
    pub cache_ttl: Duration,
    pub jwt: Option<JwtSettings>,
    pub api_token: Option<String>,
    pub storage: StorageConfig,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Blank variables count as unset
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_address = match lookup("BIND_ADDRESS") {
            Some(address) => address,
            None => {
                let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
                let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
                format!("{host}:{port}")
            }
        };
        let bind_address = bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address: {bind_address}"))?;

        let cache_ttl = match lookup("CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("CACHE_TTL_SECS must be a whole number, got '{raw}'"))?,
            ),
            None => DEFAULT_TTL,
        };

        let jwt = lookup("AUTH_JWT_SECRET").map(|secret| JwtSettings {
            secret,
            issuer: lookup("AUTH_JWT_ISSUER"),
            audience: lookup("AUTH_JWT_AUDIENCE"),
        });

        Ok(Self {
            bind_address,
            cache_ttl,
            jwt,
            api_token: lookup("API_TOKEN"),
            storage: StorageConfig::from_lookup(lookup)?,
        })
    }

    pub fn verifier(&self) -> Arc<dyn TokenVerifier> {
        match &self.jwt {
            Some(jwt) => {
                let mut verifier = JwtVerifier::hs256(jwt.secret.as_bytes());
                if let Some(issuer) = &jwt.issuer {
                    verifier = verifier.with_issuer(issuer);
                }
                if let Some(audience) = &jwt.audience {
                    verifier = verifier.with_audience(audience);
                }
                Arc::new(verifier)
            }
            None => Arc::new(DenyAllVerifier),
        }
    }

    pub fn authenticator(&self) -> Authenticator {
        let authenticator = Authenticator::new(self.verifier());
        match &self.api_token {
            Some(token) => authenticator.with_api_token(token.clone()),
            None => authenticator,
        }
    }
}
