use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

/// The verified identity behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: String,
}

impl Principal {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Checks tokens issued by an external identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: Option<String>,
    uid: Option<String>,
}

/// Verifies HS256 JWTs signed with a secret shared with the identity provider
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        data.claims
            .uid
            .or(data.claims.sub)
            .filter(|uid| !uid.is_empty())
            .map(Principal::new)
            .ok_or_else(|| AuthError::InvalidToken("token carries no subject".to_string()))
    }
}

/// Used when no identity provider is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllVerifier;

#[async_trait]
impl TokenVerifier for DenyAllVerifier {
    async fn verify(&self, _token: &str) -> Result<Principal, AuthError> {
        Err(AuthError::InvalidToken(
            "no identity provider configured".to_string(),
        ))
    }
}
