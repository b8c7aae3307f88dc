use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::debug;

use super::verifier::{AuthError, Principal, TokenVerifier};
use crate::http::ApiError;

/// Header carrying the static API token
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Identity recorded for writes made with the static API token
pub const API_TOKEN_PRINCIPAL: &str = "api-token";

type HmacSha256 = Hmac<Sha256>;

/// Keys a MAC with the token so two tokens compare through `verify_slice`,
/// which runs in constant time regardless of where they differ
fn token_mac(token: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(token).ok()?;
    mac.update(API_TOKEN_HEADER.as_bytes());
    Some(mac)
}

pub struct Authenticator {
    verifier: Arc<dyn TokenVerifier>,
    api_token_tag: Option<Vec<u8>>,
}

impl Authenticator {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier,
            api_token_tag: None,
        }
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        let token: String = token.into();
        self.api_token_tag = if token.is_empty() {
            None
        } else {
            token_mac(token.as_bytes()).map(|mac| mac.finalize().into_bytes().to_vec())
        };
        self
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        if let Some(expected) = &self.api_token_tag {
            let matches = headers
                .get(API_TOKEN_HEADER)
                .and_then(|value| token_mac(value.as_bytes()))
                .is_some_and(|mac| mac.verify_slice(expected).is_ok());
            if matches {
                return Ok(Principal::new(API_TOKEN_PRINCIPAL));
            }
        }

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        self.verifier.verify(token).await
    }
}

fn is_protected(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

/// Reads pass through; writes need a verified [`Principal`], which is stored
/// in the request extensions for the handler.
pub async fn require_auth(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_protected(request.method()) {
        return Ok(next.run(request).await);
    }

    let principal = auth.authenticate(request.headers()).await?;
    debug!(uid = %principal.uid, "Authenticated request");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::auth::DenyAllVerifier;
    use async_trait::async_trait;
    use axum::http::HeaderValue;

    struct FixedVerifier;

    #[async_trait]
    impl TokenVerifier for FixedVerifier {
        async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
            match token {
                "good" => Ok(Principal::new("operator-1")),
                _ => Err(AuthError::InvalidToken("unknown token".to_string())),
            }
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[tokio::test]
    async fn test_bearer_token_is_verified() {
        let auth = Authenticator::new(Arc::new(FixedVerifier));

        let principal = auth
            .authenticate(&headers(&[("authorization", "Bearer good")]))
            .await
            .unwrap();
        assert_eq!(principal.uid, "operator-1");

        assert!(matches!(
            auth.authenticate(&headers(&[("authorization", "Bearer bad")]))
                .await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header() {
        let auth = Authenticator::new(Arc::new(FixedVerifier));

        for case in [
            headers(&[]),
            headers(&[("authorization", "good")]),
            headers(&[("authorization", "Basic good")]),
            headers(&[("authorization", "Bearer ")]),
        ] {
            assert!(matches!(
                auth.authenticate(&case).await,
                Err(AuthError::MissingToken)
            ));
        }
    }

    #[tokio::test]
    async fn test_static_api_token() {
        let auth = Authenticator::new(Arc::new(DenyAllVerifier)).with_api_token("s3cret");

        let principal = auth
            .authenticate(&headers(&[(API_TOKEN_HEADER, "s3cret")]))
            .await
            .unwrap();
        assert_eq!(principal.uid, API_TOKEN_PRINCIPAL);

        assert!(auth
            .authenticate(&headers(&[(API_TOKEN_HEADER, "guess")]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_api_token_must_match_exactly() {
        let auth = Authenticator::new(Arc::new(DenyAllVerifier)).with_api_token("s3cret");

        for presented in ["s3cre", "s3cret ", "S3CRET", "s3cret-and-more", ""] {
            assert!(
                auth.authenticate(&headers(&[(API_TOKEN_HEADER, presented)]))
                    .await
                    .is_err(),
                "accepted {presented:?}"
            );
        }
    }

    #[test]
    fn test_token_tags_are_fixed_length() {
        let short = token_mac(b"a").unwrap().finalize().into_bytes();
        let long = token_mac(&[b'x'; 4096]).unwrap().finalize().into_bytes();

        assert_eq!(short.len(), long.len());
        assert!(token_mac(b"a").unwrap().verify_slice(&short).is_ok());
        assert!(token_mac(b"b").unwrap().verify_slice(&short).is_err());
    }

    #[tokio::test]
    async fn test_empty_api_token_is_disabled() {
        let auth = Authenticator::new(Arc::new(DenyAllVerifier)).with_api_token("");

        assert!(auth
            .authenticate(&headers(&[(API_TOKEN_HEADER, "")]))
            .await
            .is_err());
    }

    #[test]
    fn test_only_writes_are_protected() {
        assert!(is_protected(&Method::POST));
        assert!(is_protected(&Method::DELETE));
        assert!(!is_protected(&Method::GET));
        assert!(!is_protected(&Method::OPTIONS));
    }
}
