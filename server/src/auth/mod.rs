//! Bearer-token authentication for mutating requests.

mod middleware;
mod verifier;

pub use middleware::{require_auth, Authenticator, API_TOKEN_HEADER, API_TOKEN_PRINCIPAL};
pub use verifier::{AuthError, DenyAllVerifier, JwtVerifier, Principal, TokenVerifier};
