//! Identity extraction
//!
//! The session collaborator hands us an optional authenticated user id as
//! a Bearer token (HS256). Orders are not an authenticated surface: an
//! absent or invalid token simply yields a guest.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::core::ServerState;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Verifies session tokens issued by the identity collaborator.
pub struct JwtService {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Extract the user id from a token; None if the token does not
    /// verify.
    pub fn verify(&self, token: &str) -> Option<String> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected, treating caller as guest");
                None
            }
        }
    }
}

/// Optional authenticated user id; guests extract as `OptionalUser(None)`.
pub struct OptionalUser(pub Option<String>);

impl FromRequestParts<ServerState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| state.jwt.verify(token));
        Ok(OptionalUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn token(secret: &str, sub: &str) -> String {
        let claims = TestClaims {
            sub: sub.into(),
            exp: (shared::util::now_millis() / 1000 + 3600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_user_id() {
        let jwt = JwtService::new("secret");
        assert_eq!(jwt.verify(&token("secret", "u42")), Some("u42".into()));
    }

    #[test]
    fn wrong_secret_yields_guest() {
        let jwt = JwtService::new("secret");
        assert_eq!(jwt.verify(&token("other", "u42")), None);
        assert_eq!(jwt.verify("not-a-token"), None);
    }
}
