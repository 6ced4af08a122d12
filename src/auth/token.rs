use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::shared::AppError;

/// Role extracted from a verified bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

/// Claims carried by a bearer token. Credential issuance is an external
/// collaborator; the engine only verifies tokens and reads user id + role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthClaims {
    /// User id (standard JWT subject claim)
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

impl AuthClaims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Configuration for JWT verification (and issuance, used by tests and tooling)
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mints a token for the given user. The engine itself never calls this
    /// on a request path; it exists for tests and local tooling.
    pub fn issue(&self, user_id: &str, role: Role) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = AuthClaims {
            sub: user_id.to_string(),
            role,
            exp: (now + Duration::hours(24)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::Internal
        })
    }

    /// Validates a token and returns the claims if valid
    pub fn validate(&self, token: &str) -> Result<AuthClaims, AppError> {
        decode::<AuthClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::Unauthorized("invalid token".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate_token() {
        let config = TokenConfig::new("test-secret");

        let token = config.issue("user-1", Role::User).unwrap();
        assert!(!token.is_empty());

        let claims = config.validate(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::User);
        assert!(claims.exp > claims.iat);
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_admin_role_round_trip() {
        let config = TokenConfig::new("test-secret");

        let token = config.issue("admin-1", Role::Admin).unwrap();
        let claims = config.validate(&token).unwrap();
        assert!(claims.is_admin());
    }

    #[test]
    fn test_invalid_token() {
        let config = TokenConfig::new("test-secret");
        let result = config.validate("invalid.token.here");
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_token_with_different_secret() {
        let issuer = TokenConfig::new("secret-a");
        let verifier = TokenConfig::new("secret-b");

        let token = issuer.issue("user-1", Role::User).unwrap();
        assert!(issuer.validate(&token).is_ok());
        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn test_role_serialization_is_screaming() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"ADMIN\"");
        let json = serde_json::to_string(&Role::User).unwrap();
        assert_eq!(json, "\"USER\"");
    }
}
