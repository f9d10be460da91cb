//! Access and refresh tokens.
//!
//! Access tokens are HS256 JWTs carrying the user ID and role. Refresh tokens
//! are 32 random bytes, base64url encoded; only their SHA-256 is persisted.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use boutique_core::{Role, UserId};

use super::AuthError;
use crate::config::JwtConfig;
use crate::models::CurrentUser;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: i32,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl From<&Claims> for CurrentUser {
    fn from(claims: &Claims) -> Self {
        Self {
            id: UserId::new(claims.sub),
            role: claims.role,
        }
    }
}

/// Signing keys and lifetimes, built once at startup.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    /// Issue an access token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if encoding fails.
    pub fn issue_access(&self, user_id: UserId, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.as_i32(),
            role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Verify an access token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` for expired tokens and
    /// `AuthError::InvalidToken` for anything else that fails validation.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Expiry of a refresh token issued now.
    #[must_use]
    pub fn refresh_expiry(&self) -> DateTime<Utc> {
        Utc::now() + self.refresh_ttl
    }

    /// Access token lifetime in seconds, as reported to clients.
    #[must_use]
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }
}

/// Generate a new opaque refresh token.
#[must_use]
pub fn generate_refresh_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a refresh token for storage and lookup.
#[must_use]
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn keys(access_ttl_minutes: i64) -> TokenKeys {
        TokenKeys::new(&JwtConfig {
            secret: SecretString::from("k3Y9-test-signing-material-0123456789abcdef".to_string()),
            access_ttl_minutes,
            refresh_ttl_days: 30,
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let keys = keys(60);
        let token = keys.issue_access(UserId::new(12), Role::Vendor).unwrap();
        let claims = keys.verify_access(&token).unwrap();

        assert_eq!(claims.sub, 12);
        assert_eq!(claims.role, Role::Vendor);
        assert_eq!(claims.exp - claims.iat, 3600);

        let user = CurrentUser::from(&claims);
        assert_eq!(user.id, UserId::new(12));
    }

    #[test]
    fn test_expired_token() {
        let keys = keys(-5);
        let token = keys.issue_access(UserId::new(1), Role::User).unwrap();
        assert!(matches!(keys.verify_access(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let token = keys(60).issue_access(UserId::new(1), Role::Admin).unwrap();
        let other = TokenKeys::new(&JwtConfig {
            secret: SecretString::from("another-signing-material-fedcba9876543210".to_string()),
            access_ttl_minutes: 60,
            refresh_ttl_days: 30,
        });

        assert!(matches!(other.verify_access(&token), Err(AuthError::InvalidToken)));
        assert!(matches!(other.verify_access("not.a.jwt"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_refresh_tokens_are_random_and_hashed() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);

        let hash = hash_refresh_token(&a);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_refresh_token(&a));
        assert_ne!(hash, hash_refresh_token(&b));
    }
}
