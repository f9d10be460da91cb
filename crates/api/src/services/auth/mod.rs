//! Authentication service.
//!
//! Password registration and login, access token issuance, and refresh token
//! rotation.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{Claims, TokenKeys};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use boutique_core::{Email, Role, UserId};

use crate::db::users::NewUser;
use crate::db::{RefreshTokenRepository, RepositoryError, UserRepository, VendorRepository};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// `user` (default) or `vendor`.
    #[serde(default)]
    pub role: Option<Role>,
    /// Required when registering as a vendor.
    pub shop_name: Option<String>,
    pub shop_description: Option<String>,
}

/// Tokens returned after register, login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: User,
}

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
    keys: &'a TokenKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, keys: &'a TokenKeys) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
            keys,
        }
    }

    /// Register a new account and sign it in.
    ///
    /// Vendor accounts get their shop profile in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::InvalidRegistration` for admin sign-ups or a vendor without a shop name.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, form), fields(role = tracing::field::Empty))]
    pub async fn register(&self, form: &Registration) -> Result<AuthSession, AuthError> {
        let email = Email::parse(&form.email)?;
        validate_password(&form.password)?;

        let role = form.role.unwrap_or_default();
        tracing::Span::current().record("role", tracing::field::display(role));

        let shop_name = match role {
            Role::Admin => {
                return Err(AuthError::InvalidRegistration(
                    "admin accounts cannot be self-registered".to_string(),
                ));
            }
            Role::Vendor => Some(
                form.shop_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        AuthError::InvalidRegistration(
                            "shop_name is required for vendor accounts".to_string(),
                        )
                    })?,
            ),
            Role::User => None,
        };

        let password_hash = hash_password(&form.password)?;

        let mut tx = self.pool.begin().await?;

        let user = UserRepository::create_in(
            &mut *tx,
            &NewUser {
                email: &email,
                password_hash: &password_hash,
                first_name: form.first_name.as_deref(),
                last_name: form.last_name.as_deref(),
                phone: form.phone.as_deref(),
                address: form.address.as_deref(),
                role,
            },
        )
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;

        if let Some(shop_name) = shop_name {
            VendorRepository::ensure_in(
                &mut *tx,
                user.id,
                shop_name,
                form.shop_description.as_deref(),
            )
            .await?;
        }

        let session = self.start_session(&mut *tx, user).await?;
        tx.commit().await?;

        info!(user_id = %session.user.id, "User registered");

        Ok(session)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        let mut conn = self.pool.acquire().await?;
        let session = self.start_session(&mut *conn, user).await?;

        info!(user_id = %session.user.id, "User logged in");

        Ok(session)
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented token is revoked; reusing it fails.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRefreshToken` if the token is unknown, expired or already used.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let hash = tokens::hash_refresh_token(refresh_token);

        let mut tx = self.pool.begin().await?;

        let user_id = RefreshTokenRepository::consume_in(&mut *tx, &hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let session = self.start_session(&mut *tx, user).await?;
        tx.commit().await?;

        Ok(session)
    }

    /// Revoke a refresh token. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database fails.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        RefreshTokenRepository::new(self.pool)
            .revoke(&tokens::hash_refresh_token(refresh_token))
            .await?;
        Ok(())
    }

    /// Change a user's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let hash = self.users.password_hash_by_id(user_id).await?;
        verify_password(current, &hash)?;
        validate_password(new)?;

        let new_hash = hash_password(new)?;

        let mut tx = self.pool.begin().await?;
        UserRepository::update_password_in(&mut *tx, user_id, &new_hash).await?;
        let revoked = RefreshTokenRepository::revoke_all_in(&mut *tx, user_id).await?;
        tx.commit().await?;

        info!(revoked, "Password changed, sessions revoked");

        Ok(())
    }

    /// Issue an access token and store a fresh refresh token.
    async fn start_session(
        &self,
        conn: &mut PgConnection,
        user: User,
    ) -> Result<AuthSession, AuthError> {
        let token = self.keys.issue_access(user.id, user.role)?;
        let refresh_token = tokens::generate_refresh_token();

        RefreshTokenRepository::create_in(
            conn,
            user.id,
            &tokens::hash_refresh_token(&refresh_token),
            self.keys.refresh_expiry(),
        )
        .await?;

        Ok(AuthSession {
            token,
            refresh_token,
            expires_in: self.keys.access_ttl_secs(),
            user,
        })
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        // Counted in characters, not bytes
        assert!(validate_password("éééééé").is_err());
    }

    #[test]
    fn test_registration_defaults_to_user_role() {
        let form: Registration = serde_json::from_str(
            r#"{"email": "a@example.com", "password": "secret123"}"#,
        )
        .unwrap();
        assert_eq!(form.role.unwrap_or_default(), Role::User);
        assert!(form.shop_name.is_none());
    }
}
