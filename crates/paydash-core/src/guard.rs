//! Session guard: issues and validates signed session tokens and gates
//! every protected operation.

use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::info;
use uuid::Uuid;

use paydash_db::models::UserRow;
use paydash_db::Database;
use paydash_types::api::Claims;
use paydash_types::models::{UserRole, UserView};

use crate::convert::user_view_from_row;
use crate::error::AuthError;

pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";
pub const BOOTSTRAP_ADMIN_EMAIL: &str = "admin@paydash.local";

/// Issues and validates session tokens against one signing secret. The
/// secret and TTL are constructor arguments, so independent guards (one
/// per test, for instance) never share state.
pub struct SessionGuard {
    db: Arc<Database>,
    secret: String,
    ttl: Duration,
}

impl SessionGuard {
    pub fn new(db: Arc<Database>, secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            db,
            secret: secret.into(),
            ttl,
        }
    }

    /// Login: verify credentials, mint a token. The returned view never
    /// carries the password hash.
    pub async fn issue(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(String, UserView), AuthError> {
        let db = self.db.clone();
        let name = username.to_owned();
        let user = tokio::task::spawn_blocking(move || db.get_user_by_username(&name))
            .await
            .map_err(|e| anyhow!("join error: {e}"))??
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password)?;

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        let view = user_view_from_row(&user)?;
        let token = self.sign(&view)?;
        info!("session issued for {}", view.username);
        Ok((token, view))
    }

    /// Validate a presented token. The subject is re-resolved against the
    /// store on every call rather than trusted from the claims, so a
    /// deactivated or deleted account loses access before the token
    /// expires, at the cost of one lookup per protected call.
    pub async fn validate(&self, token: Option<&str>) -> Result<UserView, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;

        let mut validation = Validation::default();
        // No leeway: a token past its exp is rejected immediately.
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::MalformedOrExpiredToken)?;

        let db = self.db.clone();
        let sub = data.claims.sub.to_string();
        let user = tokio::task::spawn_blocking(move || db.get_user_by_id(&sub))
            .await
            .map_err(|e| anyhow!("join error: {e}"))??
            .ok_or(AuthError::SubjectNotFound)?;

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        Ok(user_view_from_row(&user)?)
    }

    /// Idempotently ensure the bootstrap admin account exists. Safe to run
    /// on every start; an existing admin is left untouched.
    pub async fn bootstrap(&self, admin_password: &str) -> Result<(), AuthError> {
        let db = self.db.clone();
        let existing =
            tokio::task::spawn_blocking(move || db.get_user_by_username(BOOTSTRAP_ADMIN_USERNAME))
                .await
                .map_err(|e| anyhow!("join error: {e}"))??;

        if existing.is_some() {
            info!("bootstrap admin already exists");
            return Ok(());
        }

        let hash = hash_password(admin_password)?;
        let now_ms = Utc::now().timestamp_millis();
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
            email: BOOTSTRAP_ADMIN_EMAIL.to_string(),
            password: hash,
            role: UserRole::Admin.as_str().to_string(),
            is_active: true,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };

        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.insert_user(&row))
            .await
            .map_err(|e| anyhow!("join error: {e}"))??;

        info!("bootstrap admin account created");
        Ok(())
    }

    fn sign(&self, user: &UserView) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Storage(anyhow!("token encoding failed: {e}")))
    }
}

/// Argon2id hash with a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Storage(anyhow!("password hashing failed: {e}")))
}

/// Constant-time verification against a stored Argon2 hash. A mismatch is
/// `InvalidCredentials`; an unparseable stored hash is a storage fault.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::Storage(anyhow!("stored hash unparseable: {e}")))?;

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}
