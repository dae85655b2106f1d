//! Authentication service
//!
//! Orchestrates credential verification and token issuance over the user
//! directory, the password hasher, and the JWT manager.

use sqlx::PgPool;

use super::jwt::{Claims, JwtManager};
use super::password::verify_password;
use crate::directory::{self, UserRecord};
use crate::error::ApiError;

/// Successful login: the sanitized identity plus a freshly issued token
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt_manager: JwtManager,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt_manager: JwtManager) -> Self {
        Self { pool, jwt_manager }
    }

    pub fn token_expiry_seconds(&self) -> i64 {
        self.jwt_manager.expiry_seconds()
    }

    /// Verify credentials and issue a token.
    ///
    /// Returns `Ok(None)` for unknown email and wrong password alike, so a
    /// caller cannot tell the two apart from the result. Infrastructure
    /// faults surface as `Err`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<LoginOutcome>, ApiError> {
        let found = directory::find_by_email_for_auth(&self.pool, email).await?;

        let (user, password_hash) = match found {
            Some(parts) => parts,
            None => {
                tracing::debug!(email = %email, "login: user not found");
                return Ok(None);
            }
        };

        if !verify_password(password, &password_hash) {
            tracing::debug!(user_id = %user.id, "login: password mismatch");
            return Ok(None);
        }

        let token = self
            .jwt_manager
            .issue_token(user.id, &user.email, user.is_admin)
            .map_err(|e| {
                tracing::error!(error = ?e, "login: token issuance failed");
                ApiError::Internal
            })?;

        tracing::info!(user_id = %user.id, "login: authenticated");
        Ok(Some(LoginOutcome { user, token }))
    }

    /// Verify a token, returning its claims or `None` for anything invalid
    /// (malformed, forged, or expired)
    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        self.jwt_manager.validate_token(token).ok()
    }

    /// Resolve verified claims back to a live directory record.
    ///
    /// `Ok(None)` means the subject no longer exists, e.g. the account was
    /// deleted after the token was issued.
    pub async fn resolve_claims(&self, claims: &Claims) -> Result<Option<UserRecord>, sqlx::Error> {
        directory::find_by_id(&self.pool, claims.sub).await
    }
}
