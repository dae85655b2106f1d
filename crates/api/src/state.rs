//! Application state

use sqlx::PgPool;

use crate::{
    auth::{AuthService, AuthState, JwtManager},
    config::Config,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_minutes);
        let auth = AuthService::new(pool.clone(), jwt_manager);

        Self { pool, config, auth }
    }

    /// Get auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            auth: self.auth.clone(),
        }
    }
}
