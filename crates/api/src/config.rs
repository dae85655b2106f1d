//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_direct_url: Option<String>,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_minutes: i64,
    pub cookie_secure: bool,

    // Seeding
    pub seed_file: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_direct_url: env::var("DATABASE_DIRECT_URL").ok(),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                // Token forgery resistance depends on key strength
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_minutes: env::var("JWT_EXPIRY_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            cookie_secure: env::var("COOKIE_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            // Seeding
            seed_file: env::var("SEED_FILE").unwrap_or_else(|_| "users.json".to_string()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (they modify shared env vars)
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn cleanup_config() {
        env::remove_var("DATABASE_URL");
        env::remove_var("JWT_SECRET");
        env::remove_var("JWT_EXPIRY_MINUTES");
    }

    #[test]
    fn test_config_validation() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();

        // === Missing DATABASE_URL ===
        cleanup_config();
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));

        // === Missing JWT_SECRET ===
        env::set_var("DATABASE_URL", "postgres://test");
        env::remove_var("JWT_SECRET");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("JWT_SECRET"))));

        // === Short JWT_SECRET rejected ===
        env::set_var("JWT_SECRET", "too-short");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::WeakSecret(_))));

        // === Valid configuration with defaults ===
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
        let config = Config::from_env().expect("valid config should load");
        assert_eq!(config.jwt_expiry_minutes, 60);
        assert_eq!(config.seed_file, "users.json");
        assert!(!config.cookie_secure);

        // === Expiry override ===
        env::set_var("JWT_EXPIRY_MINUTES", "120");
        let config = Config::from_env().expect("valid config should load");
        assert_eq!(config.jwt_expiry_minutes, 120);

        cleanup_config();
    }
}
