//! Service configuration
//!
//! Values come from process environment variables layered over defaults.
//! `JWT_SECRET` has no default and must be set.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::jwt::JwtConfig;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";
pub const DEFAULT_JWT_EXPIRY_SECONDS: i64 = 86_400;
pub const DEFAULT_MEDIA_ROOT: &str = "./media";
pub const DEFAULT_MAX_UPLOAD_BYTES: i64 = 10 * 1024 * 1024;

/// API service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address the server binds to
    pub bind_address: String,
    /// Shared secret for signing tokens
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub jwt_expiry_seconds: u64,
    /// Directory under which uploads are written
    pub media_root: String,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    /// - `BIND_ADDRESS`: listen address (default: `0.0.0.0:3001`)
    /// - `JWT_SECRET`: HMAC secret for tokens (required)
    /// - `JWT_EXPIRY_SECONDS`: token lifetime (default: 86400)
    /// - `MEDIA_ROOT`: upload directory (default: `./media`)
    /// - `MAX_UPLOAD_BYTES`: request body limit (default: 10 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("jwt_expiry_seconds", DEFAULT_JWT_EXPIRY_SECONDS)?
            .set_default("media_root", DEFAULT_MEDIA_ROOT)?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES)?
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        if app_config.jwt_secret.is_empty() {
            return Err(ConfigError::Message(
                "JWT_SECRET must not be empty".to_string(),
            ));
        }

        Ok(app_config)
    }

    pub fn jwt(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt_secret.clone(),
            expiry_seconds: self.jwt_expiry_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const KEYS: [&str; 5] = [
        "BIND_ADDRESS",
        "JWT_SECRET",
        "JWT_EXPIRY_SECONDS",
        "MEDIA_ROOT",
        "MAX_UPLOAD_BYTES",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults_apply() {
        clear_env();
        unsafe {
            env::set_var("JWT_SECRET", "test-secret");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.jwt_secret, "test-secret");
        assert_eq!(config.jwt_expiry_seconds, 86_400);
        assert_eq!(config.media_root, DEFAULT_MEDIA_ROOT);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_environment_overrides_defaults() {
        clear_env();
        unsafe {
            env::set_var("JWT_SECRET", "test-secret");
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("JWT_EXPIRY_SECONDS", "60");
            env::set_var("MAX_UPLOAD_BYTES", "1024");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.jwt().expiry_seconds, 60);
        assert_eq!(config.max_upload_bytes, 1024);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_secret_fails() {
        clear_env();
        assert!(AppConfig::from_env().is_err());
    }
}
