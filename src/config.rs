//! Configuration management

use std::path::PathBuf;

use anyhow::{self, Context, Result};

use crate::services::import_processor::DEFAULT_MAX_ROWS;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// Maximum number of data rows accepted per file
    pub import_max_rows: usize,

    /// Where the import history is persisted
    pub import_history_file: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let nats_user = std::env::var("NATS_USER").ok().filter(|u| !u.is_empty());
        let nats_password = std::env::var("NATS_PASSWORD").ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set — generate one with: openssl rand -base64 48")?;
        validate_jwt_secret(&jwt_secret)?;

        let import_max_rows = match std::env::var("IMPORT_MAX_ROWS") {
            Ok(raw) => parse_max_rows(&raw)?,
            Err(_) => DEFAULT_MAX_ROWS,
        };

        let import_history_file = std::env::var("IMPORT_HISTORY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs/import-history.json"));

        Ok(Self {
            nats_url,
            nats_user,
            nats_password,
            database_url,
            jwt_secret,
            import_max_rows,
            import_history_file,
        })
    }
}

fn validate_jwt_secret(secret: &str) -> Result<()> {
    if secret.len() < 32 {
        anyhow::bail!(
            "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
            secret.len()
        );
    }

    const KNOWN_DEV_SECRETS: &[&str] = &[
        "dev-secret-change-in-production-min-32-bytes!!",
    ];
    if KNOWN_DEV_SECRETS.contains(&secret) {
        tracing::warn!("⚠ JWT_SECRET matches a known default — change it for production!");
    }
    Ok(())
}

fn parse_max_rows(raw: &str) -> Result<usize> {
    let value: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("IMPORT_MAX_ROWS must be a positive number, got '{}'", raw))?;
    if value == 0 {
        anyhow::bail!("IMPORT_MAX_ROWS must be greater than zero");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_jwt_secret_rejected() {
        assert!(validate_jwt_secret("too-short").is_err());
    }

    #[test]
    fn test_long_jwt_secret_accepted() {
        assert!(validate_jwt_secret("test-secret-key-for-jwt-at-least-32-bytes-long").is_ok());
    }

    #[test]
    fn test_parse_max_rows() {
        assert_eq!(parse_max_rows("250").unwrap(), 250);
        assert_eq!(parse_max_rows(" 10 ").unwrap(), 10);
        assert!(parse_max_rows("0").is_err());
        assert!(parse_max_rows("lots").is_err());
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_defaults() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", "test-secret-key-for-jwt-at-least-32-bytes-long");
        std::env::remove_var("IMPORT_MAX_ROWS");
        std::env::remove_var("IMPORT_HISTORY_FILE");

        let config = Config::from_env().unwrap();
        assert_eq!(config.import_max_rows, DEFAULT_MAX_ROWS);
        assert_eq!(config.import_history_file, PathBuf::from("logs/import-history.json"));
    }
}
