//! Application configuration management.
//!
//! Layers, lowest precedence first: `config/default.toml`,
//! `config/{RUN_MODE}.toml`, then `SCHOOLMONEY__SECTION__KEY` environment
//! variables.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Ledger tuning.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

const fn default_access_token_expiry() -> u64 {
    3600
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// How many account numbers to try before giving up on a collision streak.
    #[serde(default = "default_account_number_attempts")]
    pub account_number_attempts: u32,
    /// Prefix the account serial with a `yyMMddHHmmss` timestamp.
    #[serde(default = "default_timestamp_serial")]
    pub timestamp_serial: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            account_number_attempts: default_account_number_attempts(),
            timestamp_serial: default_timestamp_serial(),
        }
    }
}

const fn default_account_number_attempts() -> u32 {
    8
}

const fn default_timestamp_serial() -> bool {
    true
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("SCHOOLMONEY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_env_applies_defaults() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("test-no-such-file")),
                (
                    "SCHOOLMONEY__DATABASE__URL",
                    Some("postgres://localhost/schoolmoney"),
                ),
                ("SCHOOLMONEY__JWT__SECRET", Some("s3cret")),
            ],
            || {
                let cfg = AppConfig::load().unwrap();
                assert_eq!(cfg.database.url, "postgres://localhost/schoolmoney");
                assert_eq!(cfg.database.max_connections, 10);
                assert_eq!(cfg.jwt.secret, "s3cret");
                assert_eq!(cfg.jwt.access_token_expiry_secs, 3600);
                assert_eq!(cfg.server.port, 8080);
                assert_eq!(cfg.ledger.account_number_attempts, 8);
                assert!(cfg.ledger.timestamp_serial);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("test-no-such-file")),
                ("SCHOOLMONEY__DATABASE__URL", None::<&str>),
                ("SCHOOLMONEY__JWT__SECRET", Some("s3cret")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
