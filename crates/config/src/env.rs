use serde::Deserialize;
use std::env;

use ventas_common::error::{VentasError, VentasResult};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Shared secret for the scheduled sync trigger. When unset, the cron
    /// endpoint accepts every request (documented fail-open default).
    pub cron_secret: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> VentasResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: get_var_or("PORT", "8080")
                .parse()
                .map_err(|e| VentasError::Config(format!("invalid PORT: {e}")))?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            cron_secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn get_var(key: &str) -> VentasResult<String> {
    env::var(key).map_err(|_| VentasError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn config_from_env_succeeds_with_required_vars() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        // Set required vars for this test
        env::set_var("DATABASE_URL", "postgres://localhost/ventas_test");
        env::remove_var("CRON_SECRET");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.database_url, "postgres://localhost/ventas_test");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.cron_secret.is_none());

        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_from_env_fails_without_database_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::remove_var("DATABASE_URL");
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn empty_cron_secret_counts_as_unset() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/ventas_test");
        env::set_var("CRON_SECRET", "");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert!(cfg.cron_secret.is_none());

        env::remove_var("DATABASE_URL");
        env::remove_var("CRON_SECRET");
    }

    #[test]
    fn bind_addr_formats_correctly() {
        let cfg = AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".to_owned(),
            port: 3000,
            log_level: "debug".to_owned(),
            cron_secret: None,
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
    }
}
