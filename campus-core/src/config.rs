use std::env;

use crate::errors::{CampusError, ConfigError};

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// Global configuration shared across the services.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub environment: Environment,
    pub service_name: String,
    pub http_bind: Option<String>,
}

impl CoreConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;

        let environment = env::var("CAMPUS_ENV")
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let service_name =
            env::var("CAMPUS_SERVICE_NAME").unwrap_or_else(|_| "campus-service".to_string());
        let http_bind = env::var("CAMPUS_HTTP_BIND").ok();

        Ok(Self {
            database_url,
            environment,
            service_name,
            http_bind,
        })
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `SCHEDULING_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let db_key = key("DATABASE_URL");
        let database_url =
            env::var(&db_key).map_err(|_| ConfigError::MissingEnvVar(db_key.clone()))?;

        let env_key = key("ENV");
        let environment = env::var(&env_key)
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let service_key = key("SERVICE_NAME");
        let service_name =
            env::var(&service_key).unwrap_or_else(|_| "campus-service".to_string());

        let http_bind_key = key("HTTP_BIND");
        let http_bind = env::var(&http_bind_key).ok();

        Ok(Self {
            database_url,
            environment,
            service_name,
            http_bind,
        })
    }

    /// Returns the base Postgres URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

/// Helper that loads config and converts to the canonical campus error type.
pub fn load_core_config() -> Result<CoreConfig, CampusError> {
    Ok(CoreConfig::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_environment() {
        std::env::remove_var("CAMPUS_ENV");
        std::env::set_var("DATABASE_URL", "postgres://example");
        let cfg = CoreConfig::from_env().expect("config should load");
        assert_eq!(cfg.environment, Environment::Development);
    }

    #[test]
    fn prefixed_variables_take_precedence() {
        std::env::set_var("SCHEDTEST_DATABASE_URL", "postgres://scheduling");
        std::env::set_var("SCHEDTEST_ENV", "production");
        let cfg = CoreConfig::from_env_with_prefix("SCHEDTEST_").expect("config should load");
        assert_eq!(cfg.database_url(), "postgres://scheduling");
        assert!(cfg.is_production());
    }
}
