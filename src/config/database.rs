//! Database configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Validate database configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("DATABASE_URL"));
        }
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        Ok(())
    }
}

fn default_max_connections() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_postgres_urls() {
        let config = DatabaseConfig {
            url: "postgresql://app@localhost/pointdeck".to_string(),
            max_connections: default_max_connections(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_postgres_urls() {
        let config = DatabaseConfig {
            url: "mysql://localhost".to_string(),
            max_connections: 10,
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidDatabaseUrl));
    }

    #[test]
    fn rejects_empty_url() {
        let config = DatabaseConfig {
            url: String::new(),
            max_connections: 10,
        };
        assert!(config.validate().is_err());
    }
}
