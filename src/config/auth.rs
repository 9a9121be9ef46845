//! Authentication configuration.

use serde::Deserialize;

use super::error::ValidationError;

/// JWT validation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared secret for HS256 room token validation.
    pub jwt_secret: String,
}

impl AuthConfig {
    /// Validate auth configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jwt_secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_fails_validation() {
        let config = AuthConfig {
            jwt_secret: String::new(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_empty_secret_validates() {
        let config = AuthConfig {
            jwt_secret: "secret".to_string(),
        };
        assert!(config.validate().is_ok());
    }
}
