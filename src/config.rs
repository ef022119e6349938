/// Configuration Module
///
/// Provides configuration for the authentication library. Handles loading
/// and parsing of YAML configuration files and environment variables, with
/// environment values overriding file values.
///
/// # Copyright
/// Copyright (c) 2025
/// All rights reserved.
///
/// # License
/// Licensed under the AGPLv3 license.
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity provider connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Base URL of the provider REST API.
    pub api_url: String,
    /// API key passed as a query parameter on every request.
    pub api_key: String,
    /// Window in seconds after which automatic SMS-code retrieval is
    /// reported as timed out.
    pub verification_timeout_secs: u64,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Missing required config value: {0}")]
    MissingConfig(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl AuthConfig {
    /// Loads configuration from `config/auth.yml` merged with `AUTH_`
    /// environment variables (later sources override earlier ones).
    pub fn new() -> Result<Self, ConfigError> {
        let builder = ConfigFile::builder()
            .add_source(File::with_name("config/auth.yml").required(false))
            .add_source(Environment::with_prefix("AUTH"));

        let config = builder.build()?;
        config
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn parses_yaml_settings() {
        let yaml = r#"
api_url: "https://identity.example.com"
api_key: "key-123"
verification_timeout_secs: 30
"#;
        let config = ConfigFile::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap();
        let settings: AuthConfig = config.try_deserialize().unwrap();

        assert_eq!(settings.api_url, "https://identity.example.com");
        assert_eq!(settings.api_key, "key-123");
        assert_eq!(settings.verification_timeout_secs, 30);
    }

    #[test]
    fn missing_fields_fail_to_parse() {
        let yaml = r#"
api_url: "https://identity.example.com"
"#;
        let config = ConfigFile::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap();
        let result: Result<AuthConfig, _> = config.try_deserialize();

        assert!(result.is_err());
    }
}
