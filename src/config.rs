//! Provider configuration.
//!
//! Every attribute of the provider block may be left out and picked up from
//! the environment instead:
//!
//! | attribute      | environment variable |
//! |----------------|----------------------|
//! | `endpoint`     | `NEBRASKA_ENDPOINT`  |
//! | `auth_mode`    | `NEBRASKA_AUTH_MODE` |
//! | `github_token` | `NEBRASKA_GH_TOKEN`  |
//! | `username`     | `NEBRASKA_USERNAME`  |
//! | `password`     | `NEBRASKA_PASSWORD`  |

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Validator};
use crate::types::AuthMode;

/// Endpoint used when neither the block nor the environment names one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Environment variable for `endpoint`.
pub const ENV_ENDPOINT: &str = "NEBRASKA_ENDPOINT";
/// Environment variable for `auth_mode`.
pub const ENV_AUTH_MODE: &str = "NEBRASKA_AUTH_MODE";
/// Environment variable for `github_token`.
pub const ENV_GH_TOKEN: &str = "NEBRASKA_GH_TOKEN";
/// Environment variable for `username`.
pub const ENV_USERNAME: &str = "NEBRASKA_USERNAME";
/// Environment variable for `password`.
pub const ENV_PASSWORD: &str = "NEBRASKA_PASSWORD";

/// Resolved provider configuration.
#[derive(Debug)]
pub struct ProviderConfig {
    /// Base URL of the Nebraska server.
    pub endpoint: Url,
    /// Authentication scheme requested by the user.
    pub auth_mode: AuthMode,
    /// GitHub token, used in `github` mode.
    pub github_token: SecretString,
    /// OIDC username, used in `oidc` mode.
    pub username: String,
    /// OIDC password, used in `oidc` mode.
    pub password: SecretString,
}

impl ProviderConfig {
    /// Resolve the configuration from the provider block, falling back to
    /// the process environment.
    pub fn from_value(config: &Value) -> Result<Self, ProviderError> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration from the provider block, falling back to
    /// `lookup` for attributes the block leaves out.
    ///
    /// Explicit attributes win over the environment, and the environment
    /// wins over the built-in defaults. Empty strings count as unset.
    pub fn resolve<F>(config: &Value, lookup: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |attr: &str, env: &str| -> Result<Option<String>, ProviderError> {
            match config.get(attr) {
                None | Some(Value::Null) => {},
                Some(Value::String(s)) if s.is_empty() => {},
                Some(Value::String(s)) => return Ok(Some(s.clone())),
                Some(other) => {
                    return Err(ProviderError::Validation(format!(
                        "{} must be a string, got {}",
                        attr, other
                    )))
                },
            }
            Ok(lookup(env).filter(|v| !v.is_empty()))
        };

        let endpoint = setting("endpoint", ENV_ENDPOINT)?.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = parse_endpoint(&endpoint)?;

        let auth_mode = match setting("auth_mode", ENV_AUTH_MODE)? {
            Some(mode) => mode.parse::<AuthMode>().map_err(|_| {
                ProviderError::Configuration(format!(
                    "invalid auth_mode {:?}, expected one of {:?}",
                    mode,
                    AuthMode::NAMES
                ))
            })?,
            None => AuthMode::default(),
        };

        Ok(Self {
            endpoint,
            auth_mode,
            github_token: SecretString::from(setting("github_token", ENV_GH_TOKEN)?.unwrap_or_default()),
            username: setting("username", ENV_USERNAME)?.unwrap_or_default(),
            password: SecretString::from(setting("password", ENV_PASSWORD)?.unwrap_or_default()),
        })
    }

    /// Check that the credentials the selected auth mode needs are present.
    pub fn check_credentials(&self) -> Result<(), ProviderError> {
        match self.auth_mode {
            AuthMode::Noop => Ok(()),
            AuthMode::Github if self.github_token.expose_secret().is_empty() => {
                Err(ProviderError::Configuration(
                    "github_token is required when auth_mode is github".to_string(),
                ))
            },
            AuthMode::Github => Ok(()),
            AuthMode::Oidc if self.username.is_empty() || self.password.expose_secret().is_empty() => {
                Err(ProviderError::Configuration(
                    "username and password are required when auth_mode is oidc".to_string(),
                ))
            },
            AuthMode::Oidc => Ok(()),
        }
    }

    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Configuration of the Nebraska provider.")
            .with_attribute(
                "endpoint",
                Attribute::optional_string()
                    .with_description(format!(
                        "Nebraska server URL. Defaults to {} or ${}.",
                        DEFAULT_ENDPOINT, ENV_ENDPOINT
                    ))
                    .with_validator(Validator::HttpUrl),
            )
            .with_attribute(
                "auth_mode",
                Attribute::optional_string()
                    .with_description(format!(
                        "Authentication mode of the server. Defaults to noop or ${}.",
                        ENV_AUTH_MODE
                    ))
                    .with_validator(Validator::OneOf(&AuthMode::NAMES)),
            )
            .with_attribute(
                "github_token",
                Attribute::optional_string()
                    .with_description(format!("GitHub token for github auth mode (${}).", ENV_GH_TOKEN))
                    .sensitive(),
            )
            .with_attribute(
                "username",
                Attribute::optional_string()
                    .with_description(format!("Username for oidc auth mode (${}).", ENV_USERNAME)),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .with_description(format!("Password for oidc auth mode (${}).", ENV_PASSWORD))
                    .sensitive(),
            )
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ProviderError::Configuration(format!("invalid endpoint {:?}: {}", endpoint, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ProviderError::Configuration(format!(
            "invalid endpoint {:?}: unsupported scheme {:?}",
            endpoint, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::resolve(&json!({}), env(&[])).unwrap();
        assert_eq!(config.endpoint.as_str(), "http://localhost:8000/");
        assert_eq!(config.auth_mode, AuthMode::Noop);
        assert!(config.github_token.expose_secret().is_empty());
        assert!(config.username.is_empty());
        assert!(config.check_credentials().is_ok());
    }

    #[test]
    fn test_env_fallback() {
        let config = ProviderConfig::resolve(
            &json!({}),
            env(&[
                (ENV_ENDPOINT, "https://nebraska.example.com"),
                (ENV_AUTH_MODE, "oidc"),
                (ENV_USERNAME, "admin"),
                (ENV_PASSWORD, "hunter2"),
            ]),
        )
        .unwrap();

        assert_eq!(config.endpoint.host_str(), Some("nebraska.example.com"));
        assert_eq!(config.auth_mode, AuthMode::Oidc);
        assert_eq!(config.username, "admin");
        assert_eq!(config.password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_explicit_attributes_win() {
        let config = ProviderConfig::resolve(
            &json!({"endpoint": "http://10.0.0.1:8000", "auth_mode": "github", "github_token": "ghp_block"}),
            env(&[
                (ENV_ENDPOINT, "https://ignored.example.com"),
                (ENV_AUTH_MODE, "noop"),
                (ENV_GH_TOKEN, "ghp_env"),
            ]),
        )
        .unwrap();

        assert_eq!(config.endpoint.host_str(), Some("10.0.0.1"));
        assert_eq!(config.auth_mode, AuthMode::Github);
        assert_eq!(config.github_token.expose_secret(), "ghp_block");
    }

    #[test]
    fn test_empty_attribute_falls_back_to_env() {
        let config = ProviderConfig::resolve(
            &json!({"github_token": "", "auth_mode": null}),
            env(&[(ENV_GH_TOKEN, "ghp_env"), (ENV_AUTH_MODE, "github")]),
        )
        .unwrap();
        assert_eq!(config.github_token.expose_secret(), "ghp_env");
        assert_eq!(config.auth_mode, AuthMode::Github);
    }

    #[test]
    fn test_rejects_bad_endpoint_and_mode() {
        let err = ProviderConfig::resolve(&json!({"endpoint": "ftp://example.com"}), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = ProviderConfig::resolve(&json!({"endpoint": "nope"}), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = ProviderConfig::resolve(&json!({"auth_mode": "basic"}), env(&[])).unwrap_err();
        assert!(err.to_string().contains("basic"));

        let err = ProviderConfig::resolve(&json!({"username": 42}), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_check_credentials() {
        let github = ProviderConfig::resolve(&json!({"auth_mode": "github"}), env(&[])).unwrap();
        assert!(github.check_credentials().unwrap_err().to_string().contains("github_token"));

        let oidc = ProviderConfig::resolve(&json!({"auth_mode": "oidc", "username": "admin"}), env(&[])).unwrap();
        assert!(oidc.check_credentials().unwrap_err().to_string().contains("password"));

        let oidc = ProviderConfig::resolve(
            &json!({"auth_mode": "oidc", "username": "admin", "password": "pw"}),
            env(&[]),
        )
        .unwrap();
        assert!(oidc.check_credentials().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ProviderConfig::resolve(
            &json!({"auth_mode": "github", "github_token": "ghp_very_secret"}),
            env(&[]),
        )
        .unwrap();
        assert!(!format!("{:?}", config).contains("ghp_very_secret"));
    }

    #[test]
    fn test_schema_marks_secrets_sensitive() {
        let schema = ProviderConfig::schema();
        assert!(schema.attribute("github_token").unwrap().flags.sensitive);
        assert!(schema.attribute("password").unwrap().flags.sensitive);
        assert!(!schema.attribute("username").unwrap().flags.sensitive);
    }
}
