//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{CredentialConfig, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::security::credential::Credential;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("credential from {source_name} is not a valid header value")]
    InvalidCredential { source_name: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the server credential from the process environment.
///
/// Called once at startup; request handling never reads the environment.
pub fn load_credential(config: &CredentialConfig) -> Result<Option<Credential>, ConfigError> {
    resolve_credential(config, |name| std::env::var(name).ok())
}

/// Resolve the server credential with a custom variable lookup.
///
/// The environment variable wins over the inline `api_key`. Empty values count as unset.
pub fn resolve_credential<F>(
    config: &CredentialConfig,
    lookup: F,
) -> Result<Option<Credential>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (secret, source_name) = match lookup(&config.env_var).filter(|v| !v.is_empty()) {
        Some(secret) => (secret, config.env_var.clone()),
        None => match config.api_key.clone().filter(|v| !v.is_empty()) {
            Some(secret) => (secret, "credential.api_key".to_string()),
            None => return Ok(None),
        },
    };

    Credential::new(&secret)
        .map(Some)
        .map_err(|_| ConfigError::InvalidCredential { source_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DeliveryMode, MethodPolicy};

    #[test]
    fn parses_partial_file_over_defaults() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [upstream]
            allowed_hosts = ["*.tinfoil.sh"]
            method_policy = "reject"

            [streaming]
            delivery = "bulk"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.upstream.allowed_hosts, vec!["*.tinfoil.sh"]);
        assert_eq!(config.upstream.method_policy, MethodPolicy::Reject);
        assert_eq!(config.upstream.target_header, "X-Tinfoil-Enclave-Url");
        assert_eq!(config.streaming.delivery, DeliveryMode::Bulk);
        assert_eq!(config.streaming.bulk_chunk_bytes, 32 * 1024);
    }

    #[test]
    fn parse_error_is_reported() {
        let err = parse_config("[listener\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_error_lists_all_problems() {
        let err = parse_config(
            r#"
            [upstream]
            paths = ["relative"]
            [streaming]
            bulk_chunk_bytes = 0
            "#,
        )
        .unwrap_err();

        match &err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(message.contains("relative"));
        assert!(message.contains("bulk_chunk_bytes"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn environment_wins_over_inline_key() {
        let config = CredentialConfig {
            env_var: "PROXY_KEY".into(),
            api_key: Some("inline".into()),
        };
        let credential = resolve_credential(&config, |name| {
            (name == "PROXY_KEY").then(|| "from-env".to_string())
        })
        .unwrap()
        .unwrap();
        assert_eq!(credential.authorization().to_str().unwrap(), "Bearer from-env");
    }

    #[test]
    fn inline_key_used_when_env_empty() {
        let config = CredentialConfig {
            env_var: "PROXY_KEY".into(),
            api_key: Some("inline".into()),
        };
        let credential = resolve_credential(&config, |_| Some(String::new()))
            .unwrap()
            .unwrap();
        assert_eq!(credential.authorization().to_str().unwrap(), "Bearer inline");
    }

    #[test]
    fn unset_credential_is_none() {
        let config = CredentialConfig::default();
        assert!(resolve_credential(&config, |_| None).unwrap().is_none());
    }

    #[test]
    fn credential_with_newline_is_rejected() {
        let config = CredentialConfig::default();
        let err = resolve_credential(&config, |_| Some("abc\ndef".into())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCredential { .. }));
        assert!(!err.to_string().contains("abc"));
    }
}
