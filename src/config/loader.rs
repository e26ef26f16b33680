//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_rule = "weighted_random"

[health_check]
interval_secs = 15

[discovery]
backend = "consul"
consul = { url = "http://consul.internal:8500" }

[[rules]]
service = "orders"
rule = "round_robin"
check = { protocol = "https", url = "/status" }

[[rules]]
service = "billing"

[[clients]]
service = "orders"
url = "127.0.0.1:7000"
definitions = [{ name = "shop.OrderService", methods = ["create", "get"] }]
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.default_rule, "weighted_random");
        assert_eq!(config.health_check.interval_secs, 15);
        assert!(config.health_check.enabled);
        assert_eq!(config.discovery.backend, "consul");
        assert_eq!(config.discovery.consul.url, "http://consul.internal:8500");
        assert_eq!(config.discovery.consul.wait_secs, 55);

        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].rule.as_deref(), Some("round_robin"));
        assert_eq!(config.rules[0].check.protocol, "https");
        assert_eq!(config.rules[0].check.path, "/status");
        assert_eq!(config.rules[1].rule, None);
        assert_eq!(config.rules[1].check.path, "/health");

        assert_eq!(config.clients[0].definitions[0].methods, vec!["create", "get"]);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.default_rule, "round_robin");
        assert_eq!(config.health_check.interval_secs, 30);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_validation_error_surfaces() {
        let err = parse_config("[health_check]\ninterval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("default_rule = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("service_router_loader_test.toml");
        fs::write(&path, SAMPLE).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.rules.len(), 2);
        fs::remove_file(&path).unwrap_or_default();

        assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
    }
}
