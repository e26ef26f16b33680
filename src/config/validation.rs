//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check names used for routing and stub generation
//! - Validate value ranges (interval > 0, known protocols)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Rule identifiers are checked against the registry at orchestrator init,
//!   since applications may register their own rules after loading config

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::RouterConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rules[{0}]: service name is empty")]
    EmptyService(usize),

    #[error("service {0} has more than one rule entry")]
    DuplicateRule(String),

    #[error("service {service}: unsupported check protocol {protocol}")]
    UnsupportedProtocol { service: String, protocol: String },

    #[error("service {service}: check path {path} must start with '/'")]
    InvalidCheckPath { service: String, path: String },

    #[error("health_check.interval_secs must be greater than zero")]
    ZeroInterval,

    #[error("unknown discovery backend: {0}")]
    UnknownBackend(String),

    #[error("clients[{0}]: service name is empty")]
    EmptyClientService(usize),

    #[error("invalid RPC service name: {0}")]
    InvalidServiceName(String),

    #[error("invalid RPC method name {service}.{method}")]
    InvalidMethodName { service: String, method: String },
}

/// True for identifiers: ASCII letter or `_` first, then letters, digits or `_`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True for dotted service names such as `shop.v1.OrderService`.
pub fn is_service_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_identifier)
}

/// Validate a loaded configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (i, rule) in config.rules.iter().enumerate() {
        if rule.service.trim().is_empty() {
            errors.push(ValidationError::EmptyService(i));
            continue;
        }
        if !seen.insert(rule.service.as_str()) {
            errors.push(ValidationError::DuplicateRule(rule.service.clone()));
        }
        if !matches!(rule.check.protocol.as_str(), "http" | "https") {
            errors.push(ValidationError::UnsupportedProtocol {
                service: rule.service.clone(),
                protocol: rule.check.protocol.clone(),
            });
        }
        if !rule.check.path.starts_with('/') {
            errors.push(ValidationError::InvalidCheckPath {
                service: rule.service.clone(),
                path: rule.check.path.clone(),
            });
        }
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval);
    }

    if !matches!(config.discovery.backend.as_str(), "memory" | "consul") {
        errors.push(ValidationError::UnknownBackend(config.discovery.backend.clone()));
    }

    for (i, client) in config.clients.iter().enumerate() {
        if client.service.trim().is_empty() {
            errors.push(ValidationError::EmptyClientService(i));
        }
        for definition in &client.definitions {
            if !is_service_name(&definition.name) {
                errors.push(ValidationError::InvalidServiceName(definition.name.clone()));
            }
            for method in &definition.methods {
                if !is_identifier(method) {
                    errors.push(ValidationError::InvalidMethodName {
                        service: definition.name.clone(),
                        method: method.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CheckConfig, ClientConfig, RuleConfig, ServiceDefinition};

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn test_names() {
        assert!(is_identifier("getOrder"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier("get order"));
        assert!(!is_identifier(""));

        assert!(is_service_name("shop.v1.OrderService"));
        assert!(!is_service_name("shop..OrderService"));
        assert!(!is_service_name("shop/OrderService"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RouterConfig::default();
        config.health_check.interval_secs = 0;
        config.discovery.backend = "zookeeper".into();
        config.rules = vec![
            RuleConfig {
                service: "orders".into(),
                rule: None,
                check: CheckConfig {
                    protocol: "grpc".into(),
                    path: "health".into(),
                },
            },
            RuleConfig {
                service: "orders".into(),
                rule: Some("random".into()),
                check: CheckConfig::default(),
            },
            RuleConfig {
                service: " ".into(),
                rule: None,
                check: CheckConfig::default(),
            },
        ];
        config.clients = vec![ClientConfig {
            service: "orders".into(),
            url: None,
            definitions: vec![ServiceDefinition {
                name: "shop.OrderService".into(),
                methods: vec!["create".into(), "bad-name".into()],
            }],
        }];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.contains(&ValidationError::ZeroInterval));
        assert!(errors.contains(&ValidationError::DuplicateRule("orders".into())));
        assert!(errors.contains(&ValidationError::EmptyService(2)));
        assert!(errors.contains(&ValidationError::UnknownBackend("zookeeper".into())));
        assert!(errors.contains(&ValidationError::InvalidMethodName {
            service: "shop.OrderService".into(),
            method: "bad-name".into(),
        }));
    }
}
